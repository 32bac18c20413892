use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use blamtag::{FourCC, MigrationConfig, SchemaSet};
use serde::Deserialize;
use tracing::debug;

pub const CONFIG_FILE: &str = "blamtag.json";

/// Project settings read from `blamtag.json`.
///
/// Relative paths are resolved against the directory holding the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory of schema descriptors; the bundled schemas when unset.
    pub schemas: Option<PathBuf>,
    pub tags_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    /// Groups the dependency walker follows; all of them when empty.
    pub dependency_groups: Vec<String>,
    /// Group codes whose migrations are disabled.
    pub skip_migrations: Vec<String>,
}

/// Find `blamtag.json` by walking up from `start` through ancestor directories.
fn find_config_upward(start: &Path) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        start.to_path_buf()
    } else {
        start.parent()?.to_path_buf()
    };
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

impl Config {
    /// Load the explicit config, or search upward from `start`. No file at
    /// all yields the defaults; a named file that doesn't exist is an error.
    pub fn discover(explicit: Option<&Path>, start: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) if path.exists() => path.to_path_buf(),
            Some(path) => bail!("config not found: {}", path.display()),
            None => match find_config_upward(start) {
                Some(found) => found,
                None => {
                    debug!("no {CONFIG_FILE} found; using defaults");
                    return Ok(Self::default());
                }
            },
        };
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open config: {}", path.display()))?;
        let mut config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");

        if let Some(base) = path.canonicalize()?.parent() {
            for dir in [&mut config.schemas, &mut config.tags_dir, &mut config.cache_dir]
                .into_iter()
                .flatten()
            {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(config)
    }

    pub fn schema_set(&self) -> Result<SchemaSet> {
        match &self.schemas {
            Some(dir) => SchemaSet::load_dir(dir).with_context(|| format!("failed to load schemas from {}", dir.display())),
            None => Ok(SchemaSet::builtin()?),
        }
    }

    pub fn migration_config(&self, preserve_version: bool) -> MigrationConfig {
        if preserve_version {
            return MigrationConfig::preserve_version();
        }
        let skip: Vec<&str> = self.skip_migrations.iter().map(String::as_str).collect();
        MigrationConfig::from_skip_list(&skip)
    }

    pub fn dependency_groups(&self) -> Result<Option<Vec<FourCC>>> {
        if self.dependency_groups.is_empty() {
            return Ok(None);
        }
        self.dependency_groups
            .iter()
            .map(|g| parse_group(g).map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

/// Parse a group code, space-padding codes shorter than four characters.
pub fn parse_group(s: &str) -> std::result::Result<FourCC, String> {
    FourCC::from_str_padded(s).ok_or_else(|| format!("invalid group code: {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "tags_dir": "tags", "cache_dir": "/var/cache/blamtag", "skip_migrations": ["shad"] }"#,
        )
        .unwrap();

        let nested = dir.path().join("levels").join("a10");
        std::fs::create_dir_all(&nested).unwrap();
        let config = Config::discover(None, &nested).unwrap();

        let base = dir.path().canonicalize().unwrap();
        assert_eq!(config.tags_dir, Some(base.join("tags")));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/blamtag")));
        assert!(config.schemas.is_none());

        let migrations = config.migration_config(false);
        assert!(!migrations.is_enabled(FourCC(*b"shad")));
        assert!(migrations.is_enabled(FourCC(*b"ligh")));
        assert!(!config.migration_config(true).is_enabled(FourCC(*b"ligh")));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(Config::discover(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "tag_dir": "typo" }"#).unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn dependency_groups_parse() {
        let config = Config {
            dependency_groups: vec!["shad".into(), "bitm".into()],
            ..Config::default()
        };
        assert_eq!(
            config.dependency_groups().unwrap(),
            Some(vec![FourCC(*b"shad"), FourCC(*b"bitm")])
        );
        assert_eq!(Config::default().dependency_groups().unwrap(), None);
    }
}
