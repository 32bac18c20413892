//! One-way upgrades of parsed trees from older stored layouts to the
//! canonical ones.
//!
//! Each [`Migration`] is keyed by tag group and rewrites a [`Tag`] in place.
//! Migrations check stored block versions before touching anything and stamp
//! the canonical version afterwards, so running one twice is a no-op.

mod contrail;
pub mod function;
mod light;
mod shader;
mod util;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::file::Tag;
use crate::fourcc::FourCC;
use crate::schema::TagGroup;

pub use contrail::ContrailMigration;
pub use function::{Function, FunctionKind};
pub use light::LightMigration;
pub use shader::ShaderMigration;

/// A per-group upgrade of a parsed tag.
pub trait Migration {
    /// Group this migration applies to.
    fn group(&self) -> FourCC;

    fn name(&self) -> &str;

    /// Upgrade `tag` in place. Returns true when anything changed.
    fn apply(&self, tag: &mut Tag, schema: &TagGroup) -> Result<bool>;
}

/// Groups whose stored layouts never need rewriting.
pub struct Unchanged {
    group: FourCC,
    name: &'static str,
}

impl Unchanged {
    pub fn new(group: FourCC, name: &'static str) -> Self {
        Self { group, name }
    }
}

impl Migration for Unchanged {
    fn group(&self) -> FourCC {
        self.group
    }

    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, _tag: &mut Tag, _schema: &TagGroup) -> Result<bool> {
        Ok(false)
    }
}

/// Which migrations run.
///
/// Everything is enabled by default. `preserve_version` turns all of them
/// off; individual groups are disabled with [`MigrationConfig::from_skip_list`].
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub preserve_version: bool,
    pub light: bool,
    pub shader: bool,
    pub contrail: bool,
    pub bitmap: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            preserve_version: false,
            light: true,
            shader: true,
            contrail: true,
            bitmap: true,
        }
    }
}

impl MigrationConfig {
    /// Keep every stored layout as read.
    pub fn preserve_version() -> Self {
        Self {
            preserve_version: true,
            ..Self::default()
        }
    }

    /// Enable everything except the listed groups.
    ///
    /// Names are group codes: `"ligh"`, `"shad"`, `"cont"`, `"bitm"`.
    pub fn from_skip_list(skip: &[&str]) -> Self {
        let mut config = Self::default();
        for name in skip {
            match *name {
                "ligh" => config.light = false,
                "shad" => config.shader = false,
                "cont" => config.contrail = false,
                "bitm" => config.bitmap = false,
                _ => {}
            }
        }
        config
    }

    pub fn is_enabled(&self, group: FourCC) -> bool {
        if self.preserve_version {
            return false;
        }
        match &group.0 {
            b"ligh" => self.light,
            b"shad" => self.shader,
            b"cont" => self.contrail,
            b"bitm" => self.bitmap,
            _ => true,
        }
    }
}

/// Dispatch table from tag group to its migration.
pub struct MigrationTable {
    entries: BTreeMap<FourCC, Box<dyn Migration>>,
}

impl MigrationTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Migrations for every builtin group.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.add(Box::new(LightMigration));
        table.add(Box::new(ShaderMigration));
        table.add(Box::new(ContrailMigration));
        table.add(Box::new(Unchanged::new(FourCC(*b"bitm"), "bitmap")));
        table
    }

    pub fn add(&mut self, migration: Box<dyn Migration>) {
        self.entries.insert(migration.group(), migration);
    }

    pub fn get(&self, group: FourCC) -> Option<&dyn Migration> {
        self.entries.get(&group).map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the migration registered for `tag`'s group, if enabled.
    pub fn run(&self, tag: &mut Tag, schema: &TagGroup, config: &MigrationConfig) -> Result<bool> {
        let group = tag.group();
        if !config.is_enabled(group) {
            return Ok(false);
        }
        let Some(migration) = self.get(group) else {
            debug!(%group, "no migration registered");
            return Ok(false);
        };
        let changed = migration.apply(tag, schema).map_err(|e| match e {
            Error::Migration { .. } => e,
            other => Error::Migration {
                group: group.to_latin1(),
                message: other.to_string(),
            },
        })?;
        if changed {
            if tag.header.version < schema.header_version {
                tag.header.version = schema.header_version;
            }
            debug!(%group, migration = migration.name(), "upgraded tag");
        }
        Ok(changed)
    }
}

impl Default for MigrationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_all() {
        let config = MigrationConfig::default();
        for code in [b"ligh", b"shad", b"cont", b"bitm", b"zzzz"] {
            assert!(config.is_enabled(FourCC(*code)));
        }
    }

    #[test]
    fn skip_list_disables_groups() {
        let config = MigrationConfig::from_skip_list(&["shad", "nonexistent"]);
        assert!(config.is_enabled(FourCC(*b"ligh")));
        assert!(!config.is_enabled(FourCC(*b"shad")));
        assert!(config.is_enabled(FourCC(*b"cont")));
    }

    #[test]
    fn preserve_version_disables_everything() {
        let config = MigrationConfig::preserve_version();
        assert!(!config.is_enabled(FourCC(*b"ligh")));
        assert!(!config.is_enabled(FourCC(*b"bitm")));
    }

    #[test]
    fn builtin_table_covers_builtin_schemas() {
        let table = MigrationTable::builtin();
        let schemas = crate::schema::SchemaSet::builtin().unwrap();
        for group in schemas.groups() {
            assert!(table.get(group.group).is_some(), "{}", group.group);
        }
        assert_eq!(table.len(), 4);
    }
}
