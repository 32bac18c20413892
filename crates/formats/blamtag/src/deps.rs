//! Transitive dependency discovery.
//!
//! Starting from one tag reference, every reachable reference whose group is
//! allowed is resolved to a file under the tags directory, parsed (or taken
//! from the [`TagCache`]) and walked in turn. Each `(path, group)` pair is
//! visited at most once, so reference cycles terminate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cache::TagCache;
use crate::error::{FileError, Result, Stage};
use crate::file::{ReadOptions, Tag};
use crate::fourcc::FourCC;
use crate::migrate::{MigrationConfig, MigrationTable};
use crate::schema::SchemaSet;
use crate::value::TagRef;

/// File for a tag path: backslashes become separators, the group's extension is appended.
pub fn tag_file(tags_dir: &Path, path: &str, extension: &str) -> PathBuf {
    let mut file = tags_dir.join(path.replace('\\', "/"));
    let name = match file.file_name() {
        Some(name) => format!("{}.{extension}", name.to_string_lossy()),
        None => return file,
    };
    file.set_file_name(name);
    file
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Group not in the walker's allow-list.
    NotAllowed,
    /// No schema for the group.
    Unsupported,
    /// No file at the resolved location.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRef {
    pub path: String,
    pub group: FourCC,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct WalkedTag {
    pub path: String,
    pub file: PathBuf,
    pub from_cache: bool,
    pub tag: Tag,
}

/// Everything one walk touched.
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Loaded tags, in discovery order.
    pub tags: Vec<WalkedTag>,
    pub skipped: Vec<SkippedRef>,
    pub errors: Vec<FileError>,
}

impl WalkReport {
    pub fn get(&self, path: &str, group: FourCC) -> Option<&WalkedTag> {
        self.tags
            .iter()
            .find(|t| t.tag.group() == group && t.path.eq_ignore_ascii_case(path))
    }

    pub fn cache_hits(&self) -> usize {
        self.tags.iter().filter(|t| t.from_cache).count()
    }
}

pub struct DependencyWalker<'a> {
    schemas: &'a SchemaSet,
    tags_dir: PathBuf,
    groups: Option<HashSet<FourCC>>,
    cache: Option<TagCache>,
    migrations: Option<(&'a MigrationTable, MigrationConfig)>,
    read: ReadOptions,
}

impl<'a> DependencyWalker<'a> {
    pub fn new(schemas: &'a SchemaSet, tags_dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas,
            tags_dir: tags_dir.into(),
            groups: None,
            cache: None,
            migrations: None,
            read: ReadOptions::default(),
        }
    }

    /// Only follow references of these groups. The root is always loaded.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = FourCC>) -> Self {
        self.groups = Some(groups.into_iter().collect());
        self
    }

    pub fn with_cache(mut self, cache: TagCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Upgrade each loaded tag. Cached trees are stored as read and upgraded after loading.
    pub fn with_migrations(mut self, table: &'a MigrationTable, config: MigrationConfig) -> Self {
        self.migrations = Some((table, config));
        self
    }

    pub fn with_read_options(mut self, read: ReadOptions) -> Self {
        self.read = read;
        self
    }

    fn allowed(&self, group: FourCC) -> bool {
        self.groups.as_ref().is_none_or(|g| g.contains(&group))
    }

    pub fn walk(&self, root: &TagRef) -> Result<WalkReport> {
        let mut report = WalkReport::default();
        let mut visited = HashSet::new();
        let mut pending = vec![root.clone()];
        let mut is_root = true;

        while let Some(reference) = pending.pop() {
            let key = (reference.path.replace('\\', "/").to_ascii_lowercase(), reference.group);
            if reference.is_null() || !visited.insert(key) {
                continue;
            }
            if !is_root && !self.allowed(reference.group) {
                report.skipped.push(skip(&reference, SkipReason::NotAllowed));
                continue;
            }
            is_root = false;

            let Some(walked) = self.load(&reference, &mut report)? else {
                continue;
            };
            // Reverse so references are visited in field order.
            let children: Vec<TagRef> = walked.tag.tag_refs().into_iter().rev().cloned().collect();
            pending.extend(children);
            report.tags.push(walked);
        }

        info!(
            root = %root.path,
            loaded = report.tags.len(),
            cached = report.cache_hits(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "dependency walk finished"
        );
        Ok(report)
    }

    /// Load one reference, recording skips and per-file failures in `report`.
    fn load(&self, reference: &TagRef, report: &mut WalkReport) -> Result<Option<WalkedTag>> {
        let Ok(group) = self.schemas.get(reference.group) else {
            warn!(path = %reference.path, group = %reference.group, "no schema for group; skipping");
            report.skipped.push(skip(reference, SkipReason::Unsupported));
            return Ok(None);
        };
        let file = tag_file(&self.tags_dir, &reference.path, &group.extension);
        if !file.is_file() {
            warn!(path = %reference.path, file = %file.display(), "referenced tag not found; skipping");
            report.skipped.push(skip(reference, SkipReason::Missing));
            return Ok(None);
        }

        let cached = match &self.cache {
            Some(cache) => match cache.load(&reference.path, reference.group, &file) {
                Ok(hit) => hit,
                Err(e) => {
                    report.errors.push(FileError::new(&file, Stage::Cache, e));
                    None
                }
            },
            None => None,
        };
        let from_cache = cached.is_some();
        let mut tag = match cached {
            Some(tag) => tag,
            None => match Tag::read_file(&file, self.schemas, &self.read) {
                Ok(tag) => {
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.store(&reference.path, reference.group, &tag) {
                            report.errors.push(FileError::new(&file, Stage::Cache, e));
                        }
                    }
                    tag
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "failed to read dependency");
                    report.errors.push(FileError::new(&file, Stage::Read, e));
                    return Ok(None);
                }
            },
        };

        if let Some((table, config)) = &self.migrations {
            if let Err(e) = table.run(&mut tag, group, config) {
                report.errors.push(FileError::new(&file, Stage::Migrate, e));
            }
        }
        debug!(path = %reference.path, group = %reference.group, from_cache, "loaded dependency");
        Ok(Some(WalkedTag {
            path: reference.path.clone(),
            file,
            from_cache,
            tag,
        }))
    }
}

fn skip(reference: &TagRef, reason: SkipReason) -> SkippedRef {
    SkippedRef {
        path: reference.path.clone(),
        group: reference.group,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_file_appends_extension() {
        let file = tag_file(Path::new("/tags"), "levels\\a10\\floor", "shader");
        assert_eq!(file, Path::new("/tags/levels/a10/floor.shader"));
        let dotted = tag_file(Path::new("/tags"), "fx\\glow.v2", "light");
        assert_eq!(dotted, Path::new("/tags/fx/glow.v2.light"));
    }
}
