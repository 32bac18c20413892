//! On-disk cache of parsed tags.
//!
//! One JSON artifact per `(path, group)`, named by the SHA-256 of the key.
//! An artifact is only trusted while its recorded checksum matches the
//! header checksum of the tag file on disk; anything stale or unreadable is
//! discarded and regenerated by the caller.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::Result;
use crate::file::Tag;
use crate::fourcc::FourCC;
use crate::header::{TagHeader, TAG_HEADER_SIZE};

/// Bumped whenever the artifact layout or value model changes.
pub const CACHE_FORMAT: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    format: u32,
    path: String,
    group: FourCC,
    checksum: u32,
    tag: Tag,
}

/// Normalized cache key: lowercased, forward slashes.
fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}

/// Header checksum of the tag file at `source`, reading only the header.
pub fn file_checksum(source: &Path) -> Result<u32> {
    let mut header = [0u8; TAG_HEADER_SIZE];
    File::open(source)?.read_exact(&mut header)?;
    Ok(TagHeader::parse(&header)?.checksum)
}

#[derive(Debug, Clone)]
pub struct TagCache {
    dir: PathBuf,
}

impl TagCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact location for `(path, group)`.
    pub fn artifact_path(&self, path: &str, group: FourCC) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(normalize(path).as_bytes());
        hasher.update(b"|");
        hasher.update(group.0);
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    /// The cached tree for `(path, group)` if it is still valid for `source`.
    pub fn load(&self, path: &str, group: FourCC, source: &Path) -> Result<Option<Tag>> {
        let artifact = self.artifact_path(path, group);
        let text = match std::fs::read_to_string(&artifact) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path, %group, "cache miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(artifact = %artifact.display(), error = %e, "discarding unreadable cache artifact");
                self.remove(&artifact)?;
                return Ok(None);
            }
        };
        if entry.format != CACHE_FORMAT || entry.group != group || normalize(&entry.path) != normalize(path) {
            debug!(path, %group, "discarding cache artifact from another format or key");
            self.remove(&artifact)?;
            return Ok(None);
        }
        let on_disk = file_checksum(source)?;
        if on_disk != entry.checksum {
            debug!(path, %group, cached = entry.checksum, on_disk, "cache artifact is stale");
            self.remove(&artifact)?;
            return Ok(None);
        }
        debug!(path, %group, "cache hit");
        Ok(Some(entry.tag))
    }

    /// Persist `tag` under `(path, group)`, keyed to its header checksum.
    pub fn store(&self, path: &str, group: FourCC, tag: &Tag) -> Result<PathBuf> {
        let artifact = self.artifact_path(path, group);
        let entry = CacheEntry {
            format: CACHE_FORMAT,
            path: path.to_string(),
            group,
            checksum: tag.header.checksum,
            tag: tag.clone(),
        };
        std::fs::write(&artifact, serde_json::to_vec(&entry)?)?;
        debug!(path, %group, artifact = %artifact.display(), "cached tag");
        Ok(artifact)
    }

    /// Drop the artifact for `(path, group)`. Returns whether one existed.
    pub fn invalidate(&self, path: &str, group: FourCC) -> Result<bool> {
        let artifact = self.artifact_path(path, group);
        let existed = artifact.exists();
        self.remove(&artifact)?;
        Ok(existed)
    }

    fn remove(&self, artifact: &Path) -> Result<()> {
        match std::fs::remove_file(artifact) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
