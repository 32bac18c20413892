use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file too short for tag header: need {need} bytes, have {have}")]
    TruncatedHeader { need: usize, have: usize },

    #[error("unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("unknown engine tag {found:?}")]
    UnknownEngine { found: [u8; 4] },

    #[error("no schema for tag group {group:?}")]
    UnknownGroup { group: String },

    #[error("block {block:?} has no layout flagged latest")]
    MissingCanonicalLayout { block: String },

    #[error("block {block:?} has no layout for version {version}")]
    UnknownLayoutVersion { block: String, version: i32 },

    #[error("schema {context}: {message}")]
    Schema { context: String, message: String },

    #[error("migration for {group:?} failed: {message}")]
    Migration { group: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            context: context.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Processing stage a per-file failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Open,
    Read,
    Migrate,
    Write,
    Compare,
    Cache,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Open => "open",
            Stage::Read => "read",
            Stage::Migrate => "migrate",
            Stage::Write => "write",
            Stage::Compare => "compare",
            Stage::Cache => "cache",
        };
        f.write_str(name)
    }
}

/// An [`Error`] tied to the file and stage it came from.
///
/// Batch and walker callers collect these instead of aborting so sibling
/// files keep processing.
#[derive(Debug, Error)]
#[error("{stage} {}: {source}", path.display())]
pub struct FileError {
    pub path: PathBuf,
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, source: Error) -> Self {
        Self {
            path: path.into(),
            stage,
            source,
        }
    }
}
