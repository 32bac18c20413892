//! Directory-wide round-trip verification and conversion.
//!
//! Files are processed one at a time; each produces its own [`FileReport`]
//! so a failure in one file never stops its siblings.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::engine::Engine;
use crate::error::{Error, FileError, Stage};
use crate::file::{ReadOptions, Tag, WriteOptions};
use crate::header::TagHeader;
use crate::migrate::{MigrationConfig, MigrationTable};
use crate::schema::SchemaSet;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug)]
pub enum Outcome {
    /// Rewritten bytes equal the source.
    Identical,
    Mismatch {
        source_sha256: String,
        output_sha256: String,
    },
    Converted {
        output: PathBuf,
        migrated: bool,
    },
    /// Not a tag file, or a group/engine without support.
    Skipped { reason: String },
    Failed(FileError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn identical(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Identical))
    }

    pub fn mismatched(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Mismatch { .. }))
    }

    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Converted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// No mismatches and no failures.
    pub fn is_clean(&self) -> bool {
        self.mismatched() == 0 && self.failed() == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            match &file.outcome {
                Outcome::Identical => {}
                Outcome::Mismatch {
                    source_sha256,
                    output_sha256,
                } => writeln!(
                    f,
                    "MISMATCH {}: source {source_sha256} output {output_sha256}",
                    file.path.display()
                )?,
                Outcome::Converted { output, migrated } => writeln!(
                    f,
                    "converted {} -> {}{}",
                    file.path.display(),
                    output.display(),
                    if *migrated { " (migrated)" } else { "" }
                )?,
                Outcome::Skipped { reason } => writeln!(f, "skipped {}: {reason}", file.path.display())?,
                Outcome::Failed(e) => writeln!(f, "FAILED {e}")?,
            }
        }
        write!(
            f,
            "{} files: {} identical, {} converted, {} mismatched, {} skipped, {} failed",
            self.files.len(),
            self.identical(),
            self.converted(),
            self.mismatched(),
            self.skipped(),
            self.failed()
        )
    }
}

fn files_under(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

/// Read and parse one file, turning unsupported inputs into a skip.
fn read_tag(path: &Path, schemas: &SchemaSet) -> std::result::Result<(Vec<u8>, Tag), Outcome> {
    let data = std::fs::read(path).map_err(|e| Outcome::Failed(FileError::new(path, Stage::Open, e.into())))?;
    let unsupported = match TagHeader::parse(&data) {
        Ok(header) if !schemas.contains(header.group) => Some(format!("unsupported group {}", header.group)),
        Err(e @ (Error::TruncatedHeader { .. } | Error::UnknownEngine { .. })) => Some(e.to_string()),
        _ => None,
    };
    if let Some(reason) = unsupported {
        return Err(Outcome::Skipped { reason });
    }
    match Tag::read(&data, schemas, &ReadOptions::default()) {
        Ok(tag) => Ok((data, tag)),
        Err(e) => Err(Outcome::Failed(FileError::new(path, Stage::Read, e))),
    }
}

fn verify_file(path: &Path, schemas: &SchemaSet) -> Outcome {
    let (source, tag) = match read_tag(path, schemas) {
        Ok(read) => read,
        Err(outcome) => return outcome,
    };
    let output = match tag.write(schemas, &WriteOptions::default()) {
        Ok(bytes) => bytes,
        Err(e) => return Outcome::Failed(FileError::new(path, Stage::Write, e)),
    };
    if output == source {
        return Outcome::Identical;
    }
    let source_sha256 = sha256_hex(&source);
    let output_sha256 = sha256_hex(&output);
    warn!(
        path = %path.display(),
        source = %source_sha256,
        output = %output_sha256,
        "round trip mismatch"
    );
    Outcome::Mismatch {
        source_sha256,
        output_sha256,
    }
}

/// Read and rewrite every tag under `dir` for its own generation, comparing
/// whole-file hashes.
pub fn verify_round_trip(dir: &Path, schemas: &SchemaSet) -> BatchReport {
    let mut report = BatchReport::default();
    for path in files_under(dir) {
        let outcome = verify_file(&path, schemas);
        report.files.push(FileReport { path, outcome });
    }
    info!(
        dir = %dir.display(),
        files = report.files.len(),
        identical = report.identical(),
        mismatched = report.mismatched(),
        failed = report.failed(),
        "round trip verification finished"
    );
    report
}

/// Settings for [`convert_dir`].
pub struct ConvertOptions<'a> {
    pub engine: Engine,
    pub migrations: &'a MigrationTable,
    pub config: MigrationConfig,
}

fn convert_file(path: &Path, output: PathBuf, schemas: &SchemaSet, opts: &ConvertOptions<'_>) -> Outcome {
    let (_, mut tag) = match read_tag(path, schemas) {
        Ok(read) => read,
        Err(outcome) => return outcome,
    };
    let migrated = match schemas
        .get(tag.group())
        .and_then(|group| opts.migrations.run(&mut tag, group, &opts.config))
    {
        Ok(changed) => changed,
        Err(e) => return Outcome::Failed(FileError::new(path, Stage::Migrate, e)),
    };
    if let Err(e) = tag.write_file(&output, schemas, &WriteOptions::for_engine(opts.engine)) {
        return Outcome::Failed(FileError::new(path, Stage::Write, e));
    }
    Outcome::Converted { output, migrated }
}

/// Convert every tag under `src` into `dst` (same relative paths) for the
/// target generation, upgrading layouts unless the config preserves them.
pub fn convert_dir(src: &Path, dst: &Path, schemas: &SchemaSet, opts: &ConvertOptions<'_>) -> BatchReport {
    let mut report = BatchReport::default();
    for path in files_under(src) {
        let relative = path.strip_prefix(src).unwrap_or(&path);
        let outcome = convert_file(&path, dst.join(relative), schemas, opts);
        report.files.push(FileReport { path, outcome });
    }
    info!(
        src = %src.display(),
        dst = %dst.display(),
        engine = %opts.engine,
        converted = report.converted(),
        skipped = report.skipped(),
        failed = report.failed(),
        "conversion finished"
    );
    report
}
