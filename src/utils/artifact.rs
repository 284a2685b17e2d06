//! Artifact naming and staging-area cleanup
//!
//! Artifact file names are `<name>.<YYYYMMDD-HHMM>.<ext>` with the timestamp in
//! UTC. The timestamp is fixed width and zero padded, so byte order of two names
//! for the same source equals chronological order. Retention depends on this.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// strftime format of the timestamp segment
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

/// Every extension the dump tool can produce
pub const STAGED_EXTENSIONS: &[&str] = &["gz.enc", "ravendbdump.enc"];

/// Encoding of a dump artifact, selected by the dump strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactEncoding {
    /// Compressed and encrypted generic dump
    Gzip,
    /// Encrypted RavenDB export
    RavenDbDump,
}

impl ArtifactEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactEncoding::Gzip => "gz.enc",
            ArtifactEncoding::RavenDbDump => "ravendbdump.enc",
        }
    }
}

/// A locally staged dump file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub timestamp: String,
    pub encoding: ArtifactEncoding,
    pub path: PathBuf,
}

impl Artifact {
    /// Plan an artifact for `name` stamped with `at`, inside `staging_dir`
    pub fn new(name: &str, encoding: ArtifactEncoding, at: DateTime<Utc>, staging_dir: &Path) -> Self {
        let timestamp = format_timestamp(at);
        let file_name = format!("{}.{}.{}", name, timestamp, encoding.extension());
        Self {
            name: name.to_string(),
            timestamp,
            encoding,
            path: staging_dir.join(file_name),
        }
    }

    /// Plan an artifact stamped with the current time
    pub fn now(name: &str, encoding: ArtifactEncoding, staging_dir: &Path) -> Self {
        Self::new(name, encoding, Utc::now(), staging_dir)
    }

    /// Object name used on every storage target
    pub fn file_name(&self) -> String {
        format!("{}.{}.{}", self.name, self.timestamp, self.encoding.extension())
    }

    /// Prefix shared by every artifact ever produced for this source
    ///
    /// Includes the trailing dot so `orders` never matches `orders_archive`.
    pub fn rotation_prefix(&self) -> String {
        format!("{}.", self.name)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Whether a file name carries one of the staged artifact extensions
pub fn is_staged_artifact(file_name: &str) -> bool {
    STAGED_EXTENSIONS
        .iter()
        .any(|ext| file_name.ends_with(&format!(".{}", ext)))
}

/// Remove every staged artifact in `staging_dir`, returning how many were removed
///
/// Not limited to the current source: leftovers of crashed runs go too.
pub fn remove_staged_files(staging_dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(staging_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to read staging directory: {:?}", staging_dir)
            })
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|entry| entry.ok()) {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !is_staged_artifact(&file_name) || !entry.path().is_file() {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed staged artifact: {:?}", entry.path());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove staged artifact {:?}: {}", entry.path(), e),
        }
    }

    Ok(removed)
}
