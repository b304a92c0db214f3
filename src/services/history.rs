//! Per-file version history and diffs, for embedders that also hold file
//! contents. No command line path consumes it.

use std::collections::HashMap;
use std::time::SystemTime;

use parking_lot::RwLock;
use similar::TextDiff;
use snafu::{OptionExt, Snafu};
use tracing::debug;

use crate::ext::SystemTimeExt;
use crate::filesystem::ChangeStatus;

/// Longest summary kept for a version, in characters.
const SUMMARY_CHARS: usize = 300;

/// One known revision of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    pub version: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub summary: String,
    pub change: ChangeStatus,
}

/// Read side of the producer's per-file history.
pub trait HistoryLookup {
    /// Known versions of `path`, oldest first.
    async fn versions(&self, path: &str) -> Result<Vec<FileVersion>, HistoryError>;

    /// Unified diff lines between `version` of `path` and its predecessor.
    async fn diff(&self, path: &str, version: u32) -> Result<Vec<String>, HistoryError>;
}

struct StoredVersion {
    meta: FileVersion,
    text: String,
}

/// History kept in process memory, keyed by path.
#[derive(Default)]
pub struct LocalHistory {
    files: RwLock<HashMap<String, Vec<StoredVersion>>>,
}

impl LocalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new version of `path` and returns its number, starting at 1.
    pub fn record(
        &self,
        path: &str,
        text: impl Into<String>,
        change: ChangeStatus,
        at: SystemTime,
    ) -> u32 {
        let text = text.into();
        let mut files = self.files.write();
        let versions = files.entry(path.to_string()).or_default();
        let version = versions.len() as u32 + 1;

        versions.push(StoredVersion {
            meta: FileVersion {
                version,
                timestamp: at.unix_seconds(),
                summary: text.chars().take(SUMMARY_CHARS).collect(),
                change,
            },
            text,
        });
        debug!("Recorded version {} of '{}' ({})", version, path, change);
        version
    }
}

impl HistoryLookup for LocalHistory {
    async fn versions(&self, path: &str) -> Result<Vec<FileVersion>, HistoryError> {
        let files = self.files.read();
        let versions = files.get(path).context(UnknownPathSnafu { path })?;
        Ok(versions.iter().map(|stored| stored.meta.clone()).collect())
    }

    async fn diff(&self, path: &str, version: u32) -> Result<Vec<String>, HistoryError> {
        let files = self.files.read();
        let versions = files.get(path).context(UnknownPathSnafu { path })?;
        let index = (version as usize)
            .checked_sub(1)
            .filter(|index| *index < versions.len())
            .context(UnknownVersionSnafu { path, version })?;

        let before = match index {
            0 => "",
            _ => versions[index - 1].text.as_str(),
        };
        let after = versions[index].text.as_str();

        let diff = TextDiff::from_lines(before, after);
        let unified = diff
            .unified_diff()
            .header("before", "after")
            .to_string();
        Ok(unified.lines().map(str::to_string).collect())
    }
}

#[derive(Debug, Snafu)]
pub enum HistoryError {
    #[snafu(display("No history is known for '{}'", path))]
    UnknownPath { path: String },
    #[snafu(display("'{}' has no version {}", path, version))]
    UnknownVersion { path: String, version: u32 },
}
