//! Failure recording
//!
//! - [`FailureLedger`]: in-memory map of symbol file name to diagnostic,
//!   first diagnostic wins. Advisory only.
//! - [`FailureLog`]: append-only, timestamped log file shared across runs.

use crate::error::Result;
use chrono::Local;
use fs4::FileExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Symbol files that could not be resolved, keyed by file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureLedger {
    entries: BTreeMap<String, String>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `diagnostic` for `file_name` unless one is already present.
    ///
    /// Returns `true` if the entry was added.
    pub fn record(&mut self, file_name: &str, diagnostic: impl Into<String>) -> bool {
        if self.entries.contains_key(file_name) {
            return false;
        }
        self.entries
            .insert(file_name.to_string(), diagnostic.into());
        true
    }

    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fold `other` in; entries already present here win.
    pub fn merge(&mut self, other: FailureLedger) {
        for (file_name, diagnostic) in other.entries {
            self.entries.entry(file_name).or_insert(diagnostic);
        }
    }
}

/// Append-only failure log
///
/// Each append holds an exclusive lock on the file so concurrent
/// processes do not interleave lines.
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FailureLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `<timestamp>   <file_name> - <text>`.
    pub fn append(&self, file_name: &str, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let line = format!(
            "{}   {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            file_name,
            text
        );
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
