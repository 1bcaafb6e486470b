//! Batch orchestration over a directory of binaries.

use crate::engine::{Engine, FetchReport, RetrievalOutcome};
use crate::error::{FetchError, Result};
use crate::format::SizeUnits;
use crate::ledger::FailureLedger;
use crate::materialize::ExpansionStatus;
use crate::policy::{DeletionAction, DeletionPolicy};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Binaries under `root` whose extension matches one of `extensions`
/// (case-insensitive), sorted by path.
pub fn scan_binaries(root: &Path, recursive: bool, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(FetchError::InvalidConfig(format!(
            "Input directory {} does not exist",
            root.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut binaries: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), extensions))
        .map(|e| e.into_path())
        .collect();

    binaries.sort();
    Ok(binaries)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// One binary's fetch plus what the deletion policy did to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub fetch: FetchReport,
    pub deletion: DeletionAction,
}

impl FileReport {
    /// Console summary, e.g. `Success (1.5MB)` or
    /// `Symbols not found (deleted)`.
    pub fn summary_line(&self) -> String {
        self.summary_line_in(SizeUnits::Binary)
    }

    /// [`summary_line`](Self::summary_line) with sizes in `units`.
    pub fn summary_line_in(&self, units: SizeUnits) -> String {
        let mut line = match self.fetch.outcome {
            RetrievalOutcome::Success => {
                let size = self
                    .fetch
                    .bytes
                    .map(|bytes| units.format(bytes))
                    .unwrap_or_default();
                match &self.fetch.expansion {
                    Some(ExpansionStatus::Failed(_)) => {
                        format!("Success ({}, decompression failed)", size)
                    }
                    _ => format!("Success ({})", size),
                }
            }
            RetrievalOutcome::AlreadyExists => "Symbols already exist".to_string(),
            RetrievalOutcome::NotFound => "Symbols not found".to_string(),
            RetrievalOutcome::NoDebugInfo => "No debug information".to_string(),
            RetrievalOutcome::Error => format!(
                "Error: {}",
                self.fetch.error.as_deref().unwrap_or("unknown failure")
            ),
        };

        match &self.deletion {
            DeletionAction::Kept => {}
            DeletionAction::Deleted => line.push_str(" (deleted)"),
            DeletionAction::WouldDelete => line.push_str(" (would delete)"),
            DeletionAction::Failed(e) => line.push_str(&format!(" (delete failed: {})", e)),
        }
        line
    }
}

/// Result of a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    /// Symbol files that could not be resolved
    pub failures: FailureLedger,
}

impl BatchReport {
    pub fn count(&self, outcome: RetrievalOutcome) -> usize {
        self.files
            .iter()
            .filter(|f| f.fetch.outcome == outcome)
            .count()
    }
}

/// Runs the engine over binaries one at a time and applies the deletion
/// policy.
pub struct BatchOrchestrator {
    engine: Engine,
    policy: DeletionPolicy,
    report: BatchReport,
}

impl BatchOrchestrator {
    pub fn new(engine: Engine, policy: DeletionPolicy) -> Self {
        BatchOrchestrator {
            engine,
            policy,
            report: BatchReport::default(),
        }
    }

    /// Fetch one binary and apply the deletion policy to it.
    pub async fn process(&mut self, binary: &Path) -> FileReport {
        let fetch = self.engine.fetch(binary).await;
        let deletion = self.policy.apply(fetch.outcome, binary);

        match &deletion {
            DeletionAction::Deleted => info!(binary = %binary.display(), "deleted binary"),
            DeletionAction::WouldDelete => {
                info!(binary = %binary.display(), "would delete binary (dry run)")
            }
            DeletionAction::Failed(e) => {
                warn!(binary = %binary.display(), error = %e, "failed to delete binary")
            }
            DeletionAction::Kept => {}
        }

        let file = FileReport { fetch, deletion };
        self.report.files.push(file.clone());
        file
    }

    /// Process every binary in order.
    pub async fn run(mut self, binaries: &[PathBuf]) -> BatchReport {
        for binary in binaries {
            self.process(binary).await;
        }
        self.finish()
    }

    /// Close the batch, folding in the engine's failure ledger.
    pub fn finish(mut self) -> BatchReport {
        let ledger = self.engine.take_ledger();
        self.report.failures.merge(ledger);
        self.report
    }
}
