//! Deletion policy for binaries whose symbols cannot be retrieved.
//!
//! Written on the command line as `+`-joined flag names, e.g.
//! `NotFound+NoSymbols+DryRun`.

use crate::engine::RetrievalOutcome;
use crate::error::FetchError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

bitflags! {
    /// Independently combinable deletion flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeletionPolicy: u8 {
        /// Delete binaries whose symbols are not on the server
        const NOT_FOUND = 1 << 0;
        /// Delete binaries that carry no debug information
        const NO_SYMBOLS = 1 << 1;
        /// Report deletions without performing them
        const DRY_RUN = 1 << 2;
    }
}

impl DeletionPolicy {
    /// Whether `outcome` selects the binary for deletion.
    pub fn selects(&self, outcome: RetrievalOutcome) -> bool {
        match outcome {
            RetrievalOutcome::NotFound => self.contains(DeletionPolicy::NOT_FOUND),
            RetrievalOutcome::NoDebugInfo => self.contains(DeletionPolicy::NO_SYMBOLS),
            RetrievalOutcome::AlreadyExists
            | RetrievalOutcome::Success
            | RetrievalOutcome::Error => false,
        }
    }

    /// Apply the policy to `binary` given its retrieval outcome.
    ///
    /// Never fails: a deletion error is reported in the returned action.
    pub fn apply(&self, outcome: RetrievalOutcome, binary: &Path) -> DeletionAction {
        if !self.selects(outcome) {
            return DeletionAction::Kept;
        }
        if self.contains(DeletionPolicy::DRY_RUN) {
            return DeletionAction::WouldDelete;
        }

        match std::fs::remove_file(binary) {
            Ok(()) => DeletionAction::Deleted,
            Err(source) => DeletionAction::Failed(
                FetchError::Policy {
                    path: binary.to_path_buf(),
                    source,
                }
                .to_string(),
            ),
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut policy = DeletionPolicy::empty();
        for token in s.split('+') {
            let normalized: String = token
                .trim()
                .chars()
                .filter(|c| *c != '-' && *c != '_')
                .collect::<String>()
                .to_ascii_lowercase();

            policy |= match normalized.as_str() {
                "notfound" => DeletionPolicy::NOT_FOUND,
                "nosymbols" => DeletionPolicy::NO_SYMBOLS,
                "dryrun" => DeletionPolicy::DRY_RUN,
                "none" => DeletionPolicy::empty(),
                _ => {
                    return Err(FetchError::InvalidConfig(format!(
                        "Invalid deletion flag '{}' (expected NotFound, NoSymbols, DryRun or None)",
                        token.trim()
                    )))
                }
            };
        }
        Ok(policy)
    }
}

/// What the policy did to one binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "error")]
pub enum DeletionAction {
    Kept,
    Deleted,
    /// Selected for deletion under dry-run
    WouldDelete,
    Failed(String),
}
