//! Destination layout for retrieved symbol files.

use crate::error::FetchError;
use crate::identity::RetrievalRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where symbol files land under the destination root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputLayout {
    /// `<root>/<name>/<GUID><age>/<name>`, the debugger symbol-cache shape
    Debugger,
    /// `<root>/<name>`
    #[default]
    SideBySide,
}

impl OutputLayout {
    /// Directory the symbol file for `request` is written into.
    pub fn destination_dir(&self, root: &Path, request: &RetrievalRequest) -> PathBuf {
        match self {
            OutputLayout::Debugger => root.join(&request.name).join(&request.build_key),
            OutputLayout::SideBySide => root.to_path_buf(),
        }
    }
}

impl FromStr for OutputLayout {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debugger" => Ok(OutputLayout::Debugger),
            "sidebyside" | "side-by-side" => Ok(OutputLayout::SideBySide),
            _ => Err(FetchError::InvalidConfig(format!(
                "Invalid output style '{}' (expected Debugger or SideBySide)",
                s
            ))),
        }
    }
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLayout::Debugger => write!(f, "Debugger"),
            OutputLayout::SideBySide => write!(f, "SideBySide"),
        }
    }
}
