//! Error types for symfetch-core

use crate::expand::ExpandError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while retrieving symbols
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connectivity or protocol failure talking to the symbol server
    #[error("Transport failure for {url}: {message}")]
    Transport { url: String, message: String },

    /// Destination creation, write, or copy failed
    #[error("IO error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// Refusing to overwrite an existing artifact
    #[error("Artifact already exists: {0:?}")]
    ArtifactExists(PathBuf),

    /// The external expansion step failed
    #[error("Decompression failed: {0}")]
    Decompression(#[from] ExpandError),

    /// Deleting a binary under the deletion policy failed
    #[error("Failed to delete {path:?}: {source}")]
    Policy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The binary could not be parsed for debug metadata
    #[error("Unreadable binary: {0}")]
    Metadata(#[from] symfetch_pe::PeError),

    /// Malformed top-level configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

/// Result type for symbol retrieval operations
pub type Result<T> = std::result::Result<T, FetchError>;
