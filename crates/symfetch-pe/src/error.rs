//! Error types for symfetch-pe

use thiserror::Error;

/// Errors that can occur while reading a PE image
#[derive(Error, Debug)]
pub enum PeError {
    /// The file does not start with an `MZ` header
    #[error("Not a PE image: missing DOS header")]
    MissingDosHeader,

    /// The `PE\0\0` signature is absent at `e_lfanew`
    #[error("Not a PE image: missing PE signature at offset {0:#x}")]
    MissingPeSignature(usize),

    /// Optional header magic is neither PE32 nor PE32+
    #[error("Unsupported optional header magic: {0:#x}")]
    UnsupportedOptionalHeader(u16),

    /// A structure extends past the end of the image
    #[error("Truncated image while reading {what} at offset {offset:#x}")]
    Truncated { what: &'static str, offset: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
