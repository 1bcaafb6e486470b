//! In-memory fakes for the engine's seams (testing only)
//!
//! Provides `FakeTransport`, `FakeMetadataReader`, and `FakeExpander`
//! that satisfy the trait contracts without a network, real binaries, or
//! an external expansion tool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::expand::{ExpandError, Expander};
use crate::identity::DebugMetadata;
use crate::metadata::MetadataReader;
use crate::transport::{ProbeResponse, ProbeStatus, SymbolTransport};

// ---------------------------------------------------------------------------
// FakeTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Respond { code: u16, body: Vec<u8> },
    Fail(String),
}

/// Symbol server backed by a `HashMap<url, response>`.
///
/// Unscripted URLs answer 404. Every request is recorded in order.
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `code` and `body`.
    pub fn respond(mut self, url: &str, code: u16, body: &[u8]) -> Self {
        self.responses.insert(
            url.to_string(),
            Scripted::Respond {
                code,
                body: body.to_vec(),
            },
        );
        self
    }

    /// Fail the exchange for `url` with a transport error.
    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.responses
            .insert(url.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SymbolTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<ProbeResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        match self.responses.get(url) {
            Some(Scripted::Fail(message)) => Err(FetchError::Transport {
                url: url.to_string(),
                message: message.clone(),
            }),
            Some(Scripted::Respond { code, body }) => {
                let status = ProbeStatus::from_code(*code);
                let body = if status == ProbeStatus::Ok {
                    body.clone()
                } else {
                    Vec::new()
                };
                Ok(ProbeResponse {
                    url: url.to_string(),
                    status,
                    body,
                })
            }
            None => Ok(ProbeResponse {
                url: url.to_string(),
                status: ProbeStatus::NotFound,
                body: Vec::new(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeMetadataReader
// ---------------------------------------------------------------------------

/// Metadata keyed by binary path; unknown paths carry no debug information.
#[derive(Debug, Default)]
pub struct FakeMetadataReader {
    entries: HashMap<PathBuf, DebugMetadata>,
    unreadable: Vec<PathBuf>,
}

impl FakeMetadataReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, binary: impl Into<PathBuf>, meta: DebugMetadata) -> Self {
        self.entries.insert(binary.into(), meta);
        self
    }

    /// Make reads of `binary` fail as if it were not a valid image.
    pub fn unreadable(mut self, binary: impl Into<PathBuf>) -> Self {
        self.unreadable.push(binary.into());
        self
    }
}

impl MetadataReader for FakeMetadataReader {
    fn read(&self, binary: &Path) -> Result<Option<DebugMetadata>> {
        if self.unreadable.iter().any(|p| p == binary) {
            return Err(FetchError::Metadata(symfetch_pe::PeError::MissingDosHeader));
        }
        Ok(self.entries.get(binary).cloned())
    }
}

// ---------------------------------------------------------------------------
// FakeExpander
// ---------------------------------------------------------------------------

/// Expander that copies the compressed file to the target, or always fails.
#[derive(Debug, Default)]
pub struct FakeExpander {
    fail: bool,
    invocations: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeExpander {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        FakeExpander {
            fail: true,
            ..Self::default()
        }
    }

    /// `(compressed, target)` pairs seen so far.
    pub fn invocations(&self) -> Vec<(PathBuf, PathBuf)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Expander for FakeExpander {
    async fn expand(&self, compressed: &Path, target: &Path) -> std::result::Result<(), ExpandError> {
        self.invocations
            .lock()
            .unwrap()
            .push((compressed.to_path_buf(), target.to_path_buf()));

        if self.fail {
            return Err(ExpandError::Exit {
                program: "fake-expand".to_string(),
                code: Some(1),
                stderr: "corrupt cabinet".to_string(),
            });
        }

        std::fs::copy(compressed, target).map_err(|source| ExpandError::Launch {
            program: "fake-expand".to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_transport_defaults_to_not_found() {
        let transport = FakeTransport::new();
        let response = transport.get("https://s/x.pdb/A1/x.pdb").await.unwrap();
        assert_eq!(response.status, ProbeStatus::NotFound);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fake_transport_scripted_failure() {
        let transport = FakeTransport::new().fail("https://s/x", "reset");
        assert!(transport.get("https://s/x").await.is_err());
    }

    #[test]
    fn test_fake_reader_unknown_binary_has_no_metadata() {
        let reader = FakeMetadataReader::new();
        assert!(reader.read(Path::new("a.dll")).unwrap().is_none());
    }
}
