//! Per-binary retrieval engine
//!
//! One [`Engine::fetch`] call resolves one binary: metadata read, existence
//! check, probe sequence, materialization. Every call yields exactly one
//! [`RetrievalOutcome`]; faults are folded into the report rather than
//! returned, so a batch never stops on a single binary.

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::expand::{Expander, ExternalExpander};
use crate::identity::{build_remote_path, RetrievalRequest};
use crate::layout::OutputLayout;
use crate::ledger::{FailureLedger, FailureLog};
use crate::materialize::{ExpansionStatus, Materialized, Materializer};
use crate::metadata::{MetadataReader, PeMetadataReader};
use crate::probe::{self, ProbeOutcome};
use crate::transport::{HttpTransport, SymbolTransport};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RetrievalOutcome {
    /// The symbol file was already at its destination
    AlreadyExists,
    Success,
    /// No probe located the symbol file
    NotFound,
    /// The binary declares no usable debug information
    NoDebugInfo,
    Error,
}

impl RetrievalOutcome {
    pub const ALL: [RetrievalOutcome; 5] = [
        RetrievalOutcome::Success,
        RetrievalOutcome::AlreadyExists,
        RetrievalOutcome::NotFound,
        RetrievalOutcome::NoDebugInfo,
        RetrievalOutcome::Error,
    ];
}

impl fmt::Display for RetrievalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalOutcome::AlreadyExists => write!(f, "AlreadyExists"),
            RetrievalOutcome::Success => write!(f, "Success"),
            RetrievalOutcome::NotFound => write!(f, "NotFound"),
            RetrievalOutcome::NoDebugInfo => write!(f, "NoDebugInfo"),
            RetrievalOutcome::Error => write!(f, "Error"),
        }
    }
}

/// Everything known about one binary after a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub binary: PathBuf,
    pub outcome: RetrievalOutcome,
    /// Symbol file name, when the binary has debug metadata
    pub symbol: Option<String>,
    /// Where the symbol file is (or would be) on disk
    pub destination: Option<PathBuf>,
    pub bytes: Option<u64>,
    pub sha256: Option<String>,
    pub expansion: Option<ExpansionStatus>,
    /// Failure description for `Error` outcomes
    pub error: Option<String>,
}

impl FetchReport {
    fn new(binary: &Path, outcome: RetrievalOutcome) -> Self {
        FetchReport {
            binary: binary.to_path_buf(),
            outcome,
            symbol: None,
            destination: None,
            bytes: None,
            sha256: None,
            expansion: None,
            error: None,
        }
    }
}

/// Symbol retrieval engine
pub struct Engine {
    server: String,
    output_dir: PathBuf,
    layout: OutputLayout,
    reader: Arc<dyn MetadataReader>,
    transport: Arc<dyn SymbolTransport>,
    materializer: Materializer,
    log: FailureLog,
    ledger: FailureLedger,
}

impl Engine {
    /// Build an engine over explicit collaborators.
    pub fn new(
        config: &FetchConfig,
        reader: Arc<dyn MetadataReader>,
        transport: Arc<dyn SymbolTransport>,
        expander: Arc<dyn Expander>,
    ) -> Self {
        Engine {
            server: config.server.clone(),
            output_dir: config.output_dir.clone(),
            layout: config.layout,
            reader,
            transport,
            materializer: Materializer::new(expander),
            log: FailureLog::new(&config.log_file),
            ledger: FailureLedger::new(),
        }
    }

    /// Build the production engine: PE metadata, HTTP transport, external
    /// expander.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.http_timeout())?;
        let expander = ExternalExpander::new(&config.expand_program, config.expand_timeout());
        Ok(Self::new(
            config,
            Arc::new(PeMetadataReader),
            Arc::new(transport),
            Arc::new(expander),
        ))
    }

    /// Remote request path for `binary`; empty when nothing can be fetched.
    pub fn remote_path(&self, binary: &Path) -> String {
        build_remote_path(self.reader.as_ref(), &self.server, binary)
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn take_ledger(&mut self) -> FailureLedger {
        std::mem::take(&mut self.ledger)
    }

    /// Retrieve the symbols for `binary`.
    #[instrument(name = "symfetch.fetch", skip(self, binary), fields(binary = %binary.display()))]
    pub async fn fetch(&mut self, binary: &Path) -> FetchReport {
        let remote_path = self.remote_path(binary);
        if remote_path.is_empty() {
            debug!("no debug information");
            return FetchReport::new(binary, RetrievalOutcome::NoDebugInfo);
        }

        let mut request = RetrievalRequest::new(remote_path);
        let destination_dir = self.layout.destination_dir(&self.output_dir, &request);
        let destination = destination_dir.join(&request.name);

        let mut report = FetchReport::new(binary, RetrievalOutcome::AlreadyExists);
        report.symbol = Some(request.name.clone());
        report.destination = Some(destination.clone());

        if destination.exists() {
            debug!(destination = %destination.display(), "symbol file already present");
            return report;
        }

        match self.locate_and_write(&mut request, &destination_dir).await {
            Ok(Located::Written(written)) => {
                info!(
                    symbol = %request.name,
                    bytes = written.bytes,
                    compressed = request.is_compressed,
                    "retrieved symbol file"
                );
                if let ExpansionStatus::Failed(message) = &written.expansion {
                    self.log_failure(&request.name, message);
                }
                report.outcome = RetrievalOutcome::Success;
                report.destination = Some(written.path);
                report.bytes = Some(written.bytes);
                report.sha256 = Some(written.sha256);
                report.expansion = Some(written.expansion);
            }
            Ok(Located::Missing) => {
                let diagnostic = self
                    .ledger
                    .get(&request.name)
                    .unwrap_or(" - No matching PDBs found")
                    .to_string();
                debug!(symbol = %request.name, diagnostic = %diagnostic, "symbol file not found");
                self.log_failure(&request.name, diagnostic.trim_start_matches(" - "));
                report.outcome = RetrievalOutcome::NotFound;
            }
            Err(e) => {
                warn!(symbol = %request.name, error = %e, "retrieval failed");
                self.log_failure(&request.name, &e.to_string());
                report.outcome = RetrievalOutcome::Error;
                report.error = Some(e.to_string());
            }
        }

        report
    }

    async fn locate_and_write(
        &mut self,
        request: &mut RetrievalRequest,
        destination_dir: &Path,
    ) -> Result<Located> {
        let outcome = probe::retrieve(self.transport.as_ref(), request, &mut self.ledger).await?;

        let payload = match outcome {
            ProbeOutcome::Found(payload) => payload,
            ProbeOutcome::NotFound => return Ok(Located::Missing),
            ProbeOutcome::Rejected(status) => {
                return Err(FetchError::Transport {
                    url: request.remote_path.clone(),
                    message: status.to_string(),
                })
            }
        };

        let written = self
            .materializer
            .materialize(payload, request, destination_dir)
            .await?;
        Ok(Located::Written(written))
    }

    fn log_failure(&self, file_name: &str, text: &str) {
        if let Err(e) = self.log.append(file_name, text) {
            warn!(log = %self.log.path().display(), error = %e, "failed to write failure log");
        }
    }
}

enum Located {
    Written(Materialized),
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeExpander, FakeMetadataReader, FakeTransport};
    use crate::identity::DebugMetadata;
    use uuid::Uuid;

    const SERVER: &str = "https://s";
    const REMOTE: &str = "https://s/foo.pdb/0A1B2C3D4E5F60718293A4B5C6D7E8F91/foo.pdb";

    fn meta() -> DebugMetadata {
        DebugMetadata {
            pdb_path: r"c:\build\foo.pdb".to_string(),
            build_id: Uuid::parse_str("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9").unwrap(),
            revision: 1,
        }
    }

    fn engine(dir: &Path, transport: Arc<FakeTransport>) -> Engine {
        let config = FetchConfig::default()
            .with_server(SERVER)
            .with_output_dir(dir.join("out"))
            .with_log_file(dir.join("Log.txt"));
        Engine::new(
            &config,
            Arc::new(FakeMetadataReader::new().with("foo.dll", meta())),
            transport,
            Arc::new(FakeExpander::succeeding()),
        )
    }

    #[test]
    fn test_remote_path_uses_configured_server() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), Arc::new(FakeTransport::new()));
        assert_eq!(engine.remote_path(Path::new("foo.dll")), REMOTE);
        assert!(engine.remote_path(Path::new("other.dll")).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_status_is_error_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new().respond(REMOTE, 500, b""));
        let mut engine = engine(dir.path(), transport);

        let report = engine.fetch(Path::new("foo.dll")).await;

        assert_eq!(report.outcome, RetrievalOutcome::Error);
        assert!(report.error.unwrap().contains("500"));
        assert_eq!(engine.ledger().get("foo.pdb"), Some(" - 500  Internal Server Error"));
    }

    #[tokio::test]
    async fn test_take_ledger_empties_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(dir.path(), Arc::new(FakeTransport::new()));

        engine.fetch(Path::new("foo.dll")).await;
        let ledger = engine.take_ledger();

        assert_eq!(ledger.len(), 1);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RetrievalOutcome::NoDebugInfo.to_string(), "NoDebugInfo");
        assert_eq!(RetrievalOutcome::ALL.len(), 5);
    }
}
