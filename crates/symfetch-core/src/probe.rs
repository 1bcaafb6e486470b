//! Three-tier probe protocol against a symbol server.
//!
//! ```text
//!   Direct ──not found──▶ Compressed ──not found──▶ Pointer ──not found──▶ NotFound
//!     │                       │                        │
//!     └──── found ────────────┴──────── found ─────────┴──▶ Found
//!   any other status in any state ──▶ Rejected
//! ```
//!
//! The first status that is not a clean not-found decides the outcome.
//! A transport fault aborts the whole retrieval.

use crate::error::Result;
use crate::identity::{compressed_variant, pointer_variant, RetrievalRequest};
use crate::ledger::FailureLedger;
use crate::transport::{ProbeStatus, SymbolTransport};
use std::path::PathBuf;
use tracing::debug;

/// Marker a pointer file starts with when it redirects to a path.
pub const POINTER_MARKER: &str = "PATH";

/// Bytes skipped before the redirect path (`PATH:`).
pub const POINTER_PREFIX_LEN: usize = 5;

/// Probe currently being issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Direct,
    Compressed,
    Pointer,
}

/// Response status, as far as the state machine cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Found,
    Missing,
    Rejected,
}

impl From<&ProbeStatus> for StatusClass {
    fn from(status: &ProbeStatus) -> Self {
        match status {
            ProbeStatus::Ok => StatusClass::Found,
            ProbeStatus::NotFound => StatusClass::Missing,
            ProbeStatus::Other { .. } => StatusClass::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Use this probe's response
    Accept,
    /// Issue the next probe
    Advance(ProbeState),
    /// Every probe came back not-found
    Exhausted,
    /// Terminal non-success status
    Reject,
}

impl ProbeState {
    /// Transition table.
    pub fn on(self, class: StatusClass) -> Transition {
        match (self, class) {
            (_, StatusClass::Found) => Transition::Accept,
            (_, StatusClass::Rejected) => Transition::Reject,
            (ProbeState::Direct, StatusClass::Missing) => Transition::Advance(ProbeState::Compressed),
            (ProbeState::Compressed, StatusClass::Missing) => Transition::Advance(ProbeState::Pointer),
            (ProbeState::Pointer, StatusClass::Missing) => Transition::Exhausted,
        }
    }

    /// URL this probe requests for `remote_path`.
    pub fn url_for(self, remote_path: &str) -> String {
        match self {
            ProbeState::Direct => remote_path.to_string(),
            ProbeState::Compressed => compressed_variant(remote_path),
            ProbeState::Pointer => pointer_variant(remote_path),
        }
    }
}

/// Where the located artifact comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes served by the symbol server
    Download(Vec<u8>),
    /// Local file a pointer redirected to
    LocalFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found(Payload),
    NotFound,
    /// A probe returned a status other than success or not-found
    Rejected(ProbeStatus),
}

/// Run the probe sequence for `request`.
///
/// Marks `request` compressed when the compressed probe succeeds. Every
/// exhausted or rejected sequence leaves a diagnostic in `ledger`.
pub async fn retrieve(
    transport: &dyn SymbolTransport,
    request: &mut RetrievalRequest,
    ledger: &mut FailureLedger,
) -> Result<ProbeOutcome> {
    let mut state = ProbeState::Direct;

    loop {
        let url = state.url_for(&request.remote_path);
        debug!(probe = ?state, url = %url, "probing symbol server");

        let response = transport.get(&url).await?;
        match state.on(StatusClass::from(&response.status)) {
            Transition::Accept => {
                return Ok(match state {
                    ProbeState::Direct => ProbeOutcome::Found(Payload::Download(response.body)),
                    ProbeState::Compressed => {
                        request.is_compressed = true;
                        ProbeOutcome::Found(Payload::Download(response.body))
                    }
                    ProbeState::Pointer => resolve_pointer(&url, &response.body, request, ledger),
                });
            }
            Transition::Advance(next) => state = next,
            Transition::Exhausted => {
                ledger.record(&request.name, format!(" - {}", response.status));
                return Ok(ProbeOutcome::NotFound);
            }
            Transition::Reject => {
                ledger.record(&request.name, format!(" - {}", response.status));
                return Ok(ProbeOutcome::Rejected(response.status));
            }
        }
    }
}

/// Redirect target named by a pointer file body, if it has the marker.
pub fn pointer_target(body: &str) -> Option<PathBuf> {
    if !body.starts_with(POINTER_MARKER) {
        return None;
    }
    body.get(POINTER_PREFIX_LEN..)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

fn resolve_pointer(
    pointer_url: &str,
    body: &[u8],
    request: &RetrievalRequest,
    ledger: &mut FailureLedger,
) -> ProbeOutcome {
    let text = String::from_utf8_lossy(body);

    if let Some(target) = pointer_target(&text) {
        if target.exists() {
            debug!(target = %target.display(), "pointer redirects to local file");
            return ProbeOutcome::Found(Payload::LocalFile(target));
        }
        debug!(target = %target.display(), "pointer target does not exist");
    }

    let key = symbol_name_from_pointer(pointer_url).unwrap_or(request.name.as_str());
    ledger.record(key, format!(" - No matching PDBs found - {}", text.trim()));
    ProbeOutcome::NotFound
}

/// `.../<name>/<build key>/file.ptr` yields `<name>`.
fn symbol_name_from_pointer(pointer_url: &str) -> Option<&str> {
    pointer_url
        .rsplit('/')
        .nth(2)
        .filter(|segment| segment.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeTransport;

    const REMOTE: &str = "https://s/foo.pdb/ABC1/foo.pdb";

    #[test]
    fn test_transition_table() {
        use ProbeState::*;
        use StatusClass::*;

        assert_eq!(Direct.on(Found), Transition::Accept);
        assert_eq!(Direct.on(Missing), Transition::Advance(Compressed));
        assert_eq!(Direct.on(Rejected), Transition::Reject);
        assert_eq!(Compressed.on(Found), Transition::Accept);
        assert_eq!(Compressed.on(Missing), Transition::Advance(Pointer));
        assert_eq!(Compressed.on(Rejected), Transition::Reject);
        assert_eq!(Pointer.on(Found), Transition::Accept);
        assert_eq!(Pointer.on(Missing), Transition::Exhausted);
        assert_eq!(Pointer.on(Rejected), Transition::Reject);
    }

    #[test]
    fn test_probe_urls() {
        assert_eq!(ProbeState::Direct.url_for(REMOTE), REMOTE);
        assert_eq!(
            ProbeState::Compressed.url_for(REMOTE),
            "https://s/foo.pdb/ABC1/foo.pd_"
        );
        assert_eq!(
            ProbeState::Pointer.url_for(REMOTE),
            "https://s/foo.pdb/ABC1/file.ptr"
        );
    }

    #[test]
    fn test_pointer_target_parsing() {
        assert_eq!(
            pointer_target("PATH:/srv/symcache/foo.pdb\r\n"),
            Some(PathBuf::from("/srv/symcache/foo.pdb"))
        );
        assert_eq!(pointer_target("MSG: symbols are not available"), None);
        assert_eq!(pointer_target("PATH"), None);
        assert_eq!(pointer_target("PATH:"), None);
    }

    #[test]
    fn test_symbol_name_from_pointer() {
        assert_eq!(
            symbol_name_from_pointer("https://s/foo.pdb/ABC1/file.ptr"),
            Some("foo.pdb")
        );
        assert_eq!(symbol_name_from_pointer("file.ptr"), None);
    }

    #[tokio::test]
    async fn test_direct_hit_makes_one_call() {
        let transport = FakeTransport::new().respond(REMOTE, 200, b"pdb bytes");
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let outcome = retrieve(&transport, &mut request, &mut ledger).await.unwrap();

        assert_eq!(outcome, ProbeOutcome::Found(Payload::Download(b"pdb bytes".to_vec())));
        assert_eq!(transport.calls(), vec![REMOTE.to_string()]);
        assert!(!request.is_compressed);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_compressed_hit_marks_request() {
        let transport =
            FakeTransport::new().respond("https://s/foo.pdb/ABC1/foo.pd_", 200, b"MSCF");
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let outcome = retrieve(&transport, &mut request, &mut ledger).await.unwrap();

        assert_eq!(outcome, ProbeOutcome::Found(Payload::Download(b"MSCF".to_vec())));
        assert!(request.is_compressed);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_status_stops_fallback() {
        let transport = FakeTransport::new().respond(REMOTE, 503, b"");
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let outcome = retrieve(&transport, &mut request, &mut ledger).await.unwrap();

        assert!(matches!(outcome, ProbeOutcome::Rejected(ProbeStatus::Other { code: 503, .. })));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(ledger.get("foo.pdb"), Some(" - 503  Service Unavailable"));
    }

    #[tokio::test]
    async fn test_transport_fault_does_not_fall_through() {
        let transport = FakeTransport::new().fail(REMOTE, "connection reset");
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let result = retrieve(&transport, &mut request, &mut ledger).await;

        assert!(result.is_err());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pointer_without_marker_is_not_found() {
        let transport = FakeTransport::new().respond(
            "https://s/foo.pdb/ABC1/file.ptr",
            200,
            b"MSG: This file is not available",
        );
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let outcome = retrieve(&transport, &mut request, &mut ledger).await.unwrap();

        assert_eq!(outcome, ProbeOutcome::NotFound);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(
            ledger.get("foo.pdb"),
            Some(" - No matching PDBs found - MSG: This file is not available")
        );
    }

    #[tokio::test]
    async fn test_pointer_to_missing_local_file_is_not_found() {
        let transport = FakeTransport::new().respond(
            "https://s/foo.pdb/ABC1/file.ptr",
            200,
            b"PATH:/definitely/not/here/foo.pdb",
        );
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let outcome = retrieve(&transport, &mut request, &mut ledger).await.unwrap();

        assert_eq!(outcome, ProbeOutcome::NotFound);
        assert!(ledger.get("foo.pdb").unwrap().contains("PATH:/definitely/not/here"));
    }

    #[tokio::test]
    async fn test_pointer_to_existing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("foo.pdb");
        std::fs::write(&local, b"local pdb").unwrap();

        let body = format!("PATH:{}", local.display());
        let transport =
            FakeTransport::new().respond("https://s/foo.pdb/ABC1/file.ptr", 200, body.as_bytes());
        let mut request = RetrievalRequest::new(REMOTE.to_string());
        let mut ledger = FailureLedger::new();

        let outcome = retrieve(&transport, &mut request, &mut ledger).await.unwrap();

        assert_eq!(outcome, ProbeOutcome::Found(Payload::LocalFile(local)));
        assert!(ledger.is_empty());
    }
}
