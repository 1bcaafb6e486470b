//! symfetch core library
//!
//! Locates and retrieves debug symbols for binaries from a symbol server.
//!
//! ```text
//! BatchOrchestrator ─▶ Engine ─▶ identity ─▶ probe ─▶ materialize
//!                                   │          │          │
//!                             MetadataReader  SymbolTransport  Expander
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod expand;
pub mod fakes;
pub mod format;
pub mod identity;
pub mod layout;
pub mod ledger;
pub mod materialize;
pub mod metadata;
pub mod policy;
pub mod probe;
pub mod telemetry;
pub mod transport;

pub use batch::{scan_binaries, BatchOrchestrator, BatchReport, FileReport};
pub use config::{FetchConfig, DEFAULT_SYMBOL_SERVER};
pub use engine::{Engine, FetchReport, RetrievalOutcome};
pub use error::{FetchError, Result};
pub use expand::{ExpandError, Expander, ExternalExpander};
pub use format::{format_size_binary, format_size_decimal, SizeUnits};
pub use identity::{
    build_remote_path, compressed_variant, expanded_variant, pointer_variant, DebugMetadata,
    RetrievalRequest, SymbolIdentity,
};
pub use layout::OutputLayout;
pub use ledger::{FailureLedger, FailureLog};
pub use materialize::{ExpansionStatus, Materialized, Materializer};
pub use metadata::{MetadataReader, PeMetadataReader};
pub use policy::{DeletionAction, DeletionPolicy};
pub use probe::{retrieve, Payload, ProbeOutcome, ProbeState};
pub use telemetry::init_tracing;
pub use transport::{HttpTransport, ProbeResponse, ProbeStatus, SymbolTransport};
