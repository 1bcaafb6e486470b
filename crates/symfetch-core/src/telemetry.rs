//! Log setup for the sym-fetch binary.
//!
//! stdout carries the per-binary "Fetching ... Success" lines, so every log
//! line goes to stderr. The HTTP stack is capped at `warn` unless the filter
//! names it explicitly; connection pool chatter drowns the probe diagnostics
//! otherwise.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "SYMFETCH_LOG";

const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// Install the global subscriber. Only the first call in a process wins.
///
/// `json` switches stderr to newline-delimited JSON for log collectors.
/// `level` applies when neither `SYMFETCH_LOG` nor `RUST_LOG` holds a
/// usable filter.
pub fn init_tracing(json: bool, level: Level) {
    let filter = build_filter(level, |name| std::env::var(name).ok());

    let text = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let structured = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json();

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then_some(text))
        .with(json.then_some(structured))
        .try_init()
        .ok();
}

fn build_filter(level: Level, lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|name| lookup(name))
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(format!("{},{}", level.as_str(), QUIET_DEPENDENCIES)))
}
