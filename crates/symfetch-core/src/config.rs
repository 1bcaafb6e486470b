//! Run configuration
//!
//! Defaults match the public Microsoft symbol server and a side-by-side
//! layout in the working directory. Environment variables override the
//! defaults; explicit setters override both.

use crate::error::{FetchError, Result};
use crate::layout::OutputLayout;
use crate::policy::DeletionPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Public Microsoft symbol server
pub const DEFAULT_SYMBOL_SERVER: &str = "https://msdl.microsoft.com/download/symbols";

/// Failure log, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "Log.txt";

/// Cabinet expansion tool
pub const DEFAULT_EXPAND_PROGRAM: &str = "expand";

/// Upper bound on a single expansion
pub const DEFAULT_EXPAND_TIMEOUT_SECS: u64 = 600;

/// Upper bound on one symbol server exchange, body included
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 600;

/// Binary extension scanned when none is configured
pub const DEFAULT_EXTENSION: &str = "dll";

/// Configuration for one sym-fetch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Symbol server base URL, without trailing slash
    pub server: String,
    /// Directory scanned for binaries
    pub input_dir: PathBuf,
    /// Destination root for symbol files
    pub output_dir: PathBuf,
    /// Destination layout
    pub layout: OutputLayout,
    /// What to do with binaries whose symbols are missing
    pub deletion: DeletionPolicy,
    /// Descend into subdirectories of `input_dir`
    pub recursive: bool,
    /// Binary extensions to scan, without the leading dot
    pub extensions: Vec<String>,
    /// Append-only failure log
    pub log_file: PathBuf,
    /// Program invoked as `<program> <compressed> <target>`
    pub expand_program: String,
    /// Expansion timeout in seconds
    pub expand_timeout_secs: u64,
    /// Symbol server request timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            server: DEFAULT_SYMBOL_SERVER.to_string(),
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            layout: OutputLayout::default(),
            deletion: DeletionPolicy::empty(),
            recursive: false,
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            expand_program: DEFAULT_EXPAND_PROGRAM.to_string(),
            expand_timeout_secs: DEFAULT_EXPAND_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `SYMFETCH_SERVER`, `SYMFETCH_LOG_FILE`,
    /// `SYMFETCH_EXPAND`, `SYMFETCH_EXPAND_TIMEOUT_SECS` and
    /// `SYMFETCH_HTTP_TIMEOUT_SECS`.
    ///
    /// A timeout variable that is not a whole number of seconds is an
    /// [`FetchError::InvalidConfig`].
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(server) = lookup("SYMFETCH_SERVER") {
            config = config.with_server(&server);
        }
        if let Some(log_file) = lookup("SYMFETCH_LOG_FILE") {
            config.log_file = PathBuf::from(log_file);
        }
        if let Some(program) = lookup("SYMFETCH_EXPAND") {
            config.expand_program = program;
        }
        if let Some(secs) = lookup("SYMFETCH_EXPAND_TIMEOUT_SECS") {
            config.expand_timeout_secs = parse_secs("SYMFETCH_EXPAND_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("SYMFETCH_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_secs("SYMFETCH_HTTP_TIMEOUT_SECS", &secs)?;
        }
        Ok(config)
    }

    /// Set the symbol server; one trailing `/` is dropped.
    pub fn with_server(mut self, server: &str) -> Self {
        self.server = server.strip_suffix('/').unwrap_or(server).to_string();
        self
    }

    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_deletion(mut self, policy: DeletionPolicy) -> Self {
        self.deletion = policy;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set scanned extensions; leading dots are dropped.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    pub fn with_expand_program(mut self, program: &str) -> Self {
        self.expand_program = program.to_string();
        self
    }

    pub fn with_expand_timeout_secs(mut self, secs: u64) -> Self {
        self.expand_timeout_secs = secs;
        self
    }

    pub fn expand_timeout(&self) -> Duration {
        Duration::from_secs(self.expand_timeout_secs)
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Reject configurations no retrieval can run under.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(FetchError::InvalidConfig(
                "symbol server URL is empty".to_string(),
            ));
        }
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(FetchError::InvalidConfig(
                "no binary extensions configured".to_string(),
            ));
        }
        if self.expand_program.trim().is_empty() {
            return Err(FetchError::InvalidConfig(
                "expand program is empty".to_string(),
            ));
        }
        if self.expand_timeout_secs == 0 {
            return Err(FetchError::InvalidConfig(
                "expand timeout must be at least one second".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(FetchError::InvalidConfig(
                "HTTP timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        FetchError::InvalidConfig(format!(
            "{} must be a whole number of seconds, got '{}'",
            name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.server, DEFAULT_SYMBOL_SERVER);
        assert_eq!(config.layout, OutputLayout::SideBySide);
        assert!(config.deletion.is_empty());
        assert_eq!(config.extensions, vec!["dll".to_string()]);
        assert_eq!(config.expand_timeout(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_vars_overrides_defaults() {
        let config = FetchConfig::from_vars(vars(&[
            ("SYMFETCH_SERVER", "https://symbols.example.com/"),
            ("SYMFETCH_EXPAND", "cabextract"),
            ("SYMFETCH_EXPAND_TIMEOUT_SECS", "45"),
            ("SYMFETCH_HTTP_TIMEOUT_SECS", " 90 "),
        ]))
        .unwrap();

        assert_eq!(config.server, "https://symbols.example.com");
        assert_eq!(config.expand_program, "cabextract");
        assert_eq!(config.expand_timeout_secs, 45);
        assert_eq!(config.http_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_from_vars_without_variables_is_default() {
        let config = FetchConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, FetchConfig::default());
    }

    #[test]
    fn test_from_vars_rejects_malformed_timeout() {
        let err = FetchConfig::from_vars(vars(&[("SYMFETCH_EXPAND_TIMEOUT_SECS", "ten")]))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfig(_)));
        assert!(err.to_string().contains("SYMFETCH_EXPAND_TIMEOUT_SECS"));

        let err = FetchConfig::from_vars(vars(&[("SYMFETCH_HTTP_TIMEOUT_SECS", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("'-1'"));
    }

    #[test]
    fn test_validate_rejects_zero_http_timeout() {
        let config = FetchConfig::default().with_http_timeout_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_server_trims_trailing_slash() {
        let config = FetchConfig::default().with_server("https://symbols.example.com/");
        assert_eq!(config.server, "https://symbols.example.com");

        let config = FetchConfig::default().with_server("https://symbols.example.com");
        assert_eq!(config.server, "https://symbols.example.com");
    }

    #[test]
    fn test_with_extensions_strips_dots() {
        let config = FetchConfig::default().with_extensions([".dll", "exe"]);
        assert_eq!(config.extensions, vec!["dll".to_string(), "exe".to_string()]);
    }

    #[test]
    fn test_validate_rejects_empty_server() {
        let config = FetchConfig::default().with_server("");
        assert!(matches!(config.validate(), Err(FetchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = FetchConfig::default().with_expand_timeout_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = FetchConfig::default()
            .with_layout(OutputLayout::Debugger)
            .with_deletion(DeletionPolicy::NOT_FOUND | DeletionPolicy::DRY_RUN);
        let json = serde_json::to_string(&config).unwrap();
        let back: FetchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
