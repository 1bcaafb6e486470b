//! Cabinet expansion of compressed symbol files.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors from the expansion step
#[derive(Error, Debug)]
pub enum ExpandError {
    /// The expansion program could not be started
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The expansion program exited unsuccessfully
    #[error("{program} exited with code {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The expansion program did not finish in time
    #[error("{program} timed out after {timeout_secs} seconds")]
    TimedOut { program: String, timeout_secs: u64 },
}

/// Expands a compressed symbol file into its uncompressed form.
#[async_trait]
pub trait Expander: Send + Sync {
    async fn expand(&self, compressed: &Path, target: &Path) -> Result<(), ExpandError>;
}

/// Runs `<program> <compressed> <target>` with a bounded wait.
///
/// On timeout the child is killed.
#[derive(Debug, Clone)]
pub struct ExternalExpander {
    program: String,
    timeout: Duration,
}

impl ExternalExpander {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        ExternalExpander {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Expander for ExternalExpander {
    async fn expand(&self, compressed: &Path, target: &Path) -> Result<(), ExpandError> {
        debug!(
            program = %self.program,
            compressed = %compressed.display(),
            target = %target.display(),
            "expanding compressed symbol file"
        );

        let child = Command::new(&self.program)
            .arg(compressed)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExpandError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExpandError::TimedOut {
                program: self.program.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|source| ExpandError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExpandError::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
