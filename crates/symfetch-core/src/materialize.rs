//! Writing retrieved artifacts to disk.

use crate::error::{FetchError, Result};
use crate::expand::Expander;
use crate::identity::{expanded_variant, RetrievalRequest};
use crate::probe::Payload;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Whether the post-download expansion ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum ExpansionStatus {
    /// The artifact was not compressed
    NotNeeded,
    Expanded,
    /// Expansion failed; the compressed file is left in place
    Failed(String),
}

/// An artifact written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Materialized {
    /// Final path of the symbol file (the compressed file if expansion failed)
    pub path: PathBuf,
    /// Bytes fetched or copied
    pub bytes: u64,
    /// SHA-256 of the fetched or copied bytes
    pub sha256: String,
    pub expansion: ExpansionStatus,
}

/// Writes payloads into a destination directory
#[derive(Clone)]
pub struct Materializer {
    expander: Arc<dyn Expander>,
}

impl Materializer {
    pub fn new(expander: Arc<dyn Expander>) -> Self {
        Materializer { expander }
    }

    /// Write `payload` for `request` into `destination_dir`.
    ///
    /// Expansion failures are reported through [`ExpansionStatus::Failed`],
    /// not as an error: the fetched bytes are already on disk.
    pub async fn materialize(
        &self,
        payload: Payload,
        request: &RetrievalRequest,
        destination_dir: &Path,
    ) -> Result<Materialized> {
        fs::create_dir_all(destination_dir)?;

        match payload {
            Payload::LocalFile(source) => {
                copy_pointer_target(&source, &destination_dir.join(&request.name))
            }
            Payload::Download(bytes) => self.write_download(&bytes, request, destination_dir).await,
        }
    }

    async fn write_download(
        &self,
        bytes: &[u8],
        request: &RetrievalRequest,
        destination_dir: &Path,
    ) -> Result<Materialized> {
        let path = destination_dir.join(request.download_name());
        write_atomic(destination_dir, &path, bytes)?;

        let sha256 = hex::encode(Sha256::digest(bytes));
        debug!(path = %path.display(), bytes = bytes.len(), "wrote symbol file");

        if !request.is_compressed {
            return Ok(Materialized {
                path,
                bytes: bytes.len() as u64,
                sha256,
                expansion: ExpansionStatus::NotNeeded,
            });
        }

        let restore = request.name.chars().last().unwrap_or('b');
        let target = destination_dir.join(expanded_variant(&request.download_name(), restore));

        let (path, expansion) = match self.expander.expand(&path, &target).await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove compressed file");
                }
                info!(path = %target.display(), "expanded compressed symbol file");
                (target, ExpansionStatus::Expanded)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "expansion failed, keeping compressed file");
                (path, ExpansionStatus::Failed(e.to_string()))
            }
        };

        Ok(Materialized {
            path,
            bytes: bytes.len() as u64,
            sha256,
            expansion,
        })
    }
}

/// Write to a temp file in `dir`, then rename over `path`.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn copy_pointer_target(source: &Path, destination: &Path) -> Result<Materialized> {
    if destination.exists() {
        return Err(FetchError::ArtifactExists(destination.to_path_buf()));
    }

    let bytes = fs::copy(source, destination)?;

    let mut hasher = Sha256::new();
    let mut file = fs::File::open(destination)?;
    std::io::copy(&mut file, &mut hasher)?;

    debug!(source = %source.display(), destination = %destination.display(), "copied pointer target");

    Ok(Materialized {
        path: destination.to_path_buf(),
        bytes,
        sha256: hex::encode(hasher.finalize()),
        expansion: ExpansionStatus::NotNeeded,
    })
}
