//! Debug metadata readers

use crate::error::Result;
use crate::identity::DebugMetadata;
use std::path::Path;

/// Reads the debug identity a binary declares.
pub trait MetadataReader: Send + Sync {
    /// `Ok(None)` when the binary carries no debug information.
    fn read(&self, binary: &Path) -> Result<Option<DebugMetadata>>;
}

/// Reads the CodeView record of PE images.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeMetadataReader;

impl MetadataReader for PeMetadataReader {
    fn read(&self, binary: &Path) -> Result<Option<DebugMetadata>> {
        let info = symfetch_pe::read_codeview(binary)?;
        Ok(info.map(|cv| DebugMetadata {
            pdb_path: cv.pdb_path,
            build_id: cv.guid,
            revision: cv.age,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use uuid::Uuid;

    #[test]
    fn test_pe_reader_reads_codeview() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("foo.dll");
        let guid = Uuid::parse_str("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9").unwrap();
        std::fs::write(&binary, symfetch_pe::synth::pe_with_codeview(guid, 4, r"c:\b\foo.pdb"))
            .unwrap();

        let meta = PeMetadataReader.read(&binary).unwrap().unwrap();
        assert_eq!(meta.build_id, guid);
        assert_eq!(meta.revision, 4);
        assert_eq!(meta.pdb_path, r"c:\b\foo.pdb");
    }

    #[test]
    fn test_pe_reader_without_debug_directory() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("plain.dll");
        std::fs::write(&binary, symfetch_pe::synth::pe_without_debug()).unwrap();

        assert!(PeMetadataReader.read(&binary).unwrap().is_none());
    }

    #[test]
    fn test_pe_reader_rejects_non_pe() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("notes.dll");
        std::fs::write(&binary, b"not a binary").unwrap();

        let err = PeMetadataReader.read(&binary).unwrap_err();
        assert!(matches!(err, FetchError::Metadata(_)));
    }
}
