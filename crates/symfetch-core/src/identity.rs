//! Symbol identity and request paths
//!
//! A symbol server files every PDB under
//! `<server>/<pdb name>/<GUID><age>/<pdb name>`. The compressed and
//! pointer variants of a request are pure string transformations of that
//! path.

use crate::metadata::MetadataReader;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Name of the redirect file a server may publish next to a symbol.
pub const POINTER_FILE: &str = "file.ptr";

/// Debug metadata embedded in a binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugMetadata {
    /// PDB path as recorded by the linker
    pub pdb_path: String,
    /// Unique build identifier
    pub build_id: Uuid,
    /// Revision (PDB age)
    pub revision: u32,
}

/// Symbol server key for one binary's symbols
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolIdentity {
    /// Symbol file name, path separators stripped
    pub base_name: String,
    /// Build identifier as uppercase hex without separators
    pub build_id: String,
    /// Revision number
    pub revision: u32,
}

impl SymbolIdentity {
    /// `None` when the metadata carries no usable base name.
    pub fn from_metadata(meta: &DebugMetadata) -> Option<Self> {
        let base_name = symfetch_pe::pdb_file_name(&meta.pdb_path);

        if base_name.is_empty() {
            return None;
        }

        Some(SymbolIdentity {
            base_name: base_name.to_string(),
            build_id: symfetch_pe::guid_hex(&meta.build_id),
            revision: meta.revision,
        })
    }

    /// Directory key: identifier immediately followed by the revision.
    pub fn build_key(&self) -> String {
        format!("{}{}", self.build_id, self.revision)
    }

    pub fn remote_path(&self, server: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            server,
            self.base_name,
            self.build_key(),
            self.base_name
        )
    }
}

/// Remote request path for `binary`, or an empty string when there is
/// nothing to fetch.
///
/// An unreadable binary is treated the same as one without debug
/// information.
pub fn build_remote_path(reader: &dyn MetadataReader, server: &str, binary: &Path) -> String {
    let meta = match reader.read(binary) {
        Ok(Some(meta)) => meta,
        Ok(None) => return String::new(),
        Err(e) => {
            debug!(binary = %binary.display(), error = %e, "unable to read debug metadata");
            return String::new();
        }
    };

    SymbolIdentity::from_metadata(&meta)
        .map(|identity| identity.remote_path(server))
        .unwrap_or_default()
}

/// `foo.pdb` becomes `foo.pd_`: the final character is replaced by `_`.
pub fn compressed_variant(path: &str) -> String {
    let mut compressed = path.to_string();
    compressed.pop();
    compressed.push('_');
    compressed
}

/// Inverse of [`compressed_variant`]: the trailing `_` is replaced by
/// `restore`.
pub fn expanded_variant(path: &str, restore: char) -> String {
    let mut expanded = path.strip_suffix('_').unwrap_or(path).to_string();
    expanded.push(restore);
    expanded
}

/// `dirname(path) + "/file.ptr"`
pub fn pointer_variant(path: &str) -> String {
    match path.rfind('/') {
        Some(slash) => format!("{}/{}", &path[..slash], POINTER_FILE),
        None => POINTER_FILE.to_string(),
    }
}

/// Working record for one retrieval attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    /// Fully qualified request path
    pub remote_path: String,
    /// Symbol file name: final segment of `remote_path`
    pub name: String,
    /// `<GUID><age>` segment of `remote_path`
    pub build_key: String,
    /// Set once a compressed variant is confirmed on the server
    pub is_compressed: bool,
}

impl RetrievalRequest {
    pub fn new(remote_path: String) -> Self {
        let mut segments = remote_path.rsplit('/');
        let name = segments.next().unwrap_or_default().to_string();
        let build_key = segments.next().unwrap_or_default().to_string();

        RetrievalRequest {
            remote_path,
            name,
            build_key,
            is_compressed: false,
        }
    }

    /// File name the fetched bytes are written under.
    pub fn download_name(&self) -> String {
        if self.is_compressed {
            compressed_variant(&self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeMetadataReader;

    const SERVER: &str = "https://msdl.microsoft.com/download/symbols";

    fn iiscore() -> DebugMetadata {
        DebugMetadata {
            pdb_path: r"d:\os\obj\amd64fre\iiscore.pdb".to_string(),
            build_id: Uuid::parse_str("6e3058da-562c-4eb1-8707-1dc08cf7b59e").unwrap(),
            revision: 1,
        }
    }

    #[test]
    fn test_identity_from_metadata() {
        let identity = SymbolIdentity::from_metadata(&iiscore()).unwrap();
        assert_eq!(identity.base_name, "iiscore.pdb");
        assert_eq!(identity.build_id, "6E3058DA562C4EB187071DC08CF7B59E");
        assert_eq!(identity.build_key(), "6E3058DA562C4EB187071DC08CF7B59E1");
    }

    #[test]
    fn test_remote_path_format() {
        let identity = SymbolIdentity::from_metadata(&iiscore()).unwrap();
        assert_eq!(
            identity.remote_path(SERVER),
            "https://msdl.microsoft.com/download/symbols/iiscore.pdb/6E3058DA562C4EB187071DC08CF7B59E1/iiscore.pdb"
        );
    }

    #[test]
    fn test_revision_is_decimal_without_separator() {
        let mut meta = iiscore();
        meta.revision = 42;
        let identity = SymbolIdentity::from_metadata(&meta).unwrap();
        assert!(identity.build_key().ends_with("B59E42"));
    }

    #[test]
    fn test_empty_base_name_yields_no_identity() {
        let mut meta = iiscore();
        meta.pdb_path = r"d:\os\obj\".to_string();
        assert!(SymbolIdentity::from_metadata(&meta).is_none());

        meta.pdb_path = String::new();
        assert!(SymbolIdentity::from_metadata(&meta).is_none());
    }

    #[test]
    fn test_build_remote_path_without_metadata_is_empty() {
        let reader = FakeMetadataReader::new();
        let path = build_remote_path(&reader, SERVER, Path::new("nodebug.dll"));
        assert!(path.is_empty());
    }

    #[test]
    fn test_build_remote_path_with_metadata() {
        let reader = FakeMetadataReader::new().with("iiscore.dll", iiscore());
        let path = build_remote_path(&reader, SERVER, Path::new("iiscore.dll"));
        assert!(path.ends_with("/iiscore.pdb/6E3058DA562C4EB187071DC08CF7B59E1/iiscore.pdb"));
    }

    #[test]
    fn test_compressed_variant_replaces_final_char() {
        assert_eq!(compressed_variant("foo.pdb"), "foo.pd_");
        assert_eq!(
            compressed_variant("https://s/foo.pdb/ABC1/foo.pdb"),
            "https://s/foo.pdb/ABC1/foo.pd_"
        );
    }

    #[test]
    fn test_compression_naming_restores_original() {
        for name in ["foo.pdb", "kernel32.dll", "ntdll.exe", "x.sys"] {
            let last = name.chars().last().unwrap();
            assert_eq!(expanded_variant(&compressed_variant(name), last), name);
        }
    }

    #[test]
    fn test_pointer_variant() {
        assert_eq!(
            pointer_variant("https://s/foo.pdb/ABC1/foo.pdb"),
            "https://s/foo.pdb/ABC1/file.ptr"
        );
        assert_eq!(pointer_variant("foo.pdb"), "file.ptr");
    }

    #[test]
    fn test_retrieval_request_segments() {
        let mut request = RetrievalRequest::new("https://s/foo.pdb/ABC1/foo.pdb".to_string());
        assert_eq!(request.name, "foo.pdb");
        assert_eq!(request.build_key, "ABC1");
        assert!(!request.is_compressed);
        assert_eq!(request.download_name(), "foo.pdb");

        request.is_compressed = true;
        assert_eq!(request.download_name(), "foo.pd_");
    }
}
