//! symfetch-pe: CodeView records from PE images
//!
//! A linker that emits a PDB stamps the image's debug directory with a
//! CodeView `RSDS` record: the PDB GUID, the PDB age and the path the PDB
//! was written to. Those three values are the key a symbol server files the
//! PDB under.
//!
//! Only the structures needed to reach that record are parsed: the DOS
//! header, the PE signature, the COFF and optional headers, the section
//! table and the debug directory.

pub mod error;
pub mod synth;

pub use error::PeError;

use std::path::Path;
use uuid::Uuid;

/// Result type for PE parsing
pub type Result<T> = std::result::Result<T, PeError>;

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const RSDS_SIGNATURE: &[u8; 4] = b"RSDS";

const E_LFANEW_OFFSET: usize = 0x3c;
const COFF_HEADER_LEN: usize = 20;
const SECTION_HEADER_LEN: usize = 40;
const DEBUG_ENTRY_LEN: usize = 28;
const DATA_DIRECTORY_LEN: usize = 8;

const OPTIONAL_MAGIC_PE32: u16 = 0x10b;
const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x20b;

const IMAGE_DIRECTORY_ENTRY_DEBUG: usize = 6;
const IMAGE_DEBUG_TYPE_CODEVIEW: u32 = 2;

/// Fixed part of an `RSDS` record: signature, GUID, age.
const RSDS_HEADER_LEN: usize = 4 + 16 + 4;

/// The CodeView PDB 7.0 record of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeViewInfo {
    /// PDB GUID
    pub guid: Uuid,
    /// PDB age, bumped on incremental relinks
    pub age: u32,
    /// Path the PDB was written to at link time
    pub pdb_path: String,
}

/// File name component of a recorded PDB path, accepting both separator
/// styles. Link-time paths are usually Windows paths.
pub fn pdb_file_name(pdb_path: &str) -> &str {
    pdb_path
        .rsplit(|c: char| c == '\\' || c == '/')
        .next()
        .unwrap_or_default()
}

/// GUID as 32 uppercase hex digits without separators, the form symbol
/// servers index by
pub fn guid_hex(guid: &Uuid) -> String {
    guid.simple().to_string().to_ascii_uppercase()
}

/// Read the CodeView record of the PE image at `path`.
///
/// Returns `Ok(None)` for a valid image without a debug directory or without
/// an `RSDS` entry.
pub fn read_codeview(path: &Path) -> Result<Option<CodeViewInfo>> {
    let image = std::fs::read(path)?;
    parse_codeview(&image)
}

/// Parse the CodeView record out of an in-memory PE image.
pub fn parse_codeview(image: &[u8]) -> Result<Option<CodeViewInfo>> {
    let bytes = Bytes(image);

    if image.get(..2) != Some(DOS_MAGIC.as_slice()) {
        return Err(PeError::MissingDosHeader);
    }

    let pe_offset = bytes.u32_at(E_LFANEW_OFFSET, "e_lfanew")? as usize;
    if bytes.slice(pe_offset, 4, "PE signature")? != PE_SIGNATURE {
        return Err(PeError::MissingPeSignature(pe_offset));
    }

    let coff = pe_offset + 4;
    let section_count = bytes.u16_at(coff + 2, "COFF header")? as usize;
    let optional_len = bytes.u16_at(coff + 16, "COFF header")? as usize;

    let optional = coff + COFF_HEADER_LEN;
    let magic = bytes.u16_at(optional, "optional header")?;
    let (rva_count_offset, directories_offset) = match magic {
        OPTIONAL_MAGIC_PE32 => (92, 96),
        OPTIONAL_MAGIC_PE32_PLUS => (108, 112),
        other => return Err(PeError::UnsupportedOptionalHeader(other)),
    };

    let rva_count = bytes.u32_at(optional + rva_count_offset, "optional header")? as usize;
    if rva_count <= IMAGE_DIRECTORY_ENTRY_DEBUG {
        return Ok(None);
    }

    let debug_dir = optional + directories_offset + IMAGE_DIRECTORY_ENTRY_DEBUG * DATA_DIRECTORY_LEN;
    let debug_rva = bytes.u32_at(debug_dir, "debug data directory")?;
    let debug_size = bytes.u32_at(debug_dir + 4, "debug data directory")? as usize;
    if debug_rva == 0 || debug_size == 0 {
        return Ok(None);
    }

    let sections = SectionTable {
        bytes,
        offset: optional + optional_len,
        count: section_count,
    };
    let Some(debug_offset) = sections.rva_to_offset(debug_rva)? else {
        return Ok(None);
    };

    for index in 0..debug_size / DEBUG_ENTRY_LEN {
        let entry = debug_offset
            .checked_add(index * DEBUG_ENTRY_LEN)
            .ok_or(PeError::Truncated {
                what: "debug directory entry",
                offset: debug_offset,
            })?;
        if bytes.u32_at(entry + 12, "debug directory entry")? != IMAGE_DEBUG_TYPE_CODEVIEW {
            continue;
        }

        let data_len = bytes.u32_at(entry + 16, "debug directory entry")? as usize;
        let data_offset = bytes.u32_at(entry + 24, "debug directory entry")? as usize;
        if let Some(info) = parse_rsds(bytes, data_offset, data_len)? {
            return Ok(Some(info));
        }
    }

    Ok(None)
}

/// Parse an `RSDS` record; older `NB10` records yield `None`.
fn parse_rsds(bytes: Bytes<'_>, offset: usize, len: usize) -> Result<Option<CodeViewInfo>> {
    if len < RSDS_HEADER_LEN || bytes.slice(offset, 4, "CodeView signature")? != RSDS_SIGNATURE {
        return Ok(None);
    }

    let d1 = bytes.u32_at(offset + 4, "CodeView GUID")?;
    let d2 = bytes.u16_at(offset + 8, "CodeView GUID")?;
    let d3 = bytes.u16_at(offset + 10, "CodeView GUID")?;
    let mut d4 = [0u8; 8];
    d4.copy_from_slice(bytes.slice(offset + 12, 8, "CodeView GUID")?);
    let age = bytes.u32_at(offset + 20, "CodeView age")?;

    let path = bytes.slice(offset + RSDS_HEADER_LEN, len - RSDS_HEADER_LEN, "CodeView path")?;
    let path = path.split(|b| *b == 0).next().unwrap_or_default();

    Ok(Some(CodeViewInfo {
        guid: Uuid::from_fields(d1, d2, d3, &d4),
        age,
        pdb_path: String::from_utf8_lossy(path).into_owned(),
    }))
}

struct SectionTable<'a> {
    bytes: Bytes<'a>,
    offset: usize,
    count: usize,
}

impl SectionTable<'_> {
    fn rva_to_offset(&self, rva: u32) -> Result<Option<usize>> {
        for index in 0..self.count {
            let header = self.offset + index * SECTION_HEADER_LEN;
            let virtual_size = self.bytes.u32_at(header + 8, "section header")?;
            let virtual_address = self.bytes.u32_at(header + 12, "section header")?;
            let raw_size = self.bytes.u32_at(header + 16, "section header")?;
            let raw_pointer = self.bytes.u32_at(header + 20, "section header")?;

            let extent = virtual_size.max(raw_size);
            if rva >= virtual_address && rva - virtual_address < extent {
                let offset = ((rva - virtual_address) as usize)
                    .checked_add(raw_pointer as usize)
                    .ok_or(PeError::Truncated {
                        what: "section header",
                        offset: header,
                    })?;
                return Ok(Some(offset));
            }
        }
        Ok(None)
    }
}

/// Bounds-checked little-endian reads
#[derive(Clone, Copy)]
struct Bytes<'a>(&'a [u8]);

impl<'a> Bytes<'a> {
    fn slice(self, offset: usize, len: usize, what: &'static str) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.0.get(offset..end))
            .ok_or(PeError::Truncated { what, offset })
    }

    fn u16_at(self, offset: usize, what: &'static str) -> Result<u16> {
        let raw = self.slice(offset, 2, what)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32_at(self, offset: usize, what: &'static str) -> Result<u32> {
        let raw = self.slice(offset, 4, what)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}
