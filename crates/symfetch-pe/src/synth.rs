//! Minimal synthetic PE images
//!
//! Builds the smallest images [`parse_codeview`](crate::parse_codeview)
//! accepts: one `.rdata` section holding a debug directory entry and its
//! CodeView record. Used by tests that need a binary on disk.

use uuid::Uuid;

const PE_OFFSET: usize = 0x40;
const SECTION_FILE_OFFSET: usize = 0x200;
const SECTION_RVA: u32 = 0x1000;
const DEBUG_ENTRY_LEN: usize = 28;

/// A PE32+ (x64) image whose debug directory carries an `RSDS` record.
pub fn pe_with_codeview(guid: Uuid, age: u32, pdb_path: &str) -> Vec<u8> {
    build(Flavor::Pe32Plus, Some(rsds(guid, age, pdb_path)))
}

/// A PE32 (x86) image whose debug directory carries an `RSDS` record.
pub fn pe32_with_codeview(guid: Uuid, age: u32, pdb_path: &str) -> Vec<u8> {
    build(Flavor::Pe32, Some(rsds(guid, age, pdb_path)))
}

/// A PE32+ image with an empty debug data directory.
pub fn pe_without_debug() -> Vec<u8> {
    build(Flavor::Pe32Plus, None)
}

#[derive(Clone, Copy)]
enum Flavor {
    Pe32,
    Pe32Plus,
}

impl Flavor {
    fn magic(self) -> u16 {
        match self {
            Flavor::Pe32 => 0x10b,
            Flavor::Pe32Plus => 0x20b,
        }
    }

    fn machine(self) -> u16 {
        match self {
            Flavor::Pe32 => 0x14c,
            Flavor::Pe32Plus => 0x8664,
        }
    }

    /// Offset of `NumberOfRvaAndSizes` and of the data directories.
    fn directory_offsets(self) -> (usize, usize) {
        match self {
            Flavor::Pe32 => (92, 96),
            Flavor::Pe32Plus => (108, 112),
        }
    }
}

fn rsds(guid: Uuid, age: u32, pdb_path: &str) -> Vec<u8> {
    let (d1, d2, d3, d4) = guid.as_fields();
    let mut record = Vec::with_capacity(24 + pdb_path.len() + 1);
    record.extend_from_slice(b"RSDS");
    record.extend_from_slice(&d1.to_le_bytes());
    record.extend_from_slice(&d2.to_le_bytes());
    record.extend_from_slice(&d3.to_le_bytes());
    record.extend_from_slice(d4);
    record.extend_from_slice(&age.to_le_bytes());
    record.extend_from_slice(pdb_path.as_bytes());
    record.push(0);
    record
}

fn build(flavor: Flavor, codeview: Option<Vec<u8>>) -> Vec<u8> {
    let (rva_count_offset, directories_offset) = flavor.directory_offsets();
    let optional_len = directories_offset + 16 * 8;

    let mut section = Vec::new();
    if let Some(record) = &codeview {
        let record_offset = SECTION_FILE_OFFSET + DEBUG_ENTRY_LEN;
        let record_rva = SECTION_RVA + DEBUG_ENTRY_LEN as u32;

        let mut entry = [0u8; DEBUG_ENTRY_LEN];
        put_u32(&mut entry, 12, 2);
        put_u32(&mut entry, 16, record.len() as u32);
        put_u32(&mut entry, 20, record_rva);
        put_u32(&mut entry, 24, record_offset as u32);
        section.extend_from_slice(&entry);
        section.extend_from_slice(record);
    }
    while section.len() % 0x200 != 0 || section.is_empty() {
        section.push(0);
    }

    let mut image = vec![0u8; SECTION_FILE_OFFSET];
    image[..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3c, PE_OFFSET as u32);
    image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

    let coff = PE_OFFSET + 4;
    put_u16(&mut image, coff, flavor.machine());
    put_u16(&mut image, coff + 2, 1);
    put_u16(&mut image, coff + 16, optional_len as u16);
    put_u16(&mut image, coff + 18, 0x2022);

    let optional = coff + 20;
    put_u16(&mut image, optional, flavor.magic());
    put_u32(&mut image, optional + rva_count_offset, 16);
    if codeview.is_some() {
        let debug_dir = optional + directories_offset + 6 * 8;
        put_u32(&mut image, debug_dir, SECTION_RVA);
        put_u32(&mut image, debug_dir + 4, DEBUG_ENTRY_LEN as u32);
    }

    let header = optional + optional_len;
    image[header..header + 6].copy_from_slice(b".rdata");
    put_u32(&mut image, header + 8, section.len() as u32);
    put_u32(&mut image, header + 12, SECTION_RVA);
    put_u32(&mut image, header + 16, section.len() as u32);
    put_u32(&mut image, header + 20, SECTION_FILE_OFFSET as u32);

    image.extend_from_slice(&section);
    image
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
