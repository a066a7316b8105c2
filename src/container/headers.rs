//! # Container File Headers
//!
//! Type-safe, zerocopy-based header structs for the two container file
//! types. Each file begins with a 128-byte header carrying magic bytes,
//! a format version, and type-specific metadata.
//!
//! ## File Types
//!
//! 1. **tickstore.meta** — store identity ([`StoreMetaHeader`]).
//!    Written once when the store directory is created, validated on open.
//!    Records the header-region size so a store built with different
//!    layout constants is refused instead of misread.
//!
//! 2. **.tbl** — table files ([`TableFileHeader`]).
//!    Tracks the record stride, record count, field count and chunk size.
//!    The record count is updated on every append; everything else is
//!    immutable after create.
//!
//! All multi-byte fields are little-endian via the zerocopy `U32`/`U64`
//! wrappers, so headers can be read in place from an mmap at any
//! alignment. Struct sizes are pinned by compile-time assertions.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::FILE_HEADER_SIZE;

pub const STORE_META_MAGIC: &[u8; 16] = b"tickstore v1\x00\x00\x00\x00";
pub const TABLE_MAGIC: &[u8; 16] = b"tickstore tbl\x00\x00\x00";

pub const CONTAINER_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct StoreMetaHeader {
    magic: [u8; 16],
    version: U32,
    header_region: U32,
    reserved: [u8; 104],
}

const _: () = assert!(std::mem::size_of::<StoreMetaHeader>() == FILE_HEADER_SIZE);

impl StoreMetaHeader {
    pub fn new(header_region: u32) -> Self {
        Self {
            magic: *STORE_META_MAGIC,
            version: U32::new(CONTAINER_VERSION),
            header_region: U32::new(header_region),
            reserved: [0u8; 104],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for StoreMetaHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse StoreMetaHeader: {:?}", e))?;

        ensure!(
            &header.magic == STORE_META_MAGIC,
            "invalid magic bytes in store meta file"
        );

        ensure!(
            header.version.get() == CONTAINER_VERSION,
            "unsupported store version: {} (expected {})",
            header.version.get(),
            CONTAINER_VERSION
        );

        Ok(header)
    }

    pub fn version(&self) -> u32 {
        self.version.get()
    }

    pub fn header_region(&self) -> u32 {
        self.header_region.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TableFileHeader {
    magic: [u8; 16],
    version: U32,
    record_size: U32,
    record_count: U64,
    field_count: U32,
    chunk_records: U32,
    attr_len: U32,
    reserved: [u8; 84],
}

const _: () = assert!(std::mem::size_of::<TableFileHeader>() == FILE_HEADER_SIZE);

impl TableFileHeader {
    pub fn new(record_size: u32, field_count: u32, chunk_records: u32) -> Self {
        Self {
            magic: *TABLE_MAGIC,
            version: U32::new(CONTAINER_VERSION),
            record_size: U32::new(record_size),
            record_count: U64::new(0),
            field_count: U32::new(field_count),
            chunk_records: U32::new(chunk_records),
            attr_len: U32::new(0),
            reserved: [0u8; 84],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for TableFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse TableFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == TABLE_MAGIC,
            "invalid magic bytes in table file"
        );

        ensure!(
            header.version.get() == CONTAINER_VERSION,
            "unsupported table file version: {} (expected {})",
            header.version.get(),
            CONTAINER_VERSION
        );

        Ok(header)
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for TableFileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );

        let header = Self::mut_from_bytes(&mut bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse TableFileHeader: {:?}", e))?;

        ensure!(
            &header.magic == TABLE_MAGIC,
            "invalid magic bytes in table file"
        );

        Ok(header)
    }

    pub fn record_size(&self) -> u32 {
        self.record_size.get()
    }

    pub fn record_count(&self) -> u64 {
        self.record_count.get()
    }

    pub fn set_record_count(&mut self, count: u64) {
        self.record_count = U64::new(count);
    }

    pub fn field_count(&self) -> u32 {
        self.field_count.get()
    }

    pub fn chunk_records(&self) -> u32 {
        self.chunk_records.get()
    }

    pub fn attr_len(&self) -> u32 {
        self.attr_len.get()
    }

    pub fn set_attr_len(&mut self, len: u32) {
        self.attr_len = U32::new(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn headers_are_exactly_128_bytes() {
        assert_eq!(std::mem::size_of::<StoreMetaHeader>(), 128);
        assert_eq!(std::mem::size_of::<TableFileHeader>(), 128);
    }

    #[test]
    fn store_meta_roundtrip() {
        let header = StoreMetaHeader::new(16384);
        let parsed = StoreMetaHeader::from_bytes(header.as_bytes()).unwrap();
        assert_eq!(parsed.version(), CONTAINER_VERSION);
        assert_eq!(parsed.header_region(), 16384);
    }

    #[test]
    fn table_header_roundtrip() {
        let mut header = TableFileHeader::new(24, 4, 4096);
        header.set_record_count(100);
        header.set_attr_len(64);

        let parsed = TableFileHeader::from_bytes(header.as_bytes()).unwrap();
        assert_eq!(parsed.record_size(), 24);
        assert_eq!(parsed.record_count(), 100);
        assert_eq!(parsed.field_count(), 4);
        assert_eq!(parsed.chunk_records(), 4096);
        assert_eq!(parsed.attr_len(), 64);
    }

    #[test]
    fn headers_reject_invalid_magic() {
        let mut bytes = [0u8; 128];
        bytes[..16].copy_from_slice(b"Invalid Magic!!!");
        assert!(StoreMetaHeader::from_bytes(&bytes).is_err());
        assert!(TableFileHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn table_header_mutable_access() {
        let header = TableFileHeader::new(16, 2, 4096);
        let mut bytes = [0u8; 128];
        bytes.copy_from_slice(header.as_bytes());

        let header_mut = TableFileHeader::from_bytes_mut(&mut bytes).unwrap();
        header_mut.set_record_count(7);

        let header_ref = TableFileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header_ref.record_count(), 7);
    }
}
