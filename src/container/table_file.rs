//! # Table Files
//!
//! A table file is one fixed-stride record array, memory-mapped as a
//! whole. The file has exactly two regions:
//!
//! ```text
//! +--------------------------------------+  offset 0
//! | fixed header (128 bytes)             |
//! | attribute block (up to 16 256 bytes) |
//! +--------------------------------------+  offset HEADER_REGION_SIZE
//! | record 0 | record 1 | record 2 | ... |  packed at the record stride
//! +--------------------------------------+
//! ```
//!
//! Every offset in the record region is a pure function of a record
//! ordinal and the stride, so reads and appends address records, never
//! raw pages. Records may span any internal boundary; the map is one
//! contiguous range.
//!
//! ## Growth
//!
//! The record region is sized in whole chunks of
//! [`TABLE_CHUNK_RECORDS`] records. An append that does not fit extends
//! the file to the next chunk multiple and remaps it; the header's
//! record count, not the file length, says how many records exist.
//! Remapping requires `&mut self`, so the borrow checker guarantees no
//! record slice is live across a growth.
//!
//! ## Probes
//!
//! `probe` answers "is there a valid table here" by reading just the
//! fixed header through ordinary file I/O, without mapping anything and
//! without surfacing errors.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;
use zerocopy::IntoBytes;

use crate::config::{ATTR_REGION_SIZE, FILE_HEADER_SIZE, HEADER_REGION_SIZE, TABLE_CHUNK_RECORDS};
use crate::container::attrs::AttrBlock;
use crate::container::headers::TableFileHeader;

#[derive(Debug)]
pub struct TableFile {
    file: File,
    map: MmapMut,
    path: PathBuf,
    record_size: usize,
    record_count: u64,
    /// Records the current record region has room for.
    capacity: u64,
}

impl TableFile {
    /// Creates a new table file with the given stride and attributes.
    /// The file starts as a bare header region; the first append
    /// allocates the first record chunk.
    pub fn create<P: AsRef<Path>>(
        path: P,
        record_size: usize,
        field_count: usize,
        attrs: &AttrBlock,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure!(record_size > 0, "record size must be nonzero");

        let encoded = attrs.encode()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create table file '{}'", path.display()))?;

        file.set_len(HEADER_REGION_SIZE as u64)
            .wrap_err_with(|| format!("failed to size header region of '{}'", path.display()))?;

        // SAFETY: the file was created just now with create_new, so this
        // process holds the only handle; the store never shares its files
        // across processes, and all slices taken below stay inside the
        // mapped length.
        let mut map = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to map table file '{}'", path.display()))?
        };

        let mut header = TableFileHeader::new(
            record_size as u32,
            field_count as u32,
            TABLE_CHUNK_RECORDS as u32,
        );
        header.set_attr_len(encoded.len() as u32);
        map[..FILE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        map[FILE_HEADER_SIZE..FILE_HEADER_SIZE + encoded.len()].copy_from_slice(&encoded);
        map.flush()
            .wrap_err_with(|| format!("failed to flush new table file '{}'", path.display()))?;

        Ok(Self {
            file,
            map,
            path,
            record_size,
            record_count: 0,
            capacity: 0,
        })
    }

    /// Opens an existing table file, validating its header and deriving
    /// the record capacity from the file length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open table file '{}'", path.display()))?;

        let file_len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat table file '{}'", path.display()))?
            .len();
        ensure!(
            file_len >= HEADER_REGION_SIZE as u64,
            "table file '{}' is shorter than its header region ({} < {})",
            path.display(),
            file_len,
            HEADER_REGION_SIZE
        );

        // SAFETY: the store owns its directory; these files are not
        // shared with other processes, and every access goes through the
        // record-span arithmetic below, which is checked against the
        // header's record count and the mapped length.
        let map = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to map table file '{}'", path.display()))?
        };

        let (record_size, record_count) = {
            let header = TableFileHeader::from_bytes(&map[..FILE_HEADER_SIZE])?;
            ensure!(
                header.record_size() > 0,
                "table file '{}' has a zero record size",
                path.display()
            );
            (header.record_size() as usize, header.record_count())
        };

        let capacity = (file_len - HEADER_REGION_SIZE as u64) / record_size as u64;
        ensure!(
            record_count <= capacity,
            "table file '{}' claims {} records but has room for only {}",
            path.display(),
            record_count,
            capacity
        );

        Ok(Self {
            file,
            map,
            path,
            record_size,
            record_count,
            capacity,
        })
    }

    /// Silent existence probe: reads only the fixed header, maps nothing,
    /// and never surfaces an error.
    pub fn probe<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        if !path.is_file() {
            return false;
        }
        let Ok(mut file) = File::open(path) else {
            return false;
        };
        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        if file.read_exact(&mut header_bytes).is_err() {
            return false;
        }
        TableFileHeader::from_bytes(&header_bytes).is_ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn attrs(&self) -> Result<AttrBlock> {
        let attr_len = TableFileHeader::from_bytes(&self.map[..FILE_HEADER_SIZE])?.attr_len();
        ensure!(
            attr_len as usize <= ATTR_REGION_SIZE,
            "attribute block of {} bytes overruns the header region",
            attr_len
        );
        AttrBlock::decode(&self.map[FILE_HEADER_SIZE..FILE_HEADER_SIZE + attr_len as usize])
    }

    /// Replaces one attribute, rewriting the attribute block in place.
    pub fn set_attr(&mut self, key: &str, value: &str) -> Result<()> {
        let mut attrs = self.attrs()?;
        attrs.set(key, value);
        let encoded = attrs.encode()?;
        self.map[FILE_HEADER_SIZE..FILE_HEADER_SIZE + encoded.len()].copy_from_slice(&encoded);
        TableFileHeader::from_bytes_mut(&mut self.map[..FILE_HEADER_SIZE])?
            .set_attr_len(encoded.len() as u32);
        Ok(())
    }

    /// Byte span of records `first..=last` within the map, after bounds
    /// checks against the record count.
    fn record_span(&self, first: u64, last: u64) -> Result<(usize, usize)> {
        ensure!(
            first < self.record_count && last < self.record_count,
            "records [{}, {}] requested outside the bounds of the table (size={})",
            first,
            last,
            self.record_count
        );
        ensure!(
            last >= first,
            "the last record requested ({}) is before the first ({})",
            last,
            first
        );
        let start = HEADER_REGION_SIZE as u64 + first * self.record_size as u64;
        let len = (last - first + 1) * self.record_size as u64;
        Ok((start as usize, len as usize))
    }

    /// Grows the record region to hold at least `records` records,
    /// rounded up to whole chunks, and remaps the file.
    fn ensure_capacity(&mut self, records: u64) -> Result<()> {
        if records <= self.capacity {
            return Ok(());
        }

        let chunks = records.div_ceil(TABLE_CHUNK_RECORDS as u64);
        let new_capacity = chunks * TABLE_CHUNK_RECORDS as u64;
        let new_len = HEADER_REGION_SIZE as u64 + new_capacity * self.record_size as u64;

        self.map
            .flush()
            .wrap_err("failed to flush table file before growth")?;
        self.file
            .set_len(new_len)
            .wrap_err_with(|| format!("failed to extend '{}' to {} bytes", self.path.display(), new_len))?;

        // SAFETY: growth holds &mut self, so no slice of the old map can
        // be live; the old map was flushed and is dropped by this
        // assignment after the file reached its new length.
        self.map = unsafe {
            MmapMut::map_mut(&self.file)
                .wrap_err_with(|| format!("failed to remap '{}' after growth", self.path.display()))?
        };

        self.capacity = new_capacity;
        Ok(())
    }

    /// Appends `n` records from `bytes` (exactly `n * record_size` bytes).
    pub fn append_records(&mut self, n: usize, bytes: &[u8]) -> Result<()> {
        ensure!(
            bytes.len() == n * self.record_size,
            "append of {} records expects {} bytes, got {}",
            n,
            n * self.record_size,
            bytes.len()
        );
        if n == 0 {
            return Ok(());
        }

        let new_count = self.record_count + n as u64;
        self.ensure_capacity(new_count)?;

        let start = HEADER_REGION_SIZE as u64 + self.record_count * self.record_size as u64;
        self.map[start as usize..start as usize + bytes.len()].copy_from_slice(bytes);

        TableFileHeader::from_bytes_mut(&mut self.map[..FILE_HEADER_SIZE])?
            .set_record_count(new_count);
        self.record_count = new_count;
        Ok(())
    }

    /// Reads records `first..=last` into `out` (sized by the caller).
    /// Chunk-sized and larger reads get kernel readahead, so scan windows
    /// fault in ahead of the copy.
    pub fn read_records(&self, first: u64, last: u64, out: &mut [u8]) -> Result<()> {
        let (start, len) = self.record_span(first, last)?;
        ensure!(
            out.len() == len,
            "read of {} records expects {} bytes, got {}",
            last - first + 1,
            len,
            out.len()
        );

        if last - first + 1 >= TABLE_CHUNK_RECORDS as u64 {
            self.advise_willneed(start, len);
        }
        out.copy_from_slice(&self.map[start..start + len]);
        Ok(())
    }

    #[cfg(unix)]
    fn advise_willneed(&self, start: usize, len: usize) {
        // SAFETY: advisory only, and the span came out of record_span's
        // bounds checks against the mapped length.
        unsafe {
            libc::madvise(
                self.map.as_ptr().add(start) as *mut libc::c_void,
                len,
                libc::MADV_WILLNEED,
            );
        }
    }

    #[cfg(not(unix))]
    fn advise_willneed(&self, _start: usize, _len: usize) {}

    pub fn sync(&self) -> Result<()> {
        self.map.flush().wrap_err("failed to sync table file to disk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn attrs() -> AttrBlock {
        let mut a = AttrBlock::new();
        a.set("TITLE", "test table");
        a
    }

    #[test]
    fn append_and_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        let mut table = TableFile::create(&path, 8, 1, &attrs()).unwrap();

        let records: Vec<u8> = (0..4u64).flat_map(|i| i.to_le_bytes()).collect();
        table.append_records(4, &records).unwrap();
        assert_eq!(table.record_count(), 4);

        let mut out = vec![0u8; 16];
        table.read_records(1, 2, &mut out).unwrap();
        assert_eq!(&out[..8], &1u64.to_le_bytes());
        assert_eq!(&out[8..], &2u64.to_le_bytes());
    }

    #[test]
    fn create_refuses_to_clobber() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        TableFile::create(&path, 8, 1, &attrs()).unwrap();
        assert!(TableFile::create(&path, 8, 1, &attrs()).is_err());
    }

    #[test]
    fn record_count_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        {
            let mut table = TableFile::create(&path, 8, 1, &attrs()).unwrap();
            table.append_records(3, &[0u8; 24]).unwrap();
            table.sync().unwrap();
        }
        let table = TableFile::open(&path).unwrap();
        assert_eq!(table.record_count(), 3);
        assert_eq!(table.record_size(), 8);
        assert_eq!(table.attrs().unwrap().get("TITLE"), Some("test table"));
    }

    #[test]
    fn capacity_grows_in_whole_record_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        let mut table = TableFile::create(&path, 16, 1, &attrs()).unwrap();

        table.append_records(1, &[0u8; 16]).unwrap();
        assert_eq!(table.capacity, TABLE_CHUNK_RECORDS as u64);
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(
            len,
            HEADER_REGION_SIZE as u64 + TABLE_CHUNK_RECORDS as u64 * 16
        );

        // One past the chunk allocates the next whole chunk.
        let n = TABLE_CHUNK_RECORDS;
        let records: Vec<u8> = (0..n as u64).flat_map(|i| {
            let mut rec = [0u8; 16];
            rec[..8].copy_from_slice(&i.to_le_bytes());
            rec
        }).collect();
        table.append_records(n, &records).unwrap();
        assert_eq!(table.capacity, 2 * TABLE_CHUNK_RECORDS as u64);

        let mut out = vec![0u8; 16];
        table.read_records(n as u64, n as u64, &mut out).unwrap();
        assert_eq!(&out[..8], &(n as u64 - 1).to_le_bytes());
    }

    #[test]
    fn read_bounds_are_enforced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        let mut table = TableFile::create(&path, 8, 1, &attrs()).unwrap();
        table.append_records(2, &[0u8; 16]).unwrap();

        let mut out = vec![0u8; 8];
        assert!(table.read_records(2, 2, &mut out).is_err());
        let mut empty: Vec<u8> = Vec::new();
        assert!(table.read_records(1, 0, &mut empty).is_err());
    }

    #[test]
    fn open_rejects_truncated_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        std::fs::write(&path, [0u8; 64]).unwrap();
        assert!(TableFile::open(&path).is_err());
    }

    #[test]
    fn probe_is_silent_and_accurate() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.tbl");
        TableFile::create(&good, 8, 1, &attrs()).unwrap();
        assert!(TableFile::probe(&good));

        assert!(!TableFile::probe(dir.path().join("missing.tbl")));

        let junk = dir.path().join("junk.tbl");
        std::fs::write(&junk, b"not a table").unwrap();
        assert!(!TableFile::probe(&junk));
    }

    #[test]
    fn set_attr_rewrites_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tbl");
        let mut table = TableFile::create(&path, 8, 1, &attrs()).unwrap();
        table.set_attr("TITLE", "renamed").unwrap();
        assert_eq!(table.attrs().unwrap().get("TITLE"), Some("renamed"));
    }
}
