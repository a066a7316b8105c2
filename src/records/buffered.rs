//! # Buffered Record Sets
//!
//! A bounded-memory window over a table range `[first, last]`. The window
//! holds at most [`SCAN_BUFFER_SIZE`](crate::config::SCAN_BUFFER_SIZE)
//! records; access outside the window reloads it around the requested
//! index, extending forward or backward per the configured scan
//! direction. Records handed out are *free* copies, so they stay valid
//! after the window moves.
//!
//! The window borrows its table: the borrow checker guarantees the scan
//! cannot outlive (or race the growth of) the table it reads.

use eyre::{bail, Result};

use crate::config::SCAN_BUFFER_SIZE;
use crate::memory::{BlockPtr, MemoryBlock};
use crate::records::{Record, RecordSetError};
use crate::table::Table;

#[derive(Debug)]
pub struct BufferedRecordSet<'t> {
    table: Option<&'t Table>,
    /// Absolute ordinal of the set's first record.
    first: u64,
    /// Absolute ordinal of the set's last record (inclusive).
    last: u64,
    buffer: BlockPtr,
    /// Window start, relative to `first`.
    buf_first: u64,
    /// Records currently in the window.
    n_buf_records: u64,
    /// Scan direction; forward by default.
    forward: bool,
    buffer_size: u64,
}

impl<'t> BufferedRecordSet<'t> {
    pub(crate) fn new(table: &'t Table, first: u64, last: u64) -> Self {
        Self {
            table: Some(table),
            first,
            last,
            buffer: BlockPtr::default(),
            buf_first: 0,
            n_buf_records: 0,
            forward: true,
            buffer_size: SCAN_BUFFER_SIZE,
        }
    }

    /// An uninitialized set: `size() == 0`, every access fails with
    /// `EmptyRecordSet`.
    pub fn empty() -> Self {
        Self {
            table: None,
            first: 0,
            last: 0,
            buffer: BlockPtr::default(),
            buf_first: 0,
            n_buf_records: 0,
            forward: true,
            buffer_size: SCAN_BUFFER_SIZE,
        }
    }

    pub fn size(&self) -> u64 {
        match self.table {
            Some(_) => self.last - self.first + 1,
            None => 0,
        }
    }

    pub fn first_record_id(&self) -> u64 {
        self.first
    }

    /// `false` flips the window to extend backward from the cursor, for
    /// reverse scans.
    pub fn set_direction(&mut self, forward: bool) {
        self.forward = forward;
    }

    /// Returns a copy of the `i`-th record of the set (0-based within the
    /// set, not the table), reloading the window if `i` falls outside it.
    pub fn record(&mut self, i: u64) -> Result<Record> {
        let Some(table) = self.table else {
            bail!(RecordSetError::EmptyRecordSet);
        };

        if i > self.last - self.first {
            bail!(RecordSetError::IndexOutOfBounds {
                index: i,
                len: self.size(),
            });
        }

        let in_window = self.buffer.is_allocated()
            && i >= self.buf_first
            && i < self.buf_first + self.n_buf_records;
        if !in_window {
            self.load_records(i, self.buffer_size)?;
        }

        let stride = table.schema().size_of();
        let local = (i - self.buf_first) as usize * stride;
        let bytes = self.buffer.read_vec(local, stride);

        let block = MemoryBlock::with_size(stride);
        let ptr = BlockPtr::new(block, 0);
        ptr.write_from(0, &bytes);
        Ok(Record::new(ptr, table.schema().clone()))
    }

    /// Loads a window of up to `nrecords` records positioned at set-index
    /// `i`: starting there when scanning forward, ending there when
    /// scanning in reverse. The window is trimmed at the set's edges.
    fn load_records(&mut self, i: u64, nrecords: u64) -> Result<()> {
        let table = self.table.expect("load_records on empty set");

        if self.forward {
            let abs_first = self.first + i;
            let abs_last = (abs_first + nrecords - 1).min(self.last);
            self.buffer = table.records_as_block(abs_first, abs_last)?;
            self.buf_first = i;
            self.n_buf_records = abs_last - abs_first + 1;
        } else {
            let abs_last = self.first + i;
            let n = nrecords.min(i + 1);
            let abs_first = abs_last - (n - 1);
            self.buffer = table.records_as_block(abs_first, abs_last)?;
            self.buf_first = i - (n - 1);
            self.n_buf_records = n;
        }
        Ok(())
    }

    /// Window bounds, for diagnostics: `(buf_first, n_buf_records)`.
    pub fn window(&self) -> (u64, u64) {
        (self.buf_first, self.n_buf_records)
    }
}
