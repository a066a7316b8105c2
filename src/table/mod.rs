//! # Tables
//!
//! A [`Table`] is the append/read interface to one fixed-schema record
//! array persisted in a container group. It owns the container table file,
//! the reference-counted schema, and a transient append buffer.
//!
//! ## Schema Persistence
//!
//! On create, the schema is written out as string attributes
//! (`TITLE`, `FIELD_<i>_NAME`, `FIELD_<i>_TYPE`, `FIELD_<i>_OFFSET`); on
//! open, those attributes are the authoritative source the schema is
//! rebuilt from. A reopened table therefore carries a *new* schema
//! identity — records built against the old handle cannot be appended to
//! the reopened table, by design.
//!
//! ## Append Buffering
//!
//! `append_record` accumulates up to [`APPEND_BUFFER_SIZE`] records in
//! memory and writes them as one container append. The buffer is not
//! cleared when a flush fails, so a caller can retry or surface the error
//! with nothing lost. Dropping a table flushes best-effort and logs (but
//! swallows) any error; call [`Table::close`] to observe flush failures.

use eyre::{bail, ensure, Result, WrapErr};
use log::warn;

use crate::config::{APPEND_BUFFER_SIZE, TIMESTAMP_FIELD_NAME};
use crate::container::{AttrBlock, Group, TableFile};
use crate::memory::{BlockPtr, MemoryBlock};
use crate::records::{BufferedRecordSet, Record, RecordSet};
use crate::schema::{Field, FieldKind, Schema, SchemaRef};

/// A container-layer failure, tagged with the operation that hit it.
#[derive(Debug)]
pub struct TableError {
    pub op: &'static str,
}

impl TableError {
    pub fn new(op: &'static str) -> Self {
        Self { op }
    }
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "container table operation '{}' failed", self.op)
    }
}

impl std::error::Error for TableError {}

#[derive(Debug)]
pub struct Table {
    file: TableFile,
    name: String,
    title: String,
    schema: SchemaRef,
    append_buffer: MemoryBlock,
    n_append_buf: usize,
}

impl Table {
    /// Creates a new table in `group` with the given schema.
    pub fn create(group: &Group, name: &str, title: &str, schema: SchemaRef) -> Result<Self> {
        crate::container::validate_name(name)?;

        let mut attrs = AttrBlock::new();
        attrs.set("TITLE", title);
        for (i, field) in schema.fields().iter().enumerate() {
            attrs.set(format!("FIELD_{}_NAME", i), field.name());
            attrs.set(format!("FIELD_{}_TYPE", i), field.kind().type_token());
            attrs.set(format!("FIELD_{}_OFFSET", i), schema.offset(i).to_string());
        }

        let file = TableFile::create(
            group.table_path(name),
            schema.size_of(),
            schema.nfields(),
            &attrs,
        )
        .wrap_err(TableError::new("create"))?;

        Ok(Self {
            file,
            name: name.to_string(),
            title: title.to_string(),
            schema,
            append_buffer: MemoryBlock::empty(),
            n_append_buf: 0,
        })
    }

    /// Opens an existing table, rebuilding its schema from the stored
    /// attributes.
    pub fn open(group: &Group, name: &str) -> Result<Self> {
        crate::container::validate_name(name)?;
        let file = TableFile::open(group.table_path(name)).wrap_err(TableError::new("open"))?;
        let attrs = file.attrs().wrap_err(TableError::new("open"))?;

        let title = match attrs.get("TITLE") {
            Some(t) => t.to_string(),
            None => bail!("table '{}' is missing a TITLE attribute", name),
        };

        let mut fields = Vec::new();
        let mut offsets = Vec::new();
        let mut i = 0usize;
        while let Some(field_name) = attrs.get(&format!("FIELD_{}_NAME", i)) {
            let token = match attrs.get(&format!("FIELD_{}_TYPE", i)) {
                Some(t) => t,
                None => bail!("table '{}' is missing FIELD_{}_TYPE", name, i),
            };
            let kind = match FieldKind::from_token(token) {
                Some(k) => k,
                None => bail!("table '{}' field {} has unsupported type '{}'", name, i, token),
            };
            let offset: usize = match attrs.get(&format!("FIELD_{}_OFFSET", i)) {
                Some(o) => o
                    .parse()
                    .wrap_err_with(|| format!("bad FIELD_{}_OFFSET in table '{}'", i, name))?,
                None => bail!("table '{}' is missing FIELD_{}_OFFSET", name, i),
            };
            fields.push(Field::new(field_name, kind));
            offsets.push(offset);
            i += 1;
        }
        ensure!(!fields.is_empty(), "table '{}' has no fields", name);

        let schema = Schema::with_offsets(fields, offsets, file.record_size())?;

        Ok(Self {
            file,
            name: name.to_string(),
            title,
            schema: SchemaRef::new(schema),
            append_buffer: MemoryBlock::empty(),
            n_append_buf: 0,
        })
    }

    /// Silent existence probe.
    pub fn exists(group: &Group, name: &str) -> bool {
        TableFile::probe(group.table_path(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Current record count in the container (buffered appends are not
    /// visible until flushed).
    pub fn size(&self) -> u64 {
        self.file.record_count()
    }

    /// Number of records waiting in the append buffer.
    pub fn append_buffer_len(&self) -> usize {
        self.n_append_buf
    }

    /// Appends `n` packed records straight to the container.
    pub fn append_records(&mut self, n: usize, bytes: &[u8]) -> Result<()> {
        self.file
            .append_records(n, bytes)
            .wrap_err(TableError::new("append_records"))
    }

    /// Buffered single-record append. The record's schema must be *this*
    /// table's schema handle, not a structural twin.
    pub fn append_record(&mut self, record: &Record) -> Result<()> {
        ensure!(
            std::rc::Rc::ptr_eq(record.schema(), &self.schema),
            "attempted to append record with a different schema"
        );

        if !self.append_buffer.is_allocated() {
            self.append_buffer =
                MemoryBlock::with_size(self.schema.size_of() * APPEND_BUFFER_SIZE);
            self.n_append_buf = 0;
        }

        let stride = self.schema.size_of();
        let bytes = record.bytes();
        BlockPtr::new(self.append_buffer.clone(), self.n_append_buf * stride)
            .write_from(0, &bytes);
        self.n_append_buf += 1;

        if self.n_append_buf == APPEND_BUFFER_SIZE {
            self.flush_append_buffer()?;
        }
        Ok(())
    }

    /// Writes out any buffered records. A no-op on an empty buffer; the
    /// buffer is kept intact when the container append fails.
    pub fn flush_append_buffer(&mut self) -> Result<()> {
        if self.append_buffer.is_allocated() && self.n_append_buf > 0 {
            let stride = self.schema.size_of();
            let bytes =
                BlockPtr::new(self.append_buffer.clone(), 0).read_vec(0, self.n_append_buf * stride);
            self.file
                .append_records(self.n_append_buf, &bytes)
                .wrap_err(TableError::new("flush_append_buffer"))?;
            self.n_append_buf = 0;
        }
        Ok(())
    }

    /// Reads records `first..=last` (inclusive) into a fresh shared block.
    pub fn records_as_block(&self, first: u64, last: u64) -> Result<BlockPtr> {
        ensure!(
            first < self.size() && last < self.size(),
            "records [{}, {}] requested outside the bounds of the table (size={})",
            first,
            last,
            self.size()
        );
        ensure!(
            last >= first,
            "the last record requested ({}) is before the first ({})",
            last,
            first
        );

        let len = (last - first + 1) as usize * self.schema.size_of();
        let block = MemoryBlock::try_with_size(len)?;
        let ptr = BlockPtr::new(block, 0);
        ptr.with_bytes_mut(0, len, |buf| self.file.read_records(first, last, buf))
            .wrap_err(TableError::new("read_records"))?;
        Ok(ptr)
    }

    /// Reads records `first..=last` as an in-memory record set.
    pub fn record_set(&self, first: u64, last: u64) -> Result<RecordSet> {
        let ptr = self.records_as_block(first, last)?;
        Ok(RecordSet::new(ptr, last - first + 1, self.schema.clone()))
    }

    /// A lazy bounded-memory window over records `first..=last`.
    pub fn buffered_record_set(&self, first: u64, last: u64) -> BufferedRecordSet<'_> {
        BufferedRecordSet::new(self, first, last)
    }

    /// The last record of the table, or `None` when it is empty.
    pub fn last_record(&self) -> Result<Option<Record>> {
        let n = self.size();
        if n == 0 {
            return Ok(None);
        }
        let ptr = self.records_as_block(n - 1, n - 1)?;
        Ok(Some(Record::new(ptr, self.schema.clone())))
    }

    /// Syncs the container file to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync().wrap_err(TableError::new("sync"))
    }

    /// Flushes buffered appends and syncs the container file, surfacing
    /// any error. Dropping the table afterwards is a no-op.
    pub fn close(mut self) -> Result<()> {
        self.flush_append_buffer()?;
        self.file.sync().wrap_err(TableError::new("sync"))
    }

    /// The timestamp field index every series data table starts with.
    pub fn timestamp_field_index(&self) -> Result<usize> {
        self.schema.index_by_name(TIMESTAMP_FIELD_NAME)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if let Err(e) = self.flush_append_buffer() {
            warn!("swallowed append-buffer flush failure on drop: {:#}", e);
        }
    }
}
