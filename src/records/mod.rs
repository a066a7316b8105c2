//! # Records and Record Sets
//!
//! A [`Record`] is one fixed-schema row; a [`RecordSet`] is an in-memory
//! snapshot of consecutive rows sharing one buffer; a
//! [`BufferedRecordSet`] is a bounded-memory window over a table that
//! reloads itself as the read cursor moves.
//!
//! ## Linked vs Free Records
//!
//! Records come in two flavors. *Linked* records point into a record set's
//! shared buffer — cheap, and alive as long as any handle to the buffer
//! is. *Free* records own their (reference-counted) buffer outright; the
//! buffered scan hands these out so a record survives the window moving
//! on.
//!
//! Either way a record is `(block pointer, schema)`; its cells are typed
//! views at the schema's field offsets.

mod buffered;

pub use buffered::BufferedRecordSet;

use eyre::{bail, ensure, Result};

use crate::memory::{BlockPtr, Cell, MemoryBlock};
use crate::schema::SchemaRef;

#[derive(Debug)]
pub enum RecordSetError {
    IndexOutOfBounds { index: u64, len: u64 },
    EmptyRecordSet,
}

impl std::fmt::Display for RecordSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordSetError::IndexOutOfBounds { index, len } => {
                write!(f, "record index {} out of bounds (len={})", index, len)
            }
            RecordSetError::EmptyRecordSet => write!(f, "empty record set"),
        }
    }
}

impl std::error::Error for RecordSetError {}

/// One fixed-schema record over a shared buffer.
#[derive(Debug, Clone)]
pub struct Record {
    ptr: BlockPtr,
    schema: SchemaRef,
}

impl Record {
    /// A record view into an existing buffer.
    pub fn new(ptr: BlockPtr, schema: SchemaRef) -> Self {
        Self { ptr, schema }
    }

    /// A free record backed by its own zeroed allocation.
    pub fn free(schema: SchemaRef) -> Self {
        let block = MemoryBlock::with_size(schema.size_of());
        Self {
            ptr: BlockPtr::new(block, 0),
            schema,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn block_ptr(&self) -> &BlockPtr {
        &self.ptr
    }

    /// A typed cell over field `i`.
    pub fn cell(&self, i: usize) -> Cell {
        let offset = self.schema.offset(i);
        Cell::new(self.ptr.offset_by(offset), self.schema.field(i).kind())
    }

    /// The record's bytes, copied out.
    pub fn bytes(&self) -> Vec<u8> {
        self.ptr.read_vec(0, self.schema.size_of())
    }

    /// Zeroes the record's payload.
    pub fn zero(&self) {
        self.ptr.write_from(0, &vec![0u8; self.schema.size_of()]);
    }

    /// Copies another record's payload into this one. The two records
    /// must share the same schema identity.
    pub fn copy_values_from(&self, other: &Record) -> Result<()> {
        ensure!(
            std::rc::Rc::ptr_eq(&self.schema, &other.schema),
            "unable to copy values because record schemas don't match"
        );
        let bytes = other.ptr.read_vec(0, self.schema.size_of());
        self.ptr.write_from(0, &bytes);
        Ok(())
    }

    /// Renders the record through its schema's per-field string forms.
    pub fn render(&self, field_delim: &str) -> String {
        let bytes = self.bytes();
        self.schema.structs_to_string(&bytes, 1, field_delim, "")
    }
}

/// A fixed-size, in-memory snapshot of consecutive records.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    ptr: BlockPtr,
    nrecords: u64,
    schema: Option<SchemaRef>,
}

impl RecordSet {
    /// Wraps an existing buffer of `nrecords` packed records.
    pub fn new(ptr: BlockPtr, nrecords: u64, schema: SchemaRef) -> Self {
        Self {
            ptr,
            nrecords,
            schema: Some(schema),
        }
    }

    /// Allocates a zeroed set of `nrecords` records.
    pub fn with_capacity(nrecords: u64, schema: SchemaRef) -> Self {
        let block = MemoryBlock::with_size(schema.size_of() * nrecords as usize);
        Self {
            ptr: BlockPtr::new(block, 0),
            nrecords,
            schema: Some(schema),
        }
    }

    /// The empty set: no records, no schema.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn size(&self) -> u64 {
        self.nrecords
    }

    pub fn is_empty(&self) -> bool {
        self.nrecords == 0
    }

    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    pub fn block_ptr(&self) -> &BlockPtr {
        &self.ptr
    }

    /// A linked record pointing at row `i` of the shared buffer.
    pub fn record(&self, i: u64) -> Result<Record> {
        let Some(schema) = &self.schema else {
            bail!(RecordSetError::EmptyRecordSet);
        };
        if i >= self.nrecords {
            bail!(RecordSetError::IndexOutOfBounds {
                index: i,
                len: self.nrecords,
            });
        }
        let offset = schema.size_of() * i as usize;
        Ok(Record::new(self.ptr.offset_by(offset), schema.clone()))
    }
}
