//! # Shared Record Buffers
//!
//! This module provides the reference-counted byte buffers that records
//! and record sets share, and the typed [`Cell`] views over them.
//!
//! ## Three Layers
//!
//! ```text
//! MemoryBlock          owned, reference-counted, contiguous byte block
//!      │
//! BlockPtr             (block, offset) — a cheap subrange view
//!      │
//! Cell                 (block pointer, field kind) — typed read/write
//! ```
//!
//! A record set owns one block for all of its records; each record is a
//! `BlockPtr` at a record-stride offset; each cell is a `BlockPtr` at a
//! field offset plus the field's kind. Cloning any layer is cheap and
//! never copies payload bytes.
//!
//! ## Mutation Model
//!
//! Blocks are shared single-threaded (`Rc`). Reads and writes both go
//! through short-lived interior borrows; writers are expected to hold the
//! only meaningful handle to the bytes they touch (a freshly built record,
//! a parse target). Nothing in this module hands out long-lived references
//! into a block, so borrows can never be held across container I/O.

mod cell;

pub use cell::{Cell, TypeConversionError};

use std::cell::RefCell;
use std::rc::Rc;

use eyre::{bail, Result};

/// Error for allocation failures on the arbitrary-size read paths.
#[derive(Debug)]
pub struct OutOfMemory {
    pub requested: usize,
}

impl std::fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to allocate {} bytes", self.requested)
    }
}

impl std::error::Error for OutOfMemory {}

/// An owned, reference-counted, contiguous byte block. The default value
/// is unallocated (`size() == 0`, `is_allocated() == false`).
#[derive(Debug, Clone, Default)]
pub struct MemoryBlock {
    inner: Option<Rc<RefCell<Box<[u8]>>>>,
}

impl MemoryBlock {
    /// An unallocated block.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Allocates a zeroed block of `size` bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            inner: Some(Rc::new(RefCell::new(vec![0u8; size].into_boxed_slice()))),
        }
    }

    /// Allocates a zeroed block, surfacing `OutOfMemory` instead of
    /// aborting when the allocator refuses. Used by the range-read paths,
    /// whose sizes are data-dependent.
    pub fn try_with_size(size: usize) -> Result<Self> {
        let mut bytes: Vec<u8> = Vec::new();
        if bytes.try_reserve_exact(size).is_err() {
            bail!(OutOfMemory { requested: size });
        }
        bytes.resize(size, 0);
        Ok(Self {
            inner: Some(Rc::new(RefCell::new(bytes.into_boxed_slice()))),
        })
    }

    pub fn size(&self) -> usize {
        match &self.inner {
            Some(rc) => rc.borrow().len(),
            None => 0,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.inner.is_some()
    }

    /// True when both handles refer to the same allocation.
    pub fn ptr_eq(&self, other: &MemoryBlock) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let rc = self.inner.as_ref().expect("read from unallocated block");
        f(&rc.borrow())
    }

    fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let rc = self.inner.as_ref().expect("write to unallocated block");
        f(&mut rc.borrow_mut())
    }
}

/// A `(block, offset)` pair: a cheap view into a shared block.
#[derive(Debug, Clone, Default)]
pub struct BlockPtr {
    block: MemoryBlock,
    offset: usize,
}

impl BlockPtr {
    pub fn new(block: MemoryBlock, offset: usize) -> Self {
        debug_assert!(offset <= block.size());
        Self { block, offset }
    }

    /// A view `extra` bytes further into the same block.
    pub fn offset_by(&self, extra: usize) -> Self {
        Self {
            block: self.block.clone(),
            offset: self.offset + extra,
        }
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes remaining in the block past this pointer.
    pub fn size(&self) -> usize {
        self.block.size().saturating_sub(self.offset)
    }

    pub fn is_allocated(&self) -> bool {
        self.block.is_allocated()
    }

    /// Copies `out.len()` bytes starting `local` bytes past this pointer.
    pub fn read_into(&self, local: usize, out: &mut [u8]) {
        self.block.with_bytes(|bytes| {
            let start = self.offset + local;
            out.copy_from_slice(&bytes[start..start + out.len()]);
        });
    }

    /// Reads a fixed-width little-endian scalar's bytes.
    pub fn read_array<const N: usize>(&self, local: usize) -> [u8; N] {
        let mut out = [0u8; N];
        self.read_into(local, &mut out);
        out
    }

    /// Copies `len` bytes out into a fresh vector.
    pub fn read_vec(&self, local: usize, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.read_into(local, &mut out);
        out
    }

    /// Copies `src` into the block starting `local` bytes past this pointer.
    pub fn write_from(&self, local: usize, src: &[u8]) {
        self.block.with_bytes_mut(|bytes| {
            let start = self.offset + local;
            bytes[start..start + src.len()].copy_from_slice(src);
        });
    }

    /// Runs `f` over `len` bytes of the block without copying them out.
    pub fn with_bytes<R>(&self, local: usize, len: usize, f: impl FnOnce(&[u8]) -> R) -> R {
        self.block.with_bytes(|bytes| {
            let start = self.offset + local;
            f(&bytes[start..start + len])
        })
    }

    /// Runs `f` over `len` writable bytes of the block, letting callers
    /// fill a fresh block directly from container reads.
    pub fn with_bytes_mut<R>(&self, local: usize, len: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.block.with_bytes_mut(|bytes| {
            let start = self.offset + local;
            f(&mut bytes[start..start + len])
        })
    }
}
