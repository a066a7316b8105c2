//! # Typed Cell Views
//!
//! A [`Cell`] is a non-owning typed view over one field's bytes inside a
//! shared record buffer. Reads and writes go through an explicit
//! conversion matrix; anything outside the matrix fails with
//! [`TypeConversionError`].
//!
//! ## Conversion Matrix
//!
//! Reads (`to_*`):
//!
//! | Target | Accepted cell kinds |
//! |--------|---------------------|
//! | f64 | Double, Int32, Int8, Timestamp, Date |
//! | i32 | Int32, Int8, Date |
//! | i8 | Int8 |
//! | char | Char |
//! | timestamp | Timestamp, Date (× 86 400 000, start of day UTC) |
//! | date | Date |
//! | record id | Record |
//!
//! Assignments (`set_*`, by value type):
//!
//! | Value | Accepted cell kinds |
//! |-------|---------------------|
//! | f64 | Double; Int32 (range `[-2^31, 2^31-1]`, truncates); Int8 (range ±127) |
//! | i64 | Timestamp |
//! | i32 | Int32; Int8 (range ±127); Date; Timestamp (× 86 400 000); Double |
//! | i8 | Int8; Int32; Double; Char |
//! | char | Char |
//! | u64 | Record |
//! | &str | Char (first byte or NUL); Double/Int32/Int8 (numeric parse); String (truncate + zero-fill) |
//!
//! Every cell kind renders to a string via the field-kind formatting rules.

use eyre::{bail, Result};

use crate::datetime::MILLIS_PER_DAY;
use crate::memory::BlockPtr;
use crate::schema::{DateNum, FieldKind, RecordId, Timestamp};

#[derive(Debug)]
pub struct TypeConversionError {
    pub detail: String,
}

impl TypeConversionError {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for TypeConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for TypeConversionError {}

/// A typed view over one field's bytes. The view borrows nothing at rest;
/// each access performs a short interior borrow of the underlying block.
#[derive(Debug, Clone)]
pub struct Cell {
    ptr: BlockPtr,
    kind: FieldKind,
}

impl Cell {
    pub fn new(ptr: BlockPtr, kind: FieldKind) -> Self {
        Self { ptr, kind }
    }

    /// A free-standing cell backed by its own allocation.
    pub fn free(kind: FieldKind) -> Self {
        let block = crate::memory::MemoryBlock::with_size(kind.byte_size());
        Self {
            ptr: BlockPtr::new(block, 0),
            kind,
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn block_ptr(&self) -> &BlockPtr {
        &self.ptr
    }

    fn raw_i8(&self) -> i8 {
        self.ptr.read_array::<1>(0)[0] as i8
    }

    fn raw_i32(&self) -> i32 {
        i32::from_le_bytes(self.ptr.read_array::<4>(0))
    }

    fn raw_i64(&self) -> i64 {
        i64::from_le_bytes(self.ptr.read_array::<8>(0))
    }

    fn raw_u64(&self) -> u64 {
        u64::from_le_bytes(self.ptr.read_array::<8>(0))
    }

    fn raw_f64(&self) -> f64 {
        f64::from_le_bytes(self.ptr.read_array::<8>(0))
    }

    pub fn to_double(&self) -> Result<f64> {
        match self.kind {
            FieldKind::Double => Ok(self.raw_f64()),
            FieldKind::Int32 => Ok(self.raw_i32() as f64),
            FieldKind::Int8 => Ok(self.raw_i8() as f64),
            FieldKind::Timestamp => Ok(self.raw_i64() as f64),
            FieldKind::Date => Ok(self.raw_i32() as f64),
            _ => bail!(TypeConversionError::new("cannot convert type to double")),
        }
    }

    pub fn to_int32(&self) -> Result<i32> {
        match self.kind {
            FieldKind::Int32 => Ok(self.raw_i32()),
            FieldKind::Int8 => Ok(self.raw_i8() as i32),
            FieldKind::Date => Ok(self.raw_i32()),
            _ => bail!(TypeConversionError::new("cannot convert type to int32")),
        }
    }

    pub fn to_int8(&self) -> Result<i8> {
        match self.kind {
            FieldKind::Int8 => Ok(self.raw_i8()),
            _ => bail!(TypeConversionError::new("cannot convert type to int8")),
        }
    }

    pub fn to_char(&self) -> Result<u8> {
        match self.kind {
            FieldKind::Char => Ok(self.ptr.read_array::<1>(0)[0]),
            _ => bail!(TypeConversionError::new("cannot convert type to char")),
        }
    }

    /// Dates convert to the timestamp at 00:00 UTC of that day.
    pub fn to_timestamp(&self) -> Result<Timestamp> {
        match self.kind {
            FieldKind::Timestamp => Ok(self.raw_i64()),
            FieldKind::Date => Ok(self.raw_i32() as i64 * MILLIS_PER_DAY),
            _ => bail!(TypeConversionError::new("cannot convert type to timestamp")),
        }
    }

    pub fn to_date(&self) -> Result<DateNum> {
        match self.kind {
            FieldKind::Date => Ok(self.raw_i32()),
            _ => bail!(TypeConversionError::new("cannot convert type to date")),
        }
    }

    pub fn to_record_id(&self) -> Result<RecordId> {
        match self.kind {
            FieldKind::Record => Ok(self.raw_u64()),
            _ => bail!(TypeConversionError::new("cannot convert type to record id")),
        }
    }

    /// Renders the cell per its kind's string form.
    pub fn to_string_value(&self) -> String {
        self.ptr
            .with_bytes(0, self.kind.byte_size(), |bytes| self.kind.render(bytes))
    }

    pub fn set_f64(&self, rhs: f64) -> Result<()> {
        match self.kind {
            FieldKind::Double => self.ptr.write_from(0, &rhs.to_le_bytes()),
            FieldKind::Int32 => {
                if rhs > i32::MAX as f64 || rhs < i32::MIN as f64 {
                    bail!(TypeConversionError::new(
                        "double out of bounds for conversion to int32"
                    ));
                }
                // Fractional part dropped, no rounding.
                self.ptr.write_from(0, &(rhs as i32).to_le_bytes());
            }
            FieldKind::Int8 => {
                if rhs > 127.0 || rhs < -127.0 {
                    bail!(TypeConversionError::new(
                        "double out of bounds for conversion to int8"
                    ));
                }
                self.ptr.write_from(0, &(rhs as i8).to_le_bytes());
            }
            _ => bail!(TypeConversionError::new(
                "the cell's field type does not support assignment from double"
            )),
        }
        Ok(())
    }

    pub fn set_i64(&self, rhs: i64) -> Result<()> {
        match self.kind {
            FieldKind::Timestamp => self.ptr.write_from(0, &rhs.to_le_bytes()),
            _ => bail!(TypeConversionError::new(
                "the cell's field type does not support assignment from int64"
            )),
        }
        Ok(())
    }

    pub fn set_i32(&self, rhs: i32) -> Result<()> {
        match self.kind {
            FieldKind::Int32 => self.ptr.write_from(0, &rhs.to_le_bytes()),
            FieldKind::Int8 => {
                if rhs.abs() > 127 {
                    bail!(TypeConversionError::new(
                        "int32 out of bounds for conversion to int8"
                    ));
                }
                self.ptr.write_from(0, &(rhs as i8).to_le_bytes());
            }
            FieldKind::Date => self.ptr.write_from(0, &rhs.to_le_bytes()),
            FieldKind::Timestamp => {
                // A day number: the timestamp lands at 00:00 on that day.
                let ts = rhs as i64 * MILLIS_PER_DAY;
                self.ptr.write_from(0, &ts.to_le_bytes());
            }
            FieldKind::Double => self.ptr.write_from(0, &(rhs as f64).to_le_bytes()),
            _ => bail!(TypeConversionError::new(
                "the cell's field type does not support assignment from int32"
            )),
        }
        Ok(())
    }

    pub fn set_i8(&self, rhs: i8) -> Result<()> {
        match self.kind {
            FieldKind::Int8 => self.ptr.write_from(0, &rhs.to_le_bytes()),
            FieldKind::Int32 => self.ptr.write_from(0, &(rhs as i32).to_le_bytes()),
            FieldKind::Double => self.ptr.write_from(0, &(rhs as f64).to_le_bytes()),
            // An int8 is indistinguishable from a char in most cases; the
            // bit pattern is preserved, the signedness is not.
            FieldKind::Char => self.ptr.write_from(0, &[rhs as u8]),
            _ => bail!(TypeConversionError::new(
                "the cell's field type does not support assignment from int8"
            )),
        }
        Ok(())
    }

    pub fn set_char(&self, rhs: u8) -> Result<()> {
        match self.kind {
            FieldKind::Char => self.ptr.write_from(0, &[rhs]),
            _ => bail!(TypeConversionError::new(
                "the cell's field type does not support assignment from char"
            )),
        }
        Ok(())
    }

    pub fn set_record_id(&self, rhs: u64) -> Result<()> {
        match self.kind {
            FieldKind::Record => self.ptr.write_from(0, &rhs.to_le_bytes()),
            _ => bail!(TypeConversionError::new(
                "the cell's field type does not support assignment from record id"
            )),
        }
        Ok(())
    }

    /// Parses a string and stores it per the cell's kind.
    pub fn set_str(&self, rhs: &str) -> Result<()> {
        match self.kind {
            FieldKind::Char => {
                let byte = rhs.as_bytes().first().copied().unwrap_or(0);
                self.ptr.write_from(0, &[byte]);
            }
            FieldKind::Double => {
                let value: f64 = rhs.trim().parse().map_err(|_| {
                    TypeConversionError::new(format!("cannot parse '{}' as double", rhs))
                })?;
                self.ptr.write_from(0, &value.to_le_bytes());
            }
            FieldKind::Int8 => {
                let value: i8 = rhs.trim().parse().map_err(|_| {
                    TypeConversionError::new(format!("cannot parse '{}' as int8", rhs))
                })?;
                self.ptr.write_from(0, &value.to_le_bytes());
            }
            FieldKind::Int32 => {
                let value: i32 = rhs.trim().parse().map_err(|_| {
                    TypeConversionError::new(format!("cannot parse '{}' as int32", rhs))
                })?;
                self.ptr.write_from(0, &value.to_le_bytes());
            }
            FieldKind::String(n) => {
                let src = rhs.as_bytes();
                let take = src.len().min(n);
                let mut buf = vec![0u8; n];
                buf[..take].copy_from_slice(&src[..take]);
                self.ptr.write_from(0, &buf);
            }
            _ => bail!(TypeConversionError::new(
                "cannot convert string to this cell's field type"
            )),
        }
        Ok(())
    }
}
