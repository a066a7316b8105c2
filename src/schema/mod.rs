//! # Field and Schema Definitions
//!
//! This module provides the dynamic record layout machinery: a closed set
//! of type-tagged field kinds, named fields, and a `Schema` that composes
//! fields into a fixed-width record with precomputed byte offsets.
//!
//! ## Field Kinds
//!
//! | Kind | Width | Representation | String form |
//! |------|-------|----------------|-------------|
//! | `Int8` | 1 | signed 8-bit | decimal |
//! | `Int32` | 4 | signed 32-bit | decimal |
//! | `Double` | 8 | IEEE-754 binary64 | shortest round-trip; missing = NaN |
//! | `Char` | 1 | one byte | single character |
//! | `String(n)` | n | fixed-length, zero-padded | bytes up to first NUL or `n` |
//! | `Date` | 4 | days since 1970-01-01 | `YYYY-MM-DD` |
//! | `Timestamp` | 8 | ms since 1970-01-01T00:00:00 UTC | `YYYY-MM-DDTHH:MM:SS.sss` |
//! | `Record` | 8 | unsigned 64-bit record ordinal | `0x` + hex |
//!
//! All multi-byte values are little-endian, in memory and on disk.
//!
//! ## Layout Modes
//!
//! - **Auto-packed** (`Schema::new`): offsets assigned in declaration
//!   order; with `align = true` each offset is rounded up to a multiple of
//!   [`ALIGN_WORD`](crate::config::ALIGN_WORD) before the next field is
//!   placed.
//! - **Externally specified** (`Schema::with_offsets`): the caller supplies
//!   every offset and the total record size. Used when a table is reopened
//!   from its stored attributes, which are authoritative on read.
//!
//! ## Sharing
//!
//! Schemas are shared by reference count (`SchemaRef`) across tables,
//! record sets, and records. Equality is identity (`Rc::ptr_eq`), not
//! structure: a record may only be appended to the table whose schema it
//! was built from.

use std::rc::Rc;

use eyre::{bail, ensure, Result};

use crate::config::ALIGN_WORD;
use crate::datetime;

/// Millisecond timestamp since the Unix epoch.
pub type Timestamp = i64;
/// Day count since 1970-01-01.
pub type DateNum = i32;
/// Zero-based record ordinal within a table.
pub type RecordId = u64;

/// A reference-counted, identity-compared schema handle.
pub type SchemaRef = Rc<Schema>;

#[derive(Debug)]
pub enum SchemaError {
    FieldNotFound(String),
    OverlappingOffsets { field: String, offset: usize },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::FieldNotFound(name) => {
                write!(f, "field with name '{}' does not exist", name)
            }
            SchemaError::OverlappingOffsets { field, offset } => {
                write!(f, "field '{}' at offset {} overlaps another field", field, offset)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// The closed set of field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int8,
    Int32,
    Double,
    Char,
    String(usize),
    Date,
    Timestamp,
    Record,
}

impl FieldKind {
    /// Width of the field in bytes.
    pub fn byte_size(&self) -> usize {
        match self {
            FieldKind::Int8 => 1,
            FieldKind::Int32 => 4,
            FieldKind::Double => 8,
            FieldKind::Char => 1,
            FieldKind::String(n) => *n,
            FieldKind::Date => 4,
            FieldKind::Timestamp => 8,
            FieldKind::Record => 8,
        }
    }

    /// The type token stored in the container's `FIELD_<i>_TYPE` attribute.
    pub fn type_token(&self) -> String {
        match self {
            FieldKind::Int8 => "Int8".to_string(),
            FieldKind::Int32 => "Int32".to_string(),
            FieldKind::Double => "Double".to_string(),
            FieldKind::Char => "Char".to_string(),
            FieldKind::String(n) => format!("String({})", n),
            FieldKind::Date => "Date".to_string(),
            FieldKind::Timestamp => "Timestamp".to_string(),
            FieldKind::Record => "Record".to_string(),
        }
    }

    /// Parses a type token back into a kind. Returns `None` for tokens no
    /// released version has ever written.
    pub fn from_token(token: &str) -> Option<FieldKind> {
        match token {
            "Int8" => Some(FieldKind::Int8),
            "Int32" => Some(FieldKind::Int32),
            "Double" => Some(FieldKind::Double),
            "Char" => Some(FieldKind::Char),
            "Date" => Some(FieldKind::Date),
            "Timestamp" => Some(FieldKind::Timestamp),
            "Record" => Some(FieldKind::Record),
            other => {
                let inner = other.strip_prefix("String(")?.strip_suffix(')')?;
                let n: usize = inner.parse().ok()?;
                if n == 0 {
                    return None;
                }
                Some(FieldKind::String(n))
            }
        }
    }

    /// Renders a value of this kind from its little-endian bytes.
    pub fn render(&self, bytes: &[u8]) -> String {
        debug_assert!(bytes.len() >= self.byte_size());
        match self {
            FieldKind::Int8 => (bytes[0] as i8).to_string(),
            FieldKind::Int32 => i32::from_le_bytes(bytes[..4].try_into().unwrap()).to_string(),
            FieldKind::Double => f64::from_le_bytes(bytes[..8].try_into().unwrap()).to_string(),
            FieldKind::Char => (bytes[0] as char).to_string(),
            FieldKind::String(n) => {
                let end = bytes[..*n].iter().position(|&b| b == 0).unwrap_or(*n);
                String::from_utf8_lossy(&bytes[..end]).into_owned()
            }
            FieldKind::Date => {
                datetime::format_date(i32::from_le_bytes(bytes[..4].try_into().unwrap()))
            }
            FieldKind::Timestamp => {
                datetime::format_timestamp(i64::from_le_bytes(bytes[..8].try_into().unwrap()))
            }
            FieldKind::Record => {
                format!("0x{:x}", u64::from_le_bytes(bytes[..8].try_into().unwrap()))
            }
        }
    }
}

/// A named, type-tagged field. Immutable after creation.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn byte_size(&self) -> usize {
        self.kind.byte_size()
    }

    /// Renders the field's bytes as a string, per kind.
    pub fn to_string_from(&self, bytes: &[u8]) -> String {
        self.kind.render(bytes)
    }
}

/// A composed record layout: ordered fields, per-field offsets, and the
/// total record size.
#[derive(Debug)]
pub struct Schema {
    fields: Vec<Field>,
    offsets: Vec<usize>,
    size_of: usize,
}

impl Schema {
    /// Builds an auto-packed schema. With `align`, each offset is rounded
    /// up to a multiple of the alignment word before the next field lands.
    pub fn new(fields: Vec<Field>, align: bool) -> Self {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        for field in &fields {
            offsets.push(offset);
            offset += field.byte_size();
            if align && offset % ALIGN_WORD != 0 {
                offset += ALIGN_WORD - (offset % ALIGN_WORD);
            }
        }
        Self {
            fields,
            offsets,
            size_of: offset,
        }
    }

    /// Builds a schema with caller-supplied offsets and total size, as
    /// when reopening a table from its stored layout attributes.
    pub fn with_offsets(fields: Vec<Field>, offsets: Vec<usize>, size_of: usize) -> Result<Self> {
        ensure!(
            fields.len() == offsets.len(),
            "schema has {} fields but {} offsets",
            fields.len(),
            offsets.len()
        );

        // Fields must not overlap and must fit inside the record.
        let mut spans: Vec<(usize, usize, &str)> = fields
            .iter()
            .zip(&offsets)
            .map(|(f, &o)| (o, f.byte_size(), f.name()))
            .collect();
        spans.sort_by_key(|&(o, _, _)| o);
        let mut prev_end = 0usize;
        for (offset, size, name) in spans {
            if offset < prev_end || offset + size > size_of {
                bail!(SchemaError::OverlappingOffsets {
                    field: name.to_string(),
                    offset,
                });
            }
            prev_end = offset + size;
        }

        Ok(Self {
            fields,
            offsets,
            size_of,
        })
    }

    pub fn nfields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn offset(&self, i: usize) -> usize {
        self.offsets[i]
    }

    pub fn size_of_field(&self, i: usize) -> usize {
        self.fields[i].byte_size()
    }

    /// Total record size in bytes.
    pub fn size_of(&self) -> usize {
        self.size_of
    }

    pub fn name_of_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    pub fn type_of_fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.kind().type_token()).collect()
    }

    /// Linear scan by name; first match wins.
    pub fn index_by_name(&self, name: &str) -> Result<usize> {
        match self.fields.iter().position(|f| f.name() == name) {
            Some(i) => Ok(i),
            None => bail!(SchemaError::FieldNotFound(name.to_string())),
        }
    }

    /// Byte offset of `field_index` within the `record_index`-th record of
    /// a packed record array.
    pub fn member_offset(&self, record_index: usize, field_index: usize) -> usize {
        record_index * self.size_of + self.offsets[field_index]
    }

    /// Copies `size_of_field(field_index)` bytes from `src` into the field
    /// of the `record_index`-th record in `buf`.
    pub fn set_member(&self, buf: &mut [u8], record_index: usize, field_index: usize, src: &[u8]) {
        let offset = self.member_offset(record_index, field_index);
        let size = self.size_of_field(field_index);
        buf[offset..offset + size].copy_from_slice(&src[..size]);
    }

    /// Renders `nrecords` packed records as a string, joining fields with
    /// `field_delim` and records with `record_delim`.
    pub fn structs_to_string(
        &self,
        buf: &[u8],
        nrecords: usize,
        field_delim: &str,
        record_delim: &str,
    ) -> String {
        let mut out = String::new();
        for rec in 0..nrecords {
            if rec > 0 {
                out.push_str(record_delim);
            }
            for (i, field) in self.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(field_delim);
                }
                let offset = self.member_offset(rec, i);
                out.push_str(&field.to_string_from(&buf[offset..offset + field.byte_size()]));
            }
        }
        out
    }
}
