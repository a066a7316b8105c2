//! # Tickstore Configuration Constants
//!
//! This module centralizes all configuration constants, grouping
//! interdependent values together and documenting their relationships.
//! Constants that depend on each other are co-located to prevent mismatch
//! bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! HEADER_REGION_SIZE (16384 bytes)
//!       │
//!       ├─> FILE_HEADER_SIZE (128 bytes at offset 0)
//!       │
//!       └─> ATTR_REGION_SIZE (derived: HEADER_REGION_SIZE - FILE_HEADER_SIZE)
//!             The attribute block must fit between the fixed header and
//!             the first record.
//!
//! INDEX_STEP (65536 records)
//!       │
//!       └─> SPLIT_INDEX_GT (262144 records)
//!             Must be >= INDEX_STEP so the first seeded index point
//!             (at ordinal INDEX_STEP - 1) exists when the index is
//!             materialized.
//!
//! TABLE_CHUNK_RECORDS (4096)
//!       │
//!       └─> Table files grow by whole record chunks; the record region
//!           is always a multiple of TABLE_CHUNK_RECORDS * record_size.
//! ```
//!
//! ## Invariants
//!
//! 1. `ATTR_REGION_SIZE == HEADER_REGION_SIZE - FILE_HEADER_SIZE`
//! 2. `SPLIT_INDEX_GT >= INDEX_STEP` (first index point must be seedable)
//!
//! ## Modifying Constants
//!
//! The index thresholds are also settable per series before its first
//! append (`Timeseries::set_index_step`, `Timeseries::set_split_index_gt`);
//! the values here are the defaults every new series starts with. Tests
//! shrink them to exercise index creation at small scale.

// ============================================================================
// TABLE FILE LAYOUT CONSTANTS
// These define the on-disk structure of one record array
// ============================================================================

/// Size of the fixed header at the start of every table file.
pub const FILE_HEADER_SIZE: usize = 128;

/// Bytes reserved at the start of a table file for the fixed header plus
/// the attribute block; the record region starts here.
pub const HEADER_REGION_SIZE: usize = 16384;

/// Space available for the string-attribute block between the fixed
/// header and the record region.
pub const ATTR_REGION_SIZE: usize = HEADER_REGION_SIZE - FILE_HEADER_SIZE;

const _: () = assert!(
    ATTR_REGION_SIZE == HEADER_REGION_SIZE - FILE_HEADER_SIZE,
    "ATTR_REGION_SIZE derivation mismatch"
);

// ============================================================================
// RECORD LAYOUT CONSTANTS
// ============================================================================

/// Alignment word used when auto-packing schema offsets.
/// Each field offset is rounded up to a multiple of this when the schema
/// is built with `align = true`.
pub const ALIGN_WORD: usize = 4;

/// Number of records per table-file allocation chunk. The record region
/// grows in units of this many records.
pub const TABLE_CHUNK_RECORDS: usize = 4096;

// ============================================================================
// APPEND PATH CONSTANTS
// ============================================================================

/// Number of records accumulated in a table's append buffer before it is
/// flushed to the container.
pub const APPEND_BUFFER_SIZE: usize = 1000;

// ============================================================================
// SPARSE INDEX CONSTANTS
// ============================================================================

/// Series size above which the sparse index is materialized.
/// MUST be >= INDEX_STEP: the first index point is seeded at ordinal
/// `INDEX_STEP - 1`, which must lie inside the data table.
pub const SPLIT_INDEX_GT: u64 = 262_144;

/// Target spacing (in records) between adjacent sparse-index points.
pub const INDEX_STEP: u64 = 65_536;

const _: () = assert!(
    SPLIT_INDEX_GT >= INDEX_STEP,
    "SPLIT_INDEX_GT must be >= INDEX_STEP so the first index point is seedable"
);

// ============================================================================
// SCAN CONSTANTS
// ============================================================================

/// Window size (in records) of a buffered record set. Bounds the working
/// set of a large range scan; the window is reloaded as the cursor moves.
pub const SCAN_BUFFER_SIZE: u64 = 65_000;

// ============================================================================
// CLI CONSTANTS
// ============================================================================

/// Input chunk size for the streaming CSV importer (5 MiB).
pub const IMPORT_CHUNK_BYTES: usize = 5 * 1024 * 1024;

/// The `view` command prints one record out of every this many ordinals.
pub const VIEW_PRINT_STRIDE: u64 = 100;

// ============================================================================
// RESERVED NAMES
// ============================================================================

/// Name of the mandatory first field of every series schema.
pub const TIMESTAMP_FIELD_NAME: &str = "_TSDB_timestamp";

/// Name of the data table inside a series group.
pub const DATA_TABLE_NAME: &str = "_TSDB_data";

/// Name of the optional index sub-series inside a series group.
pub const INDEX_SERIES_NAME: &str = "_TSDB_index";

/// Name of the record-ordinal field of an index series.
pub const INDEX_RECORD_ID_FIELD: &str = "record_id";
