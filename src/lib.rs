//! # Tickstore - Timestamp-Ordered Time-Series Store
//!
//! Tickstore is an append-mostly time-series store built atop a
//! hierarchical binary container. Each *series* is a sequence of
//! fixed-width records in ascending timestamp order, optionally
//! accompanied by a sparse secondary index mapping timestamps to record
//! ordinals. The workload is CRUD-free: create a series, append records
//! in order (tolerating sortable or overlapping input), look records up
//! by ordinal or timestamp range, and scan large ranges through a
//! bounded-memory buffered view.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tickstore::{Field, FieldKind, Record, Store, Timeseries};
//!
//! let store = Store::create("./ticks.tsdb")?;
//! let mut series = Timeseries::create(
//!     store.root(),
//!     "usdjpy",
//!     "USD/JPY ticks",
//!     vec![Field::new("price", FieldKind::Double)],
//! )?;
//!
//! let record = Record::free(series.schema().clone());
//! record.cell(0).set_i64(1_262_307_661_000)?;   // _TSDB_timestamp
//! record.cell(1).set_f64(87.56)?;               // price
//! series.append_record(&record)?;
//! series.flush_append_buffer()?;
//!
//! let hit = series.record_id_le(1_262_307_661_500)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   Timeseries (append / index / search)   │
//! ├──────────────────────────────────────────┤
//! │  RecordSet │ BufferedRecordSet │ Record  │
//! ├──────────────────────────────────────────┤
//! │        Table (append buffer, reads)      │
//! ├──────────────────────────────────────────┤
//! │  Schema & Cells (typed views, offsets)   │
//! ├──────────────────────────────────────────┤
//! │ Container (store / groups / table files) │
//! ├──────────────────────────────────────────┤
//! │     Memory-Mapped Record-Array Files     │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Layout
//!
//! A store is a directory; each series is a group holding a data table
//! and, once it outgrows the split threshold, a nested index series:
//!
//! ```text
//! ticks.tsdb/
//! ├── tickstore.meta
//! └── usdjpy/
//!     ├── _TSDB_data.tbl       # field 0: _TSDB_timestamp
//!     └── _TSDB_index/         # sparse (timestamp, ordinal) keyframes
//!         └── _TSDB_data.tbl   # indexes recurse as they grow
//! ```
//!
//! ## Concurrency Model
//!
//! Single-threaded per open store. Record buffers are reference-counted
//! and shared by records, record sets and cells; writes through a `Cell`
//! assume the caller holds the only meaningful handle to those bytes.
//! Open tables and series flush their append buffers on drop (swallowing
//! errors) or on an explicit `close()` (surfacing them).
//!
//! ## Module Overview
//!
//! - [`schema`]: type-tagged fields and fixed-width record layouts
//! - [`memory`]: shared record buffers and typed cell views
//! - [`container`]: the hierarchical store (groups, tables, attributes)
//! - [`table`]: the append/read interface to one record array
//! - [`records`]: records, record sets, bounded-memory scans
//! - [`series`]: the ordered time series with sparse auto-indexing
//! - [`parsing`]: delimited-text tokenizing and field parsing
//! - [`cli`]: the `create` / `import` / `view` command implementations

pub mod cli;
pub mod config;
pub mod container;
pub mod datetime;
pub mod memory;
pub mod parsing;
pub mod records;
pub mod schema;
pub mod series;
pub mod table;

pub use container::{Group, Store};
pub use memory::{BlockPtr, Cell, MemoryBlock, OutOfMemory, TypeConversionError};
pub use records::{BufferedRecordSet, Record, RecordSet, RecordSetError};
pub use schema::{
    DateNum, Field, FieldKind, RecordId, Schema, SchemaError, SchemaRef, Timestamp,
};
pub use series::{Timeseries, TimeseriesError};
pub use table::{Table, TableError};
