//! # Native Container
//!
//! The hierarchical binary container the store persists into. It provides
//! exactly the capabilities the upper layers contract for: create/open a
//! store, create/open groups within groups, enumerate children, create
//! fixed-stride record-array tables with chunked growth, append and read
//! record ranges, and get/set string attributes per table.
//!
//! ## Layout
//!
//! A store is a directory; groups are nested subdirectories; each table
//! is one memory-mapped record-array file:
//!
//! ```text
//! store_dir/
//! ├── tickstore.meta        # store identity (magic, version, layout)
//! ├── prices/               # a group
//! │   ├── _TSDB_data.tbl    # a table: header region + packed records
//! │   └── _TSDB_index/      # a nested group
//! │       └── _TSDB_data.tbl
//! └── ...
//! ```
//!
//! Table file layout:
//!
//! ```text
//! Header region (16 KiB): fixed header + string-attribute block
//! Record region:          records packed at the record stride; grows
//!                         in 4096-record chunks
//! ```
//!
//! ## Probes
//!
//! Existence checks (`TableFile::probe`, `Group::group_exists`) never
//! surface container errors; a malformed or missing file simply reports
//! absent. This is the moral equivalent of temporarily muting a library's
//! error printing while poking at names that may not exist.
//!
//! ## Module Organization
//!
//! - `headers`: zerocopy on-disk header structs
//! - `attrs`: string-attribute block in the header region
//! - `store`: store root, nested groups, child enumeration
//! - `table_file`: the memory-mapped fixed-stride record array

mod attrs;
mod headers;
mod store;
mod table_file;

pub use attrs::AttrBlock;
pub use headers::{
    StoreMetaHeader, TableFileHeader, CONTAINER_VERSION, STORE_META_MAGIC, TABLE_MAGIC,
};
pub use store::{Group, Store, META_FILE_NAME, TABLE_FILE_EXTENSION};
pub use table_file::TableFile;

pub(crate) use store::validate_name;
