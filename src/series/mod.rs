//! # Time Series
//!
//! A [`Timeseries`] is an ordered-by-timestamp table with an optional
//! sparse secondary index and an append protocol that keeps the ordering
//! invariant without ever rewriting existing records.
//!
//! ## Persisted Shape
//!
//! A series is a container group holding a data table and, once the
//! series is large enough, a nested index series of the same kind:
//!
//! ```text
//! /<series_name>/
//! ├── _TSDB_data          # field 0: _TSDB_timestamp (Timestamp)
//! └── _TSDB_index/        # optional, itself a full series
//!     ├── _TSDB_data      # fields: _TSDB_timestamp, record_id
//!     └── _TSDB_index/    # recursion continues as the index grows
//! ```
//!
//! ## Append Protocol
//!
//! Batch appends detect unsorted input and sort it in place (duplicate
//! timestamps may be reordered), then resolve overlap against the series
//! tail: with `discard_overlap` the leading overlapping records are
//! dropped and counted, otherwise the append fails and the series is
//! untouched. Every successful write ends with a tail-indexing pass.
//!
//! The single-record path buffers through the data table's append buffer
//! and enforces a strict per-record ordering guard instead; the guard
//! resets whenever the buffer flushes.
//!
//! ## Ordering Invariant
//!
//! For records `r_i` in the data table: `ts(r_0) <= ts(r_1) <= ... <=
//! ts(r_{n-1})`. Duplicate timestamps are permitted; their relative order
//! is not preserved across sort and append.

mod index;
mod search;

use eyre::{bail, ensure, Result};
use log::debug;

use crate::config::{
    DATA_TABLE_NAME, INDEX_SERIES_NAME, INDEX_STEP, SPLIT_INDEX_GT, TIMESTAMP_FIELD_NAME,
};
use crate::container::Group;
use crate::records::{BufferedRecordSet, Record, RecordSet};
use crate::schema::{Field, FieldKind, Schema, SchemaRef, Timestamp};
use crate::table::Table;

#[derive(Debug)]
pub enum TimeseriesError {
    AlreadyExists(String),
    NotFound(String),
    InvalidSchema(String),
    Overlap,
    MisorderedAppend { ts: Timestamp, last: Timestamp },
    RangeInverted { start: Timestamp, end: Timestamp },
}

impl std::fmt::Display for TimeseriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeseriesError::AlreadyExists(name) => {
                write!(f, "timeseries '{}' already exists", name)
            }
            TimeseriesError::NotFound(name) => write!(f, "timeseries '{}' does not exist", name),
            TimeseriesError::InvalidSchema(detail) => write!(f, "invalid schema: {}", detail),
            TimeseriesError::Overlap => {
                write!(f, "records are overlapping, and discard_overlap=false")
            }
            TimeseriesError::MisorderedAppend { ts, last } => write!(
                f,
                "attempted to append a misordered timestamp ({} after {})",
                ts, last
            ),
            TimeseriesError::RangeInverted { start, end } => write!(
                f,
                "start timestamp {} cannot be greater than end timestamp {}",
                start, end
            ),
        }
    }
}

impl std::error::Error for TimeseriesError {}

#[derive(Debug)]
pub struct Timeseries {
    group: Group,
    name: String,
    title: String,
    schema: SchemaRef,
    data: Table,
    index: Option<Box<Timeseries>>,
    split_index_gt: u64,
    index_step: u64,
    /// Ordering guard for the buffered single-record append path.
    /// `i64::MIN` whenever the append buffer is empty.
    buffer_last_ts: i64,
}

impl Timeseries {
    /// Creates a new series from a field list. A `_TSDB_timestamp` field
    /// is prepended automatically; do not include one.
    pub fn create(parent: &Group, name: &str, title: &str, fields: Vec<Field>) -> Result<Self> {
        let mut fields_with_timestamp =
            vec![Field::new(TIMESTAMP_FIELD_NAME, FieldKind::Timestamp)];
        fields_with_timestamp.extend(fields);
        let schema = SchemaRef::new(Schema::new(fields_with_timestamp, true));
        Self::create_with_schema(parent, name, title, schema)
    }

    /// Creates a new series from a caller-built schema. The schema's first
    /// field must be a `_TSDB_timestamp` of kind `Timestamp`.
    pub fn create_with_schema(
        parent: &Group,
        name: &str,
        title: &str,
        schema: SchemaRef,
    ) -> Result<Self> {
        if Self::exists(parent, name) {
            bail!(TimeseriesError::AlreadyExists(name.to_string()));
        }

        match schema.index_by_name(TIMESTAMP_FIELD_NAME) {
            Ok(0) => {}
            Ok(_) => bail!(TimeseriesError::InvalidSchema(format!(
                "{} is not the first field",
                TIMESTAMP_FIELD_NAME
            ))),
            Err(_) => bail!(TimeseriesError::InvalidSchema(format!(
                "{} field is missing",
                TIMESTAMP_FIELD_NAME
            ))),
        }
        if schema.field(0).kind() != FieldKind::Timestamp {
            bail!(TimeseriesError::InvalidSchema(format!(
                "{} field is not a Timestamp",
                TIMESTAMP_FIELD_NAME
            )));
        }

        let group = parent.create_group(name)?;
        let data = Table::create(&group, DATA_TABLE_NAME, "TSDB: Timeseries Data", schema)?;
        let schema = data.schema().clone();

        Ok(Self {
            group,
            name: name.to_string(),
            title: title.to_string(),
            schema,
            data,
            index: None,
            split_index_gt: SPLIT_INDEX_GT,
            index_step: INDEX_STEP,
            buffer_last_ts: i64::MIN,
        })
    }

    /// Opens an existing series, including its index chain if present.
    pub fn open(parent: &Group, name: &str) -> Result<Self> {
        if !Self::exists(parent, name) {
            bail!(TimeseriesError::NotFound(name.to_string()));
        }

        let group = parent.open_group(name)?;
        let data = Table::open(&group, DATA_TABLE_NAME)?;
        let schema = data.schema().clone();
        let title = data.title().to_string();

        let index = if Self::exists(&group, INDEX_SERIES_NAME) {
            Some(Box::new(Self::open(&group, INDEX_SERIES_NAME)?))
        } else {
            None
        };

        Ok(Self {
            group,
            name: name.to_string(),
            title,
            schema,
            data,
            index,
            split_index_gt: SPLIT_INDEX_GT,
            index_step: INDEX_STEP,
            buffer_last_ts: i64::MIN,
        })
    }

    /// Silent existence probe: a series is a group holding a data table.
    pub fn exists(parent: &Group, name: &str) -> bool {
        if !parent.group_exists(name) {
            return false;
        }
        match parent.open_group(name) {
            Ok(group) => Table::exists(&group, DATA_TABLE_NAME),
            Err(_) => false,
        }
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

    pub fn size(&self) -> u64 {
        self.data.size()
    }

    pub fn data_table(&self) -> &Table {
        &self.data
    }

    pub fn index(&self) -> Option<&Timeseries> {
        self.index.as_deref()
    }

    pub fn index_step(&self) -> u64 {
        self.index_step
    }

    pub fn split_index_gt(&self) -> u64 {
        self.split_index_gt
    }

    /// Sets the index-point spacing. Only legal before the first append.
    pub fn set_index_step(&mut self, index_step: u64) -> Result<()> {
        ensure!(index_step >= 2, "index step must be at least 2");
        ensure!(
            self.size() == 0 && self.data.append_buffer_len() == 0,
            "index step must be set before the first append"
        );
        self.index_step = index_step;
        Ok(())
    }

    /// Sets the index-materialization threshold. Only legal before the
    /// first append.
    pub fn set_split_index_gt(&mut self, split_index_gt: u64) -> Result<()> {
        ensure!(
            split_index_gt >= self.index_step,
            "split threshold must be at least the index step"
        );
        ensure!(
            self.size() == 0 && self.data.append_buffer_len() == 0,
            "split threshold must be set before the first append"
        );
        self.split_index_gt = split_index_gt;
        Ok(())
    }

    /// Timestamp of a packed record at `index` within `records`.
    /// The timestamp field sits at offset 0 by schema invariant, so batch
    /// paths read it directly instead of going through field lookups.
    fn batch_ts(records: &[u8], stride: usize, index: usize) -> i64 {
        let offset = index * stride;
        i64::from_le_bytes(records[offset..offset + 8].try_into().unwrap())
    }

    /// Appends a batch of packed records.
    ///
    /// Unsorted batches are sorted in place by timestamp first. Records
    /// whose timestamps precede the series' last timestamp are discarded
    /// when `discard_overlap` is set (the return value is the number
    /// discarded) and fail with [`TimeseriesError::Overlap`] otherwise.
    pub fn append_records(&mut self, records: &mut [u8], discard_overlap: bool) -> Result<usize> {
        let stride = self.schema.size_of();
        ensure!(
            records.len() % stride == 0,
            "record batch of {} bytes is not a multiple of the record size {}",
            records.len(),
            stride
        );
        let nrecords = records.len() / stride;
        if nrecords == 0 {
            return Ok(0);
        }

        debug!("appending {} records to series '{}'", nrecords, self.name);

        if nrecords > 1 {
            let mut sorted = true;
            let mut prev = Self::batch_ts(records, stride, 0);
            for i in 1..nrecords {
                let ts = Self::batch_ts(records, stride, i);
                if prev > ts {
                    sorted = false;
                    break;
                }
                prev = ts;
            }

            if !sorted {
                debug!("records need to be sorted");
                sort_records_by_timestamp(records, stride);
            }
        }

        let first_batch = Self::batch_ts(records, stride, 0);
        let prev = match self.data.last_record()? {
            Some(record) => Some(record.cell(0).to_timestamp()?),
            None => None,
        };

        if let Some(prev) = prev {
            if prev > first_batch {
                if !discard_overlap {
                    bail!(TimeseriesError::Overlap);
                }

                // Find the first record at or after the series tail.
                for k in 0..nrecords {
                    if Self::batch_ts(records, stride, k) >= prev {
                        self.data
                            .append_records(nrecords - k, &records[k * stride..])?;
                        self.index_tail()?;
                        debug!(
                            "appended {} records, but discarded {} records",
                            nrecords - k,
                            k
                        );
                        return Ok(k);
                    }
                }

                debug!("did not append any records; all timestamps precede the series tail");
                return Ok(nrecords);
            }
        }

        self.data.append_records(nrecords, records)?;
        self.index_tail()?;
        Ok(0)
    }

    /// Appends the records of an in-memory record set.
    pub fn append_record_set(&mut self, set: &RecordSet, discard_overlap: bool) -> Result<usize> {
        let stride = self.schema.size_of();
        let mut bytes = set.block_ptr().read_vec(0, set.size() as usize * stride);
        self.append_records(&mut bytes, discard_overlap)
    }

    /// Buffered single-record append. Enforces a strict per-record
    /// ordering guard: each record must not precede the last one appended
    /// through this path since the last buffer flush.
    pub fn append_record(&mut self, record: &Record) -> Result<()> {
        let ts = record.cell(0).to_timestamp()?;

        if ts < self.buffer_last_ts {
            bail!(TimeseriesError::MisorderedAppend {
                ts,
                last: self.buffer_last_ts,
            });
        }

        self.data.append_record(record)?;
        self.buffer_last_ts = ts;

        if self.data.append_buffer_len() == 0 {
            // The table just flushed a full buffer; restart the guard and
            // index the newly visible tail.
            self.buffer_last_ts = i64::MIN;
            self.index_tail()?;
        }
        Ok(())
    }

    /// Flushes the append buffer and indexes the tail.
    pub fn flush_append_buffer(&mut self) -> Result<()> {
        self.data.flush_append_buffer()?;
        self.buffer_last_ts = i64::MIN;
        self.index_tail()
    }

    /// Flushes, syncs, and closes the series, surfacing errors that an
    /// implicit drop would only log.
    pub fn close(mut self) -> Result<()> {
        self.flush_append_buffer()?;
        self.data.sync()?;
        if let Some(index) = self.index.take() {
            index.close()?;
        }
        Ok(())
    }

    pub(crate) fn group(&self) -> &Group {
        &self.group
    }

    /// The last record of the series, or `None` when it is empty.
    pub fn last_record(&self) -> Result<Option<Record>> {
        self.data.last_record()
    }

    /// Records `first..=last` by ordinal, inclusive, as an in-memory set.
    pub fn record_set_by_id(&self, first: u64, last: u64) -> Result<RecordSet> {
        self.data.record_set(first, last)
    }

    /// A bounded-memory window over records `first..=last` by ordinal.
    pub fn buffered_record_set_by_id(&self, first: u64, last: u64) -> BufferedRecordSet<'_> {
        self.data.buffered_record_set(first, last)
    }

    /// Resolves an inclusive timestamp range to an ordinal range.
    /// `Ok(None)` means the range selects no records.
    fn timestamp_range_ids(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Option<(u64, u64)>> {
        let Some(start_id) = self.record_id_ge(start)? else {
            return Ok(None);
        };

        let end_id = match self.record_id_ge(end.saturating_add(1))? {
            None => self.size() - 1,
            Some(0) => return Ok(None),
            Some(id) => id - 1,
        };

        if end_id < start_id {
            return Ok(None);
        }
        Ok(Some((start_id, end_id)))
    }

    /// Records with timestamps in `[start, end]`, inclusive on both ends.
    /// An empty set when nothing falls in the range; an error when the
    /// range is inverted.
    pub fn record_set_by_timestamp(&self, start: Timestamp, end: Timestamp) -> Result<RecordSet> {
        if start > end {
            bail!(TimeseriesError::RangeInverted { start, end });
        }
        match self.timestamp_range_ids(start, end)? {
            Some((first, last)) => self.record_set_by_id(first, last),
            None => Ok(RecordSet::empty()),
        }
    }

    /// A bounded-memory window over records with timestamps in
    /// `[start, end]`. Empty (never an error) when nothing matches.
    pub fn buffered_record_set_by_timestamp(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<BufferedRecordSet<'_>> {
        if start > end {
            return Ok(BufferedRecordSet::empty());
        }
        match self.timestamp_range_ids(start, end)? {
            Some((first, last)) => Ok(self.buffered_record_set_by_id(first, last)),
            None => Ok(BufferedRecordSet::empty()),
        }
    }

    /// How many records have timestamps in `[start, end]`.
    pub fn n_records_by_timestamp(&self, start: Timestamp, end: Timestamp) -> Result<u64> {
        if start > end {
            return Ok(0);
        }
        Ok(match self.timestamp_range_ids(start, end)? {
            Some((first, last)) => last - first + 1,
            None => 0,
        })
    }
}

/// Sorts a packed record batch by its offset-0 timestamps. Duplicate
/// timestamps may be reordered.
fn sort_records_by_timestamp(records: &mut [u8], stride: usize) {
    let nrecords = records.len() / stride;
    let mut order: Vec<(i64, usize)> = (0..nrecords)
        .map(|i| (Timeseries::batch_ts(records, stride, i), i))
        .collect();
    order.sort_unstable_by_key(|&(ts, _)| ts);

    let mut sorted = vec![0u8; records.len()];
    for (dst, &(_, src)) in order.iter().enumerate() {
        sorted[dst * stride..(dst + 1) * stride]
            .copy_from_slice(&records[src * stride..(src + 1) * stride]);
    }
    records.copy_from_slice(&sorted);
}
