//! # Sparse Index Maintenance
//!
//! The index is a nested series of `(timestamp, record_id)` points, one
//! approximately every `index_step` records of the data table. Every
//! point lands on the *first* record of its timestamp group, which keeps
//! the search primitives free of group-boundary probing.
//!
//! Creation is lazy: nothing exists until the data table outgrows
//! `split_index_gt`; the first pass seeds points over the existing data,
//! and every subsequent append extends the index from its last point
//! ([`Timeseries::index_tail`]). Appending points goes through the nested
//! series' own append path, so an index that itself outgrows the
//! threshold spawns its own index recursively.

use eyre::Result;
use log::{debug, info};
use smallvec::SmallVec;

use crate::config::{INDEX_RECORD_ID_FIELD, INDEX_SERIES_NAME, TIMESTAMP_FIELD_NAME};
use crate::memory::BlockPtr;
use crate::schema::{Field, FieldKind, Schema, SchemaRef, Timestamp};
use crate::series::Timeseries;

/// One sparse-index entry: the timestamp at `record_id`, where
/// `record_id` is the first record of that timestamp group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexPoint {
    pub ts: Timestamp,
    pub record_id: u64,
}

/// Index records are two aligned 8-byte fields.
pub(crate) const INDEX_RECORD_SIZE: usize = 16;

pub(crate) fn index_schema() -> SchemaRef {
    SchemaRef::new(Schema::new(
        vec![
            Field::new(TIMESTAMP_FIELD_NAME, FieldKind::Timestamp),
            Field::new(INDEX_RECORD_ID_FIELD, FieldKind::Record),
        ],
        true,
    ))
}

/// Parses an index record out of a packed block.
pub(crate) fn index_point_at(block: &BlockPtr, record: usize) -> IndexPoint {
    let base = record * INDEX_RECORD_SIZE;
    IndexPoint {
        ts: i64::from_le_bytes(block.read_array::<8>(base)),
        record_id: u64::from_le_bytes(block.read_array::<8>(base + 8)),
    }
}

fn encode_points(points: &[IndexPoint]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(points.len() * INDEX_RECORD_SIZE);
    for point in points {
        bytes.extend_from_slice(&point.ts.to_le_bytes());
        bytes.extend_from_slice(&point.record_id.to_le_bytes());
    }
    bytes
}

impl Timeseries {
    /// Timestamps of data records `first` and `first + 1`, read as a pair.
    fn adjacent_ts(&self, first: u64) -> Result<(Timestamp, Timestamp)> {
        let block = self.data_table().records_as_block(first, first + 1)?;
        let stride = self.schema().size_of();
        let prev = i64::from_le_bytes(block.read_array::<8>(0));
        let this = i64::from_le_bytes(block.read_array::<8>(stride));
        Ok((prev, this))
    }

    /// Materializes the index if the data table has outgrown the split
    /// threshold. Returns `false` when an index already exists (nothing
    /// done), `true` when one was just created or the table is still too
    /// small for one.
    pub fn create_index_if_necessary(&mut self) -> Result<bool> {
        if self.index.is_some() {
            return Ok(false);
        }

        let nrecords = self.size();
        if nrecords <= self.split_index_gt() {
            return Ok(true);
        }

        info!(
            "creating a new index for series '{}' ({} records)",
            self.name(),
            nrecords
        );

        let mut index =
            Timeseries::create_with_schema(self.group(), INDEX_SERIES_NAME, "TSDB: Index", index_schema())?;
        // The nested series inherits the tuning knobs, so recursion
        // triggers at the same scale at every level.
        index.set_index_step(self.index_step())?;
        index.set_split_index_gt(self.split_index_gt())?;

        // Seed points over the already-existing data. Each point must land
        // on the first record of a timestamp group; a probe that falls
        // inside a duplicate run walks forward one record at a time until
        // the group ends.
        let mut points: Vec<IndexPoint> = Vec::new();
        let mut i = self.index_step() - 1;
        while i < nrecords {
            let (prev, this) = self.adjacent_ts(i - 1)?;
            if prev != this {
                points.push(IndexPoint {
                    ts: this,
                    record_id: i,
                });
                debug!("index point added at record #{}", i);
                i += self.index_step();
            } else {
                i += 1;
            }
        }

        if !points.is_empty() {
            let mut bytes = encode_points(&points);
            index.append_records(&mut bytes, true)?;
        }

        self.index = Some(Box::new(index));
        Ok(true)
    }

    /// Indexes the tail of the data table: scans the records past the last
    /// index point and appends any new points as one batch. Called after
    /// every successful append.
    pub fn index_tail(&mut self) -> Result<()> {
        // `true` covers both "too small for an index" and "the index was
        // created just now" (creation already indexed everything).
        if self.create_index_if_necessary()? {
            return Ok(());
        }

        debug!("indexing the tail of series '{}'", self.name());

        let step = self.index_step();
        let nrecords = self.size();

        let mut blk_start = {
            let index = self.index.as_ref().expect("index exists past creation");
            match index.last_record()? {
                Some(last) => {
                    let record_id = last.cell(1).to_record_id()?;
                    record_id + step
                }
                // An index can exist with no points yet (one long
                // duplicate run); resume probing from the seed position.
                None => step,
            }
        };

        let mut points: SmallVec<[IndexPoint; 16]> = SmallVec::new();

        while blk_start < nrecords {
            let (prevts, thists) = self.adjacent_ts(blk_start - 1)?;

            if prevts != thists {
                // The block starts a new timestamp group.
                points.push(IndexPoint {
                    ts: thists,
                    record_id: blk_start,
                });
                debug!("index point added at record #{}", blk_start);
                blk_start += step;
                continue;
            }

            // The block starts inside a duplicate run: scan a bounded
            // window for the first timestamp change.
            let window_last = (blk_start + step - 2).min(nrecords - 1);
            let block = self.data_table().records_as_block(blk_start, window_last)?;
            let stride = self.schema().size_of();
            let window_len = (window_last - blk_start + 1) as usize;

            let mut found = None;
            for j in 0..window_len {
                let ts = i64::from_le_bytes(block.read_array::<8>(j * stride));
                if ts != prevts {
                    found = Some((j as u64, ts));
                    break;
                }
            }

            match found {
                Some((j, ts)) => {
                    points.push(IndexPoint {
                        ts,
                        record_id: blk_start + j,
                    });
                    debug!("index point added at record #{}", blk_start + j);
                    blk_start = blk_start + j + step;
                }
                None => {
                    blk_start += step;
                }
            }
        }

        if !points.is_empty() {
            let mut bytes = encode_points(&points);
            // The nested series runs this same algorithm on its own tail.
            let index = self.index.as_mut().expect("index exists past creation");
            index.append_records(&mut bytes, true)?;
        }

        Ok(())
    }
}
