//! # Timestamp-to-Ordinal Search
//!
//! The two search primitives resolve a timestamp to a record ordinal:
//!
//! - [`Timeseries::record_id_le`]: the greatest ordinal whose timestamp
//!   is `<= t`; within a duplicate group, the *first* record of the group.
//! - [`Timeseries::record_id_ge`]: the least ordinal whose timestamp is
//!   `>= t`, which is already the first of its group.
//!
//! With an index present, the primitives recurse into it to narrow the
//! data-table window to roughly one index step, then scan the window in
//! memory. Recursion depth is logarithmic in the series size with base
//! `index_step` — at most a few levels for any realistic table.

use eyre::Result;

use crate::series::index::index_point_at;
use crate::schema::Timestamp;
use crate::series::Timeseries;

/// Outcome of narrowing a search through the index layer.
enum Narrowed {
    /// The index held the exact timestamp; this is the answer.
    Exact(u64),
    /// Scan the data table over this inclusive ordinal window.
    Window { first: u64, last: u64 },
}

impl Timeseries {
    /// Ordinal window the data-table scan must cover for timestamp `t`,
    /// narrowed through the index when one exists.
    fn narrow_through_index(&self, t: Timestamp) -> Result<Narrowed> {
        let size = self.size();
        let Some(index) = self.index() else {
            return Ok(Narrowed::Window {
                first: 0,
                last: size - 1,
            });
        };

        let first = match index.record_id_le(t)? {
            Some(indx_id) => {
                let block = index.data_table().records_as_block(indx_id, indx_id)?;
                let point = index_point_at(&block, 0);
                // An exact hit: index points land on the first record of
                // their group, so the point's ordinal is the answer for
                // both primitives.
                if point.ts == t {
                    return Ok(Narrowed::Exact(point.record_id));
                }
                point.record_id
            }
            None => 0,
        };

        // No point probing the GE side for equality; an exact timestamp
        // would have surfaced through the LE side above.
        let last = match index.record_id_ge(t)? {
            Some(indx_id) => {
                let block = index.data_table().records_as_block(indx_id, indx_id)?;
                index_point_at(&block, 0).record_id
            }
            None => size - 1,
        };

        Ok(Narrowed::Window { first, last })
    }

    /// Greatest ordinal whose timestamp is `<= t`; for a duplicate group
    /// the first record of the group. `None` when every record is later
    /// than `t`.
    pub fn record_id_le(&self, t: Timestamp) -> Result<Option<u64>> {
        if self.size() == 0 {
            return Ok(None);
        }

        let (first, last) = match self.narrow_through_index(t)? {
            Narrowed::Exact(id) => return Ok(Some(id)),
            Narrowed::Window { first, last } => (first, last),
        };

        let block = self.data_table().records_as_block(first, last)?;
        let stride = self.schema().size_of();
        let ts_at =
            |i: u64| -> i64 { i64::from_le_bytes(block.read_array::<8>(i as usize * stride)) };

        // Scan backward for the last record at or before t, then keep
        // backing up to the first record of that timestamp group.
        let mut i = last - first;
        loop {
            let ts = ts_at(i);
            if ts <= t {
                let matchts = ts;
                while i > 0 {
                    if ts_at(i - 1) < matchts {
                        return Ok(Some(first + i));
                    }
                    i -= 1;
                }
                // Reached the top of the window: the window's first
                // ordinal starts the group.
                return Ok(Some(first));
            }
            if i == 0 {
                return Ok(None);
            }
            i -= 1;
        }
    }

    /// Least ordinal whose timestamp is `>= t` (automatically the first of
    /// its group). `None` when every record is earlier than `t`.
    pub fn record_id_ge(&self, t: Timestamp) -> Result<Option<u64>> {
        if self.size() == 0 {
            return Ok(None);
        }

        let (first, last) = match self.narrow_through_index(t)? {
            Narrowed::Exact(id) => return Ok(Some(id)),
            Narrowed::Window { first, last } => (first, last),
        };

        let block = self.data_table().records_as_block(first, last)?;
        let stride = self.schema().size_of();

        for i in 0..=(last - first) {
            let ts = i64::from_le_bytes(block.read_array::<8>(i as usize * stride));
            if ts >= t {
                return Ok(Some(first + i));
            }
        }

        Ok(None)
    }
}
