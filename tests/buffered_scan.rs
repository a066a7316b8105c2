//! # Buffered Scan Tests
//!
//! The bounded-memory window over a series range must return exactly the
//! records a direct read returns, in both scan directions, across window
//! reloads at the real 65 000-record window size.
//!
//! ## Requirements Tested
//!
//! - R1: `record(i)` equals the direct read for every `i`, forward scan
//! - R2: Same under a reverse scan
//! - R3: Windows reload transparently across the 65 000-record boundary
//! - R4: Returned records stay valid after the window moves on

use tempfile::tempdir;
use tickstore::{Field, FieldKind, Store, Timeseries};

const N: u64 = 70_000;

/// Builds a series of `N` records with `ts = ordinal` and a payload
/// derived from it.
fn big_series(store: &Store) -> Timeseries {
    let mut series = Timeseries::create(
        store.root(),
        "big",
        "",
        vec![Field::new("value", FieldKind::Double)],
    )
    .unwrap();

    let stride = series.schema().size_of();
    let mut bytes = vec![0u8; stride * N as usize];
    for i in 0..N {
        let base = i as usize * stride;
        bytes[base..base + 8].copy_from_slice(&(i as i64).to_le_bytes());
        bytes[base + 8..base + 16].copy_from_slice(&(i as f64 * 0.5).to_le_bytes());
    }
    series.append_records(&mut bytes, false).unwrap();
    series
}

#[test]
fn forward_scan_matches_direct_reads_across_reloads() {
    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("db")).unwrap();
    let series = big_series(&store);

    let mut set = series.buffered_record_set_by_id(0, N - 1);
    assert_eq!(set.size(), N);

    // Sample densely around the window boundary and sparsely elsewhere.
    let mut probes: Vec<u64> = (0..N).step_by(4999).collect();
    probes.extend(64_990..65_010);
    probes.push(N - 1);

    for &i in &probes {
        let record = set.record(i).unwrap();
        assert_eq!(record.cell(0).to_timestamp().unwrap(), i as i64, "ts at {}", i);
        assert_eq!(
            record.cell(1).to_double().unwrap(),
            i as f64 * 0.5,
            "value at {}",
            i
        );
    }
}

#[test]
fn reverse_scan_matches_direct_reads_across_reloads() {
    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("db")).unwrap();
    let series = big_series(&store);

    let mut set = series.buffered_record_set_by_id(0, N - 1);
    set.set_direction(false);

    let mut probes: Vec<u64> = (0..N).rev().step_by(4999).collect();
    probes.extend((4_990..5_010).rev());
    probes.push(0);

    for &i in &probes {
        let record = set.record(i).unwrap();
        assert_eq!(record.cell(0).to_timestamp().unwrap(), i as i64, "ts at {}", i);
    }
}

#[test]
fn subrange_scans_are_offset_correctly() {
    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("db")).unwrap();
    let series = big_series(&store);

    let mut set = series.buffered_record_set_by_id(1_000, 2_000);
    assert_eq!(set.size(), 1_001);
    assert_eq!(set.record(0).unwrap().cell(0).to_timestamp().unwrap(), 1_000);
    assert_eq!(
        set.record(1_000).unwrap().cell(0).to_timestamp().unwrap(),
        2_000
    );
    assert!(set.record(1_001).is_err());
}

#[test]
fn timestamp_ranged_scans_compose_with_search() {
    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("db")).unwrap();
    let series = big_series(&store);

    let mut set = series
        .buffered_record_set_by_timestamp(100, 66_000)
        .unwrap();
    assert_eq!(set.size(), 65_901);
    assert_eq!(set.first_record_id(), 100);
    assert_eq!(set.record(0).unwrap().cell(0).to_timestamp().unwrap(), 100);
    assert_eq!(
        set.record(set.size() - 1)
            .unwrap()
            .cell(0)
            .to_timestamp()
            .unwrap(),
        66_000
    );

    // A range past the data is empty, not an error.
    let empty = series
        .buffered_record_set_by_timestamp(1_000_000, 2_000_000)
        .unwrap();
    assert_eq!(empty.size(), 0);
}

#[test]
fn records_outlive_window_reloads() {
    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("db")).unwrap();
    let series = big_series(&store);

    let mut set = series.buffered_record_set_by_id(0, N - 1);
    let first = set.record(0).unwrap();
    set.record(N - 1).unwrap(); // forces a reload far away

    assert_eq!(first.cell(0).to_timestamp().unwrap(), 0);
    assert_eq!(first.cell(1).to_double().unwrap(), 0.0);
}
