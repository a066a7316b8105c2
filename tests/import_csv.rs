//! # CLI Pipeline Tests
//!
//! The create → import → view flow over a real delimited file, exercising
//! the token filters, multi-token timestamp parsing, chunked streaming,
//! and overlap discard exactly as the command-line surfaces drive them.

use std::fs;

use tempfile::tempdir;
use tickstore::cli::{run_create, run_import, run_view, ImportOptions};
use tickstore::{Store, Timeseries};

fn usdjpy_options() -> ImportOptions {
    ImportOptions {
        timestamp_format: "%Y/%m/%d %H:%M:%S%F".to_string(),
        timestamp_tokens: vec![0, 1],
        field_tokens: Some(vec![3, 4, 5]),
        skip_unless: vec![(vec![2], "USD/JPY".to_string())],
        ..ImportOptions::default()
    }
}

#[test]
fn import_filters_parses_and_appends() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("ticks.tsdb");
    let csv_path = dir.path().join("quotes.csv");

    fs::write(
        &csv_path,
        "2010/01/01,01:01:01.100,USD/JPY,87.56,5,0\n\
         2010/01/01,01:01:01.100,USD/JPY,87.58,6,1\n\
         2010/01/01,01:01:01.100,EUR/USD,1.56,1,0\n\
         2010/01/01,01:01:01.250,USD/JPY,87.59,25,0\n\
         \n\
         2010/01/01,01:01:01.350,EUR/USD,1.54,1,0\n\
         2010/01/01,01:01:01.350,USD/JPY,87.61,4,1\n",
    )
    .unwrap();

    run_create(
        &store_path,
        "usdjpy",
        &[
            ("double".to_string(), "price".to_string()),
            ("int32".to_string(), "amount".to_string()),
            ("int8".to_string(), "side".to_string()),
        ],
    )
    .unwrap();

    run_import(&store_path, "usdjpy", &csv_path, &usdjpy_options()).unwrap();

    let store = Store::open(&store_path).unwrap();
    let series = Timeseries::open(store.root(), "usdjpy").unwrap();
    assert_eq!(series.size(), 4, "only the USD/JPY rows are kept");

    let set = series.record_set_by_id(0, 3).unwrap();
    let first = set.record(0).unwrap();
    assert_eq!(first.cell(0).to_string_value(), "2010-01-01T01:01:01.100");
    assert_eq!(first.cell(1).to_double().unwrap(), 87.56);
    assert_eq!(first.cell(2).to_int32().unwrap(), 5);
    assert_eq!(first.cell(3).to_int8().unwrap(), 0);

    let last = set.record(3).unwrap();
    assert_eq!(last.cell(0).to_string_value(), "2010-01-01T01:01:01.350");
    assert_eq!(last.cell(1).to_double().unwrap(), 87.61);

    // Timestamps are non-decreasing after import.
    let mut prev = i64::MIN;
    for i in 0..set.size() {
        let ts = set.record(i).unwrap().cell(0).to_timestamp().unwrap();
        assert!(ts >= prev);
        prev = ts;
    }
}

#[test]
fn reimporting_older_data_discards_it() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("ticks.tsdb");
    let csv_path = dir.path().join("quotes.csv");

    fs::write(
        &csv_path,
        "2010/01/01,01:01:01.100,USD/JPY,87.56,5,0\n\
         2010/01/01,01:01:01.250,USD/JPY,87.59,25,0\n",
    )
    .unwrap();

    run_create(
        &store_path,
        "usdjpy",
        &[
            ("double".to_string(), "price".to_string()),
            ("int32".to_string(), "amount".to_string()),
            ("int8".to_string(), "side".to_string()),
        ],
    )
    .unwrap();

    run_import(&store_path, "usdjpy", &csv_path, &usdjpy_options()).unwrap();
    {
        let store = Store::open(&store_path).unwrap();
        let series = Timeseries::open(store.root(), "usdjpy").unwrap();
        assert_eq!(series.size(), 2);
    }

    // The same file again: every record precedes or equals the tail, and
    // the ones strictly before it are dropped silently.
    run_import(&store_path, "usdjpy", &csv_path, &usdjpy_options()).unwrap();
    let store = Store::open(&store_path).unwrap();
    let series = Timeseries::open(store.root(), "usdjpy").unwrap();
    assert_eq!(series.size(), 3, "only the tail-equal record re-appends");
}

#[test]
fn malformed_lines_are_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("ticks.tsdb");
    let csv_path = dir.path().join("quotes.csv");

    fs::write(
        &csv_path,
        "2010/01/01,01:01:01.100,USD/JPY,87.56,5,0\n\
         not,a,USD/JPY,valid,row,here\n\
         2010/01/01,01:01:01.200,USD/JPY,87.60,2,1\n",
    )
    .unwrap();

    run_create(
        &store_path,
        "usdjpy",
        &[
            ("double".to_string(), "price".to_string()),
            ("int32".to_string(), "amount".to_string()),
            ("int8".to_string(), "side".to_string()),
        ],
    )
    .unwrap();

    run_import(&store_path, "usdjpy", &csv_path, &usdjpy_options()).unwrap();

    let store = Store::open(&store_path).unwrap();
    let series = Timeseries::open(store.root(), "usdjpy").unwrap();
    assert_eq!(series.size(), 2);
}

#[test]
fn view_runs_over_an_imported_range() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("ticks.tsdb");
    let csv_path = dir.path().join("quotes.csv");

    let mut csv = String::new();
    for i in 0..250 {
        csv.push_str(&format!(
            "2010/01/01,01:00:{:02}.{:03},USD/JPY,87.{:02},5,0\n",
            i / 10,
            (i % 10) * 100,
            i % 100
        ));
    }
    fs::write(&csv_path, csv).unwrap();

    run_create(
        &store_path,
        "usdjpy",
        &[
            ("double".to_string(), "price".to_string()),
            ("int32".to_string(), "amount".to_string()),
            ("int8".to_string(), "side".to_string()),
        ],
    )
    .unwrap();
    run_import(&store_path, "usdjpy", &csv_path, &usdjpy_options()).unwrap();

    // The sampled print path must traverse without error, both for a
    // populated range and for an empty one.
    run_view(
        &store_path,
        "usdjpy",
        "2010-01-01T00:00:00",
        "2010-01-02T00:00:00",
    )
    .unwrap();
    run_view(
        &store_path,
        "usdjpy",
        "2020-01-01T00:00:00",
        "2020-01-02T00:00:00",
    )
    .unwrap();
}
