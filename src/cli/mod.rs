//! # CLI Commands
//!
//! Implementations of the three `tickstore` subcommands:
//!
//! - `create` — create a store (if needed) and a new series in it
//! - `import` — stream a delimited text file into an existing series
//! - `view`   — print a sample of records from a timestamp range
//!
//! The binary in `src/bin/tickstore.rs` parses arguments and dispatches
//! here; these functions hold all the behavior so they stay testable.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use eyre::{bail, ensure, Result, WrapErr};

use crate::config::{IMPORT_CHUNK_BYTES, VIEW_PRINT_STRIDE};
use crate::container::Store;
use crate::datetime::{parse_iso_timestamp, parse_timestamp_format};
use crate::parsing::{Comparison, FieldParser, RecordParser, TokenFilter};
use crate::records::Record;
use crate::schema::{Field, FieldKind, Schema, SchemaRef, Timestamp};
use crate::series::Timeseries;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Parses a CLI field-type token (`double`, `int32`, `string(12)`, ...).
pub fn parse_field_kind(token: &str) -> Result<FieldKind> {
    let upper = token.to_uppercase();
    Ok(match upper.as_str() {
        "TIMESTAMP" => FieldKind::Timestamp,
        "DATE" => FieldKind::Date,
        "INT32" => FieldKind::Int32,
        "INT8" => FieldKind::Int8,
        "DOUBLE" => FieldKind::Double,
        "CHAR" => FieldKind::Char,
        "RECORD" => FieldKind::Record,
        other => {
            let Some(inner) = other.strip_prefix("STRING(").and_then(|s| s.strip_suffix(')'))
            else {
                bail!("incorrect field type '{}'", token);
            };
            let size: usize = inner
                .parse()
                .wrap_err_with(|| format!("bad string size in '{}'", token))?;
            ensure!(size >= 1, "string size of {} is too small", size);
            FieldKind::String(size)
        }
    })
}

/// `create <store> <series> (<type> <name>)...`
///
/// Creates the store when none exists yet, then the series. The
/// `_TSDB_timestamp` field is prepended automatically. The record layout
/// is tightly packed for space efficiency.
pub fn run_create(
    store_path: &Path,
    series_name: &str,
    field_specs: &[(String, String)],
) -> Result<()> {
    ensure!(!field_specs.is_empty(), "one or more fields required");

    let mut fields = vec![Field::new(
        crate::config::TIMESTAMP_FIELD_NAME,
        FieldKind::Timestamp,
    )];
    for (type_token, name) in field_specs {
        fields.push(Field::new(name.clone(), parse_field_kind(type_token)?));
    }

    let store = Store::open_or_create(store_path)?;
    let schema = SchemaRef::new(Schema::new(fields, false));
    let series = Timeseries::create_with_schema(store.root(), series_name, "", schema)?;
    series.close()?;

    println!(
        "created series '{}' in '{}'",
        series_name,
        store_path.display()
    );
    Ok(())
}

/// Options assembling the import parser pipeline.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Token delimiter characters. Default: comma.
    pub delimiter: String,
    /// Use the fast splitter (no quoting or escapes).
    pub simple: bool,
    /// Format string for the timestamp tokens.
    pub timestamp_format: String,
    /// Token indices joined (with spaces) into the timestamp.
    pub timestamp_tokens: Vec<usize>,
    /// Token indices for the non-timestamp fields, in schema order.
    /// Defaults to the tokens following the timestamp tokens.
    pub field_tokens: Option<Vec<usize>>,
    /// Rows where these tokens equal the value are skipped.
    pub skip_if: Vec<(Vec<usize>, String)>,
    /// Rows where these tokens differ from the value are skipped.
    pub skip_unless: Vec<(Vec<usize>, String)>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            simple: false,
            timestamp_format: "%Y-%m-%dT%H:%M:%S%F".to_string(),
            timestamp_tokens: vec![0],
            field_tokens: None,
            skip_if: Vec::new(),
            skip_unless: Vec::new(),
        }
    }
}

/// Builds the filter/parser pipeline for a series schema.
fn build_parser(schema: &SchemaRef, options: &ImportOptions) -> Result<RecordParser> {
    let mut parser = RecordParser::new(schema.clone());
    parser.set_delimiter(options.delimiter.clone());
    parser.set_simple_parse(options.simple);

    for (tokens, value) in &options.skip_if {
        parser.add_token_filter(TokenFilter::new(
            tokens.clone(),
            Comparison::EqualTo,
            value.clone(),
        )?);
    }
    for (tokens, value) in &options.skip_unless {
        parser.add_token_filter(TokenFilter::new(
            tokens.clone(),
            Comparison::NotEqualTo,
            value.clone(),
        )?);
    }

    parser.add_field_parser(FieldParser::timestamp(
        options.timestamp_tokens.clone(),
        options.timestamp_format.clone(),
        schema.field(0).name(),
    ))?;

    let field_tokens: Vec<usize> = match &options.field_tokens {
        Some(tokens) => tokens.clone(),
        None => {
            let first = options
                .timestamp_tokens
                .iter()
                .max()
                .map(|&m| m + 1)
                .unwrap_or(0);
            (first..first + schema.nfields() - 1).collect()
        }
    };
    ensure!(
        field_tokens.len() == schema.nfields() - 1,
        "schema has {} non-timestamp fields but {} field tokens were given",
        schema.nfields() - 1,
        field_tokens.len()
    );

    for (i, &token) in field_tokens.iter().enumerate() {
        let field = schema.field(i + 1);
        let name = field.name();
        let field_parser = match field.kind() {
            FieldKind::Double => FieldParser::double(token, name),
            FieldKind::Int32 => FieldParser::int32(token, name),
            FieldKind::Int8 => FieldParser::int8(token, name),
            FieldKind::Char => FieldParser::char(token, name),
            FieldKind::String(_) => FieldParser::string(vec![token], name),
            FieldKind::Timestamp => FieldParser::timestamp(
                vec![token],
                options.timestamp_format.clone(),
                name,
            ),
            other => bail!(
                "field '{}' of kind {:?} is not importable from text",
                name,
                other
            ),
        };
        parser.add_field_parser(field_parser)?;
    }

    Ok(parser)
}

/// `import <store> <series> <in-file> [options]`
///
/// Streams the input in 5 MiB chunks, parses line by line, and appends
/// each chunk's records with overlap discard. Unparseable lines are
/// reported and skipped; discarded (overlapping) records are counted.
pub fn run_import(
    store_path: &Path,
    series_name: &str,
    input_path: &Path,
    options: &ImportOptions,
) -> Result<()> {
    let store = Store::open(store_path)?;
    let mut series = Timeseries::open(store.root(), series_name)?;
    let schema = series.schema().clone();
    let stride = schema.size_of();

    let mut parser = build_parser(&schema, options)?;
    let record = Record::free(schema);

    let mut file = File::open(input_path)
        .wrap_err_with(|| format!("unable to open input file '{}'", input_path.display()))?;
    let total_bytes = file.metadata()?.len();
    println!("input file size is {} MiB", total_bytes / BYTES_PER_MIB);

    let mut buffer = vec![0u8; IMPORT_CHUNK_BYTES];
    let mut carry = 0usize;
    let mut completed = 0u64;
    let mut line_number = 0u64;
    let mut written = 0u64;
    let mut discarded = 0u64;
    let mut batch: Vec<u8> = Vec::new();

    loop {
        let bytes_read = file
            .read(&mut buffer[carry..])
            .wrap_err("error reading from input file")?;
        let filled = carry + bytes_read;
        completed += bytes_read as u64;

        if filled == 0 {
            break;
        }

        // Parse up to the last complete line; carry the partial tail
        // over to the next chunk. At end of input everything is a line.
        let parse_end = if bytes_read == 0 {
            filled
        } else {
            match buffer[..filled].iter().rposition(|&b| b == b'\n') {
                Some(pos) => pos + 1,
                None => {
                    ensure!(
                        filled < buffer.len(),
                        "line longer than the {} byte import buffer",
                        buffer.len()
                    );
                    carry = filled;
                    continue;
                }
            }
        };

        batch.clear();
        for raw_line in buffer[..parse_end].split(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(raw_line);
            let line = line.trim_end_matches('\r');
            line_number += 1;
            if line.is_empty() {
                continue;
            }

            match parser.parse_line(line, &record) {
                Ok(true) => batch.extend_from_slice(&record.bytes()),
                Ok(false) => {}
                Err(e) => {
                    eprintln!("error parsing line #{}: '{}': {:#}", line_number, line, e);
                }
            }
        }

        let nbatch = (batch.len() / stride) as u64;
        let ndisc = series.append_records(&mut batch, true)? as u64;
        if ndisc > 0 {
            eprintln!("{} record(s) discarded because they were misordered", ndisc);
        }
        written += nbatch - ndisc;
        discarded += ndisc;

        println!(
            "read {} / {} MiB, wrote {} records",
            completed / BYTES_PER_MIB,
            total_bytes / BYTES_PER_MIB,
            written
        );

        if bytes_read == 0 {
            break;
        }

        buffer.copy_within(parse_end..filled, 0);
        carry = filled - parse_end;
    }

    series.close()?;
    println!(
        "import complete: {} records written, {} discarded",
        written, discarded
    );
    Ok(())
}

/// Accepts both the ISO form the store prints and the compact
/// `YYYYMMDDThhmmss[.fff]` form.
pub fn parse_cli_timestamp(s: &str) -> Result<Timestamp> {
    if s.contains('-') {
        parse_iso_timestamp(s)
    } else {
        parse_timestamp_format(s, "%Y%m%dT%H%M%S%F")
    }
}

/// `view <store> <series> <start> <end>`
///
/// Prints every 100th record in the timestamp range, prefixed with its
/// ordinal, through a bounded-memory scan.
pub fn run_view(store_path: &Path, series_name: &str, start: &str, end: &str) -> Result<()> {
    let store = Store::open(store_path)?;
    let series = Timeseries::open(store.root(), series_name)?;

    let start_ts = parse_cli_timestamp(start)?;
    let end_ts = parse_cli_timestamp(end)?;

    let mut set = series.buffered_record_set_by_timestamp(start_ts, end_ts)?;
    if set.size() == 0 {
        println!("no records in range");
        return Ok(());
    }

    let first_id = set.first_record_id();
    let mut i = 0u64;
    while i < set.size() {
        let record = set.record(i)?;
        println!("{},{}", first_id + i, record.render(","));
        i += VIEW_PRINT_STRIDE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_tokens_parse_case_insensitively() {
        assert_eq!(parse_field_kind("double").unwrap(), FieldKind::Double);
        assert_eq!(parse_field_kind("INT32").unwrap(), FieldKind::Int32);
        assert_eq!(parse_field_kind("Int8").unwrap(), FieldKind::Int8);
        assert_eq!(parse_field_kind("string(12)").unwrap(), FieldKind::String(12));
        assert!(parse_field_kind("string(0)").is_err());
        assert!(parse_field_kind("blob").is_err());
    }

    #[test]
    fn cli_timestamps_accept_both_forms() {
        assert_eq!(
            parse_cli_timestamp("1970-01-01T00:00:01.000").unwrap(),
            1000
        );
        assert_eq!(parse_cli_timestamp("19700101T000001").unwrap(), 1000);
        assert!(parse_cli_timestamp("junk").is_err());
    }
}
