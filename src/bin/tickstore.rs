//! # Tickstore CLI Entry Point
//!
//! ```bash
//! # Create a store and a series with typed fields
//! tickstore create ./ticks.tsdb usdjpy double price int32 amount int8 side
//!
//! # Import a CSV into the series
//! tickstore import ./ticks.tsdb usdjpy quotes.csv \
//!     --timestamp-tokens 0,1 --timestamp-format "%Y/%m/%d %H:%M:%S%F" \
//!     --field-tokens 3,4,5 --skip-unless 2=USD/JPY
//!
//! # Print a sample of a timestamp range
//! tickstore view ./ticks.tsdb usdjpy 2010-01-01T00:00:00 2010-01-02T00:00:00
//! ```

use std::path::PathBuf;

use eyre::{bail, ensure, Result};

use tickstore::cli::{run_create, run_import, run_view, ImportOptions};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-v" => {
            println!("tickstore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "create" => run_create_args(&args[2..]),
        "import" => run_import_args(&args[2..]),
        "view" => run_view_args(&args[2..]),
        other => bail!("unknown command '{}'; try 'tickstore --help'", other),
    }
}

fn run_create_args(args: &[String]) -> Result<()> {
    if args.len() < 4 {
        bail!(
            "one or more fields required\n\
             Usage: tickstore create <store> <series> (<field type> <field name>)..."
        );
    }
    ensure!(
        (args.len() - 2) % 2 == 0,
        "each field must have a type and name\n\
         Usage: tickstore create <store> <series> (<field type> <field name>)..."
    );

    let store = PathBuf::from(&args[0]);
    let series = &args[1];
    let field_specs: Vec<(String, String)> = args[2..]
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();

    run_create(&store, series, &field_specs)
}

/// Parses a comma-separated list of token indices.
fn parse_token_list(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|t| {
            t.trim()
                .parse::<usize>()
                .map_err(|_| eyre::eyre!("bad token index '{}'", t))
        })
        .collect()
}

/// Parses a `TOKENS=VALUE` filter spec, e.g. `2=USD/JPY` or `0,1=x y`.
fn parse_filter_spec(s: &str) -> Result<(Vec<usize>, String)> {
    let Some((tokens, value)) = s.split_once('=') else {
        bail!("filter spec '{}' must look like TOKEN[,TOKEN...]=VALUE", s);
    };
    Ok((parse_token_list(tokens)?, value.to_string()))
}

/// The value following option `args[i]`, or an error naming the option.
fn option_value(args: &[String], i: usize) -> Result<&str> {
    match args.get(i + 1) {
        Some(value) => Ok(value),
        None => bail!("option '{}' needs a value", args[i]),
    }
}

fn run_import_args(args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!(
            "Usage: tickstore import <store> <series> <in-file> [options]\n\
             Options:\n\
             \x20   --delimiter <chars>          token delimiter(s), default ','\n\
             \x20   --simple                     fast splitter, no quotes/escapes\n\
             \x20   --timestamp-format <fmt>     default '%Y-%m-%dT%H:%M:%S%F'\n\
             \x20   --timestamp-tokens <list>    default '0'\n\
             \x20   --field-tokens <list>        tokens for the remaining fields\n\
             \x20   --skip-if <tokens=value>     skip rows where tokens match\n\
             \x20   --skip-unless <tokens=value> skip rows where tokens differ"
        );
    }

    let store = PathBuf::from(&args[0]);
    let series = &args[1];
    let input = PathBuf::from(&args[2]);

    let mut options = ImportOptions::default();
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--delimiter" => {
                options.delimiter = option_value(args, i)?.to_string();
                i += 2;
            }
            "--simple" => {
                options.simple = true;
                i += 1;
            }
            "--timestamp-format" => {
                options.timestamp_format = option_value(args, i)?.to_string();
                i += 2;
            }
            "--timestamp-tokens" => {
                options.timestamp_tokens = parse_token_list(option_value(args, i)?)?;
                i += 2;
            }
            "--field-tokens" => {
                options.field_tokens = Some(parse_token_list(option_value(args, i)?)?);
                i += 2;
            }
            "--skip-if" => {
                options.skip_if.push(parse_filter_spec(option_value(args, i)?)?);
                i += 2;
            }
            "--skip-unless" => {
                options
                    .skip_unless
                    .push(parse_filter_spec(option_value(args, i)?)?);
                i += 2;
            }
            other => bail!("unknown import option '{}'", other),
        }
    }
    ensure!(
        !options.timestamp_tokens.is_empty(),
        "--timestamp-tokens needs at least one token"
    );

    run_import(&store, series, &input, &options)
}

fn run_view_args(args: &[String]) -> Result<()> {
    if args.len() != 4 {
        bail!(
            "Usage: tickstore view <store> <series> <start> <end>\n\
             Timestamps: 2010-02-01T01:00:00[.fff] or 20100201T010000"
        );
    }
    run_view(&PathBuf::from(&args[0]), &args[1], &args[2], &args[3])
}

fn print_usage() {
    println!("tickstore - append-mostly, timestamp-ordered time-series store");
    println!();
    println!("USAGE:");
    println!("    tickstore <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    create <store> <series> (<type> <name>)...   Create a series");
    println!("    import <store> <series> <in-file> [options]  Import delimited text");
    println!("    view <store> <series> <start> <end>          Print a range sample");
    println!();
    println!("FIELD TYPES:");
    println!("    int8, int32, double, char, date, timestamp, record, string(N)");
    println!();
    println!("    A timestamp field named _TSDB_timestamp is prepended to every");
    println!("    series automatically and orders its records.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}
