//! # Delimited-Text Parsing
//!
//! The import pipeline that turns delimited text lines into records:
//!
//! ```text
//! line ──tokenize──> tokens ──TokenFilters──> (keep?) ──FieldParsers──> record
//! ```
//!
//! [`TokenFilter`]s run first and are cheap: a filter that evaluates true
//! excludes the row before any field parsing is attempted, so unsuitable
//! rows (wrong instrument, header lines) cost almost nothing.
//!
//! [`FieldParser`]s run second, in the order they were added, each
//! consuming one or more tokens and writing one schema field through a
//! typed cell.
//!
//! ## Tokenizers
//!
//! Two tokenizers are available on [`RecordParser`]:
//!
//! - **simple** (`set_simple_parse(true)`): splits on any delimiter
//!   character, keeping empty tokens. No quoting, no escapes. Fast path
//!   for well-behaved CSV.
//! - **quoted** (default): understands configurable quote characters and
//!   a backslash-style escape character (`\<delim>` → literal delimiter,
//!   `\"` → literal quote, `\\` → backslash, `\n` → newline).

mod field;

pub use field::FieldParser;

use eyre::{bail, ensure, Result};

use crate::records::Record;
use crate::schema::SchemaRef;

/// Comparison operator for a [`TokenFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    EqualTo,
    NotEqualTo,
}

/// Excludes rows by comparing joined tokens against a constant string.
///
/// The selected token indices are joined with single spaces and compared
/// with the configured operator; a row whose filter evaluates *true* is
/// excluded from parsing.
#[derive(Debug, Clone)]
pub struct TokenFilter {
    apply_to_tokens: Vec<usize>,
    compare_operator: Comparison,
    compare_to: String,
}

impl TokenFilter {
    pub fn new(
        apply_to_tokens: Vec<usize>,
        compare_operator: Comparison,
        compare_to: impl Into<String>,
    ) -> Result<Self> {
        ensure!(
            !apply_to_tokens.is_empty(),
            "no tokens specified for the filter to use"
        );
        Ok(Self {
            apply_to_tokens,
            compare_operator,
            compare_to: compare_to.into(),
        })
    }

    /// Evaluates the filter. Errors when the row has too few tokens.
    pub fn evaluate(&self, tokens: &[String]) -> Result<bool> {
        let mut joined = String::new();
        for (i, &token_idx) in self.apply_to_tokens.iter().enumerate() {
            let Some(token) = tokens.get(token_idx) else {
                bail!(
                    "not enough tokens in row to evaluate filter (wanted token {}, row has {})",
                    token_idx,
                    tokens.len()
                );
            };
            if i > 0 {
                joined.push(' ');
            }
            joined.push_str(token);
        }

        Ok(match self.compare_operator {
            Comparison::EqualTo => joined == self.compare_to,
            Comparison::NotEqualTo => joined != self.compare_to,
        })
    }
}

/// Parses one line (or one token row) into a record under a schema.
#[derive(Debug)]
pub struct RecordParser {
    schema: SchemaRef,
    field_parsers: Vec<FieldParser>,
    token_filters: Vec<TokenFilter>,
    delimiters: String,
    escape_chars: String,
    quote_chars: String,
    simple_parse: bool,
    tokenbuf: Vec<String>,
}

impl RecordParser {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            field_parsers: Vec::new(),
            token_filters: Vec::new(),
            delimiters: ",".to_string(),
            escape_chars: "\\".to_string(),
            quote_chars: "\"'".to_string(),
            simple_parse: false,
            tokenbuf: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Adds a field parser, binding it to its schema field by name.
    /// Parsers run in insertion order, after all filters.
    pub fn add_field_parser(&mut self, mut parser: FieldParser) -> Result<()> {
        parser.bind(&self.schema)?;
        self.field_parsers.push(parser);
        Ok(())
    }

    /// Adds a token filter. Filters run in insertion order, before any
    /// field parser.
    pub fn add_token_filter(&mut self, filter: TokenFilter) {
        self.token_filters.push(filter);
    }

    /// Any character of `delimiters` splits tokens. Default: comma.
    pub fn set_delimiter(&mut self, delimiters: impl Into<String>) {
        self.delimiters = delimiters.into();
    }

    /// Escape characters for the quoted tokenizer. Empty disables
    /// escaping. Default: backslash.
    pub fn set_escape_character(&mut self, escape_chars: impl Into<String>) {
        self.escape_chars = escape_chars.into();
    }

    /// Quote characters for the quoted tokenizer. Empty treats quotes as
    /// ordinary characters. Default: double and single quotes.
    pub fn set_quote_character(&mut self, quote_chars: impl Into<String>) {
        self.quote_chars = quote_chars.into();
    }

    /// Switches between the simple splitter and the quoted tokenizer.
    pub fn set_simple_parse(&mut self, simple_parse: bool) {
        self.simple_parse = simple_parse;
    }

    /// Parses a token row into `record`. Returns `false` (without
    /// touching the record) when a filter excluded the row.
    pub fn parse_tokens(&self, tokens: &[String], record: &Record) -> Result<bool> {
        for filter in &self.token_filters {
            if filter.evaluate(tokens)? {
                return Ok(false);
            }
        }

        record.zero();
        for parser in &self.field_parsers {
            parser.write(tokens, record)?;
        }
        Ok(true)
    }

    /// Tokenizes a line and parses it into `record`. Returns `false` when
    /// a filter excluded the row.
    pub fn parse_line(&mut self, line: &str, record: &Record) -> Result<bool> {
        if self.simple_parse {
            simple_tokenize(line, &self.delimiters, &mut self.tokenbuf);
        } else {
            quoted_tokenize(
                line,
                &self.delimiters,
                &self.escape_chars,
                &self.quote_chars,
                &mut self.tokenbuf,
            )?;
        }
        let tokens = std::mem::take(&mut self.tokenbuf);
        let parsed = self.parse_tokens(&tokens, record);
        self.tokenbuf = tokens;
        parsed
    }

    /// Trims leading and trailing spaces in place.
    pub fn trim(s: &mut String) {
        let trimmed = s.trim().to_string();
        *s = trimmed;
    }
}

/// Splits on any delimiter character, keeping empty tokens.
fn simple_tokenize(line: &str, delimiters: &str, out: &mut Vec<String>) {
    out.clear();
    let mut current = String::new();
    for c in line.chars() {
        if delimiters.contains(c) {
            out.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    out.push(current);
}

/// Splits on delimiters outside quotes, honoring escape characters.
fn quoted_tokenize(
    line: &str,
    delimiters: &str,
    escape_chars: &str,
    quote_chars: &str,
    out: &mut Vec<String>,
) -> Result<()> {
    out.clear();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if escape_chars.contains(c) {
            let Some(next) = chars.next() else {
                bail!("dangling escape character at end of line");
            };
            // An escaped 'n' is a newline; anything else stands for itself.
            current.push(if next == 'n' { '\n' } else { next });
            continue;
        }

        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => current.push(c),
            None if quote_chars.contains(c) => in_quote = Some(c),
            None if delimiters.contains(c) => out.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }

    ensure!(in_quote.is_none(), "unterminated quote in line");
    out.push(std::mem::take(&mut current));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldKind, Schema};
    use std::rc::Rc;

    fn tokenize_simple(line: &str) -> Vec<String> {
        let mut out = Vec::new();
        simple_tokenize(line, ",", &mut out);
        out
    }

    fn tokenize_quoted(line: &str) -> Vec<String> {
        let mut out = Vec::new();
        quoted_tokenize(line, ",", "\\", "\"'", &mut out).unwrap();
        out
    }

    #[test]
    fn simple_tokenizer_keeps_empty_tokens() {
        assert_eq!(tokenize_simple("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(tokenize_simple("a,,c"), vec!["a", "", "c"]);
        assert_eq!(tokenize_simple(",a,"), vec!["", "a", ""]);
        assert_eq!(tokenize_simple(""), vec![""]);
    }

    #[test]
    fn quoted_tokenizer_honors_quotes_and_escapes() {
        assert_eq!(
            tokenize_quoted("Token 1,\"Token 2, with comma\",Token 3"),
            vec!["Token 1", "Token 2, with comma", "Token 3"]
        );
        assert_eq!(
            tokenize_quoted("a,b with \\\"embedded quote\\\",c"),
            vec!["a", "b with \"embedded quote\"", "c"]
        );
        assert_eq!(tokenize_quoted("a,b with \\n newline"), vec![
            "a",
            "b with \n newline"
        ]);
        assert_eq!(tokenize_quoted("a\\\\b"), vec!["a\\b"]);
        assert_eq!(tokenize_quoted("'single, quoted'"), vec!["single, quoted"]);
    }

    #[test]
    fn quoted_tokenizer_rejects_malformed_lines() {
        let mut out = Vec::new();
        assert!(quoted_tokenize("\"open", ",", "\\", "\"'", &mut out).is_err());
        assert!(quoted_tokenize("trailing\\", ",", "\\", "\"'", &mut out).is_err());
    }

    #[test]
    fn filters_join_and_compare() {
        let tokens: Vec<String> = ["2010/01/01", "01:01:01.100", "USD/JPY", "87.56"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let ne = TokenFilter::new(vec![2], Comparison::NotEqualTo, "USD/JPY").unwrap();
        assert!(!ne.evaluate(&tokens).unwrap());

        let eq = TokenFilter::new(vec![2], Comparison::EqualTo, "USD/JPY").unwrap();
        assert!(eq.evaluate(&tokens).unwrap());

        let joined = TokenFilter::new(vec![0, 1], Comparison::EqualTo, "2010/01/01 01:01:01.100")
            .unwrap();
        assert!(joined.evaluate(&tokens).unwrap());

        assert!(TokenFilter::new(vec![], Comparison::EqualTo, "x").is_err());
        assert!(ne.evaluate(&tokens[..2].to_vec()).is_err());
    }

    #[test]
    fn parse_line_end_to_end() {
        let schema = Rc::new(Schema::new(
            vec![
                Field::new("_TSDB_timestamp", FieldKind::Timestamp),
                Field::new("price", FieldKind::Double),
                Field::new("amount", FieldKind::Int32),
                Field::new("side", FieldKind::Int8),
            ],
            true,
        ));

        let mut parser = RecordParser::new(schema.clone());
        parser
            .add_field_parser(FieldParser::timestamp(
                vec![0, 1],
                "%Y/%m/%d %H:%M:%S%F",
                "_TSDB_timestamp",
            ))
            .unwrap();
        parser
            .add_field_parser(FieldParser::double(3, "price"))
            .unwrap();
        parser
            .add_field_parser(FieldParser::int32(4, "amount"))
            .unwrap();
        parser
            .add_field_parser(FieldParser::int8(5, "side"))
            .unwrap();
        parser.add_token_filter(
            TokenFilter::new(vec![2], Comparison::NotEqualTo, "USD/JPY").unwrap(),
        );

        let record = Record::free(schema);

        let kept = parser
            .parse_line("2010/01/01,01:01:01.100,USD/JPY,87.56,5,0", &record)
            .unwrap();
        assert!(kept);
        assert_eq!(record.cell(1).to_double().unwrap(), 87.56);
        assert_eq!(record.cell(2).to_int32().unwrap(), 5);
        assert_eq!(record.cell(3).to_int8().unwrap(), 0);
        assert_eq!(
            record.cell(0).to_string_value(),
            "2010-01-01T01:01:01.100"
        );

        // A row for another instrument is filtered, not parsed.
        let kept = parser
            .parse_line("2010/01/01,01:01:01.100,EUR/USD,1.56,1,0", &record)
            .unwrap();
        assert!(!kept);

        // A malformed row surfaces a parse error.
        assert!(parser
            .parse_line("garbage,line,USD/JPY,not-a-number,5,0", &record)
            .is_err());
    }

    #[test]
    fn unknown_field_name_fails_at_bind_time() {
        let schema = Rc::new(Schema::new(
            vec![Field::new("_TSDB_timestamp", FieldKind::Timestamp)],
            true,
        ));
        let mut parser = RecordParser::new(schema);
        assert!(parser
            .add_field_parser(FieldParser::double(0, "missing"))
            .is_err());
    }
}
