//! # Field Parsers
//!
//! One parser per schema field: each consumes one or more tokens from a
//! tokenized row and writes the parsed value through a typed cell. A
//! parser is bound to its field index once, when added to a
//! [`RecordParser`](crate::parsing::RecordParser), so row-rate parsing
//! never pays a name lookup.
//!
//! Timestamp parsers can join several tokens (a date column and a time
//! column, say) with spaces before parsing under a strptime-subset format
//! string. String parsers join the same way. Everything else consumes
//! exactly one token.

use eyre::{ensure, Result};

use crate::datetime::parse_timestamp_format;
use crate::records::Record;
use crate::schema::Schema;

#[derive(Debug, Clone)]
enum ParserKind {
    Timestamp { tokens: Vec<usize>, format: String },
    Double { token: usize },
    Int32 { token: usize },
    Int8 { token: usize },
    Char { token: usize },
    Str { tokens: Vec<usize> },
}

/// Parses one or more tokens into one schema field.
#[derive(Debug, Clone)]
pub struct FieldParser {
    kind: ParserKind,
    field_name: String,
    field_id: Option<usize>,
}

impl FieldParser {
    /// Joins the given tokens with spaces and parses them as a timestamp
    /// under `format` (interpreted as UTC, no leap seconds).
    pub fn timestamp(
        tokens: Vec<usize>,
        format: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            kind: ParserKind::Timestamp {
                tokens,
                format: format.into(),
            },
            field_name: field_name.into(),
            field_id: None,
        }
    }

    pub fn double(token: usize, field_name: impl Into<String>) -> Self {
        Self {
            kind: ParserKind::Double { token },
            field_name: field_name.into(),
            field_id: None,
        }
    }

    pub fn int32(token: usize, field_name: impl Into<String>) -> Self {
        Self {
            kind: ParserKind::Int32 { token },
            field_name: field_name.into(),
            field_id: None,
        }
    }

    pub fn int8(token: usize, field_name: impl Into<String>) -> Self {
        Self {
            kind: ParserKind::Int8 { token },
            field_name: field_name.into(),
            field_id: None,
        }
    }

    pub fn char(token: usize, field_name: impl Into<String>) -> Self {
        Self {
            kind: ParserKind::Char { token },
            field_name: field_name.into(),
            field_id: None,
        }
    }

    /// Joins the given tokens with spaces into a fixed-width string field.
    pub fn string(tokens: Vec<usize>, field_name: impl Into<String>) -> Self {
        Self {
            kind: ParserKind::Str { tokens },
            field_name: field_name.into(),
            field_id: None,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Resolves the field name against the schema. Fails (and leaves the
    /// parser unbound) when the field does not exist.
    pub(crate) fn bind(&mut self, schema: &Schema) -> Result<()> {
        self.field_id = Some(schema.index_by_name(&self.field_name)?);
        Ok(())
    }

    fn token<'a>(tokens: &'a [String], i: usize) -> Result<&'a str> {
        ensure!(
            i < tokens.len(),
            "row has {} tokens but the parser wants token {}",
            tokens.len(),
            i
        );
        Ok(&tokens[i])
    }

    fn join_tokens(tokens: &[String], indices: &[usize]) -> Result<String> {
        let mut joined = String::new();
        for (n, &i) in indices.iter().enumerate() {
            if n > 0 {
                joined.push(' ');
            }
            joined.push_str(Self::token(tokens, i)?);
        }
        Ok(joined)
    }

    /// Parses this parser's tokens out of the row and writes the value
    /// into the bound field of `record`.
    pub(crate) fn write(&self, tokens: &[String], record: &Record) -> Result<()> {
        let field_id = match self.field_id {
            Some(id) => id,
            None => eyre::bail!("field parser for '{}' is not bound", self.field_name),
        };
        let cell = record.cell(field_id);

        match &self.kind {
            ParserKind::Timestamp { tokens: idx, format } => {
                let joined = Self::join_tokens(tokens, idx)?;
                let ts = parse_timestamp_format(joined.trim(), format)?;
                cell.set_i64(ts)?;
            }
            ParserKind::Double { token } => {
                cell.set_str(Self::token(tokens, *token)?)?;
            }
            ParserKind::Int32 { token } => {
                cell.set_str(Self::token(tokens, *token)?)?;
            }
            ParserKind::Int8 { token } => {
                cell.set_str(Self::token(tokens, *token)?)?;
            }
            ParserKind::Char { token } => {
                cell.set_str(Self::token(tokens, *token)?)?;
            }
            ParserKind::Str { tokens: idx } => {
                let joined = Self::join_tokens(tokens, idx)?;
                cell.set_str(&joined)?;
            }
        }
        Ok(())
    }
}
