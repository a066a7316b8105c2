//! # String Attribute Blocks
//!
//! Every table file carries a set of named string attributes (`TITLE`,
//! `FIELD_<i>_NAME`, `FIELD_<i>_TYPE`, `FIELD_<i>_OFFSET`) serialized
//! into the header region after the fixed header. The block is the
//! authoritative schema source when a table is reopened.
//!
//! ## Encoding
//!
//! ```text
//! u32  attribute count
//! per attribute:
//!   u16 key length   | key bytes (UTF-8)
//!   u16 value length | value bytes (UTF-8)
//! ```
//!
//! Little-endian throughout. Attribute order is insertion order; `set`
//! replaces in place so reopening a table observes a stable layout.

use eyre::{bail, ensure, Result};

use crate::config::ATTR_REGION_SIZE;

/// An ordered set of named string attributes.
#[derive(Debug, Clone, Default)]
pub struct AttrBlock {
    attrs: Vec<(String, String)>,
}

impl AttrBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Inserts or replaces an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes the block. Fails if it would not fit in the header
    /// region.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.attrs.len() as u32).to_le_bytes());
        for (key, value) in &self.attrs {
            ensure!(
                key.len() <= u16::MAX as usize && value.len() <= u16::MAX as usize,
                "attribute '{}' too large to encode",
                key
            );
            out.extend_from_slice(&(key.len() as u16).to_le_bytes());
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(&(value.len() as u16).to_le_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        ensure!(
            out.len() <= ATTR_REGION_SIZE,
            "attribute block of {} bytes exceeds the {} bytes available in the header region",
            out.len(),
            ATTR_REGION_SIZE
        );
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let count = read_u32(bytes, &mut pos)? as usize;
        let mut attrs = Vec::with_capacity(count);
        for _ in 0..count {
            let key = read_string(bytes, &mut pos)?;
            let value = read_string(bytes, &mut pos)?;
            attrs.push((key, value));
        }
        Ok(Self { attrs })
    }
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    ensure!(
        *pos + 4 <= bytes.len(),
        "truncated attribute block at offset {}",
        *pos
    );
    let value = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(value)
}

fn read_string(bytes: &[u8], pos: &mut usize) -> Result<String> {
    ensure!(
        *pos + 2 <= bytes.len(),
        "truncated attribute block at offset {}",
        *pos
    );
    let len = u16::from_le_bytes(bytes[*pos..*pos + 2].try_into().unwrap()) as usize;
    *pos += 2;
    ensure!(
        *pos + len <= bytes.len(),
        "truncated attribute block at offset {}",
        *pos
    );
    let s = match std::str::from_utf8(&bytes[*pos..*pos + len]) {
        Ok(s) => s.to_string(),
        Err(e) => bail!("attribute block contains invalid UTF-8: {}", e),
    };
    *pos += len;
    Ok(s)
}
