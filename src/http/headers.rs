//! Ordered, case-preserving header block.
//!
//! # Design Decisions
//! - Names keep the casing the host sent; lookups are case-insensitive
//! - Duplicate names are kept in arrival order
//! - Names and values are validated with the `http` grammar on insert

use std::fmt;

use hyper::header::{HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::ParseError;

/// A list of header fields as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderBlock {
    entries: Vec<(String, String)>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a CRLF-delimited header block. Parsing stops at the first empty line.
    pub fn parse(block: &str) -> Result<Self, ParseError> {
        Self::parse_lines(block.lines())
    }

    pub(crate) fn parse_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Self, ParseError> {
        let mut headers = Self::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            // Obsolete line folding is rejected
            if line.starts_with([' ', '\t']) {
                return Err(ParseError::HeaderLine(line.to_string()));
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::HeaderLine(line.to_string()))?;
            headers.append(name, value.trim())?;
        }
        Ok(headers)
    }

    /// Append a field, keeping any existing fields with the same name.
    pub fn append(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ParseError> {
        let name = name.into();
        let value = value.into();
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ParseError::HeaderName(name.clone()))?;
        HeaderValue::from_str(&value).map_err(|_| ParseError::HeaderValue(name.clone()))?;
        self.entries.push((name, value));
        Ok(())
    }

    /// Replace every field named `name` with a single field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<(), ParseError> {
        let name = name.into();
        let value = value.into();
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ParseError::HeaderName(name.clone()))?;
        HeaderValue::from_str(&value).map_err(|_| ParseError::HeaderValue(name.clone()))?;
        self.remove(&name);
        self.entries.push((name, value));
        Ok(())
    }

    /// Remove every field named `name`, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `Name: value\r\n` lines, without the terminating empty line.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HeaderBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}
