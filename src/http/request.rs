//! Request head parsing and the editable proxy request.
//!
//! # Responsibilities
//! - Parse the raw request line and headers supplied by the host
//! - Expose routing-relevant information (method, path, host)
//! - Provide a mutable copy that handlers edit before forwarding
//!
//! # Design Decisions
//! - The original head is immutable; edits go to `ProxyRequest`
//! - Leading empty lines before the request line are tolerated

use std::str::FromStr;

use hyper::{Method, Uri, Version};

use crate::error::ParseError;
use crate::http::HeaderBlock;

/// The inbound request line and headers, as received by the host.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderBlock,
}

impl RequestHead {
    /// Parse a CRLF-delimited request line followed by header lines.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut lines = raw.lines().skip_while(|line| line.is_empty());
        let request_line = lines.next().ok_or(ParseError::Empty)?;

        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::RequestLine(request_line.to_string()));
        };

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ParseError::Method(method.to_string()))?;
        let uri = Uri::from_str(target).map_err(|_| ParseError::Target(target.to_string()))?;
        let version = parse_version(version)?;
        let headers = HeaderBlock::parse_lines(lines)?;

        Ok(Self {
            method,
            uri,
            version,
            headers,
        })
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Host from the `Host` header, falling back to an absolute-form target.
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get("host")
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers.get("content-length")?.parse().ok()
    }
}

fn parse_version(version: &str) -> Result<Version, ParseError> {
    match version {
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Ok(Version::HTTP_2),
        other => Err(ParseError::Version(other.to_string())),
    }
}

/// The request the host should send to the target, as edited by the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderBlock,
    /// Override for the target base URL; `None` keeps the host's default.
    pub target: Option<String>,
}

impl ProxyRequest {
    /// Start from an unmodified copy of the inbound request.
    pub fn from_head(head: &RequestHead) -> Self {
        Self {
            method: head.method.clone(),
            uri: head.uri.clone(),
            headers: head.headers.clone(),
            target: None,
        }
    }

    /// Replace the request target, e.g. to rewrite the path.
    pub fn set_uri(&mut self, target: &str) -> Result<(), ParseError> {
        self.uri = Uri::from_str(target).map_err(|_| ParseError::Target(target.to_string()))?;
        Ok(())
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = Some(target.into());
    }
}
