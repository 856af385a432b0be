//! Direct responses built by handlers.
//!
//! # Responsibilities
//! - Describe a response that bypasses the target entirely
//! - Fill in `Content-Length` when the handler did not
//! - Lower the response into `SendHeaders` + `SendBody` commands

use hyper::body::Bytes;
use hyper::StatusCode;

use crate::command::Command;
use crate::error::HandlerError;
use crate::http::HeaderBlock;

/// A response produced by the handler itself.
#[derive(Debug, Clone)]
pub struct DirectResponse {
    status: StatusCode,
    headers: HeaderBlock,
    body: Bytes,
}

impl DirectResponse {
    pub fn new(status: u16) -> Result<Self, HandlerError> {
        let status = StatusCode::from_u16(status).map_err(|_| HandlerError::InvalidStatus(status))?;
        Ok(Self {
            status,
            headers: HeaderBlock::new(),
            body: Bytes::new(),
        })
    }

    /// Plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Result<Self, HandlerError> {
        let body: String = body.into();
        Ok(Self::new(status)?
            .header("Content-Type", "text/plain; charset=utf-8")?
            .body(body))
    }

    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HandlerError> {
        self.headers.append(name, value)?;
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderBlock {
        &self.headers
    }

    /// 1xx, 204 and 304 responses never carry a `Content-Length`.
    fn allows_length(&self) -> bool {
        !(self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED)
    }

    pub(crate) fn into_commands(mut self) -> Result<Vec<Command>, HandlerError> {
        if self.allows_length()
            && !self.headers.contains("content-length")
            && !self.headers.contains("transfer-encoding")
        {
            self.headers.append("Content-Length", self.body.len().to_string())?;
        }

        let mut commands = vec![Command::SendHeaders {
            status: self.status.as_u16(),
            headers: self.headers,
        }];
        if !self.body.is_empty() {
            commands.push(Command::SendBody { data: self.body });
        }
        Ok(commands)
    }
}
