//! Header and body filters installed by handlers.
//!
//! Filters run synchronously on the host's thread when it calls
//! `transform_headers` / `transform_body`. A filter returning `None`, or
//! returning its input unchanged, leaves the data untouched.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use hyper::body::Bytes;

use crate::http::HeaderBlock;
use crate::observability::metrics;

/// Rewrites the target's response headers.
pub type HeaderFilter = Arc<dyn Fn(&HeaderBlock) -> Option<HeaderBlock> + Send + Sync>;

/// Rewrites one chunk of the target's response body. The flag marks the last chunk.
pub type BodyFilter = Arc<dyn Fn(&[u8], bool) -> Option<Bytes> + Send + Sync>;

/// Run a header filter, treating a panic as "unchanged".
pub(crate) fn apply_header_filter(filter: &HeaderFilter, headers: &HeaderBlock) -> Option<HeaderBlock> {
    match catch_unwind(AssertUnwindSafe(|| filter(headers))) {
        Ok(Some(out)) if out != *headers => Some(out),
        Ok(_) => None,
        Err(_) => {
            tracing::warn!("Header filter panicked, headers left unchanged");
            metrics::record_handler_fault("filter_panic");
            None
        }
    }
}

/// Run a body filter, treating a panic as "unchanged".
pub(crate) fn apply_body_filter(filter: &BodyFilter, chunk: &[u8], last: bool) -> Option<Bytes> {
    match catch_unwind(AssertUnwindSafe(|| filter(chunk, last))) {
        Ok(Some(out)) if out.as_ref() != chunk => Some(out),
        Ok(_) => None,
        Err(_) => {
            tracing::warn!(len = chunk.len(), "Body filter panicked, chunk left unchanged");
            metrics::record_handler_fault("filter_panic");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_filter_outcomes() {
        let input = HeaderBlock::parse("X-Orig: 1\r\n").unwrap();

        let append: HeaderFilter = Arc::new(|h: &HeaderBlock| {
            let mut out = h.clone();
            out.append("X-Added", "yes").ok()?;
            Some(out)
        });
        let out = apply_header_filter(&append, &input).unwrap();
        assert_eq!(out.get("x-orig"), Some("1"));
        assert_eq!(out.get("x-added"), Some("yes"));

        let identity: HeaderFilter = Arc::new(|h: &HeaderBlock| Some(h.clone()));
        assert!(apply_header_filter(&identity, &input).is_none());

        let panics: HeaderFilter = Arc::new(|_: &HeaderBlock| -> Option<HeaderBlock> { panic!("boom") });
        assert!(apply_header_filter(&panics, &input).is_none());
    }

    #[test]
    fn test_body_filter_outcomes() {
        let upper: BodyFilter =
            Arc::new(|chunk: &[u8], _: bool| Some(Bytes::from(chunk.to_ascii_uppercase())));
        assert_eq!(
            apply_body_filter(&upper, b"abc", false),
            Some(Bytes::from_static(b"ABC"))
        );
        assert!(apply_body_filter(&upper, b"ABC", true).is_none());

        let decline: BodyFilter = Arc::new(|_: &[u8], _: bool| -> Option<Bytes> { None });
        assert!(apply_body_filter(&decline, b"abc", false).is_none());
    }
}
