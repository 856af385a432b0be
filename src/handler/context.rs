//! Request context handed to handler code.
//!
//! # Responsibilities
//! - Read-only view of the inbound request head
//! - Mutable proxy request the handler may edit before forwarding
//! - Direct responses that bypass the target
//! - One-shot header/body filter installation
//! - Ordered streaming of the inbound body
//!
//! Every decision turns into commands on the session queue; the context
//! never touches the network.

use std::sync::Arc;

use hyper::body::Bytes;
use uuid::Uuid;

use crate::command::Command;
use crate::error::HandlerError;
use crate::http::{DirectResponse, HeaderBlock, ProxyRequest, RequestHead};
use crate::session::request_session::BodyReceiver;
use crate::session::{BodyChunk, RequestSession, SessionId};

pub struct RequestContext {
    session: Arc<RequestSession>,
    head: RequestHead,
    proxy: ProxyRequest,
    body: Option<BodyReceiver>,
    body_complete: bool,
}

impl RequestContext {
    pub(crate) fn new(session: Arc<RequestSession>, head: RequestHead, body: Option<BodyReceiver>) -> Self {
        let proxy = ProxyRequest::from_head(&head);
        Self {
            session,
            head,
            proxy,
            body,
            body_complete: false,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    pub fn trace_id(&self) -> Uuid {
        self.session.trace_id()
    }

    /// The request as received by the host.
    pub fn request(&self) -> &RequestHead {
        &self.head
    }

    pub fn proxy_request(&self) -> &ProxyRequest {
        &self.proxy
    }

    pub fn proxy_request_mut(&mut self) -> &mut ProxyRequest {
        &mut self.proxy
    }

    /// True once the host has freed the session. Further output is discarded.
    pub fn is_cancelled(&self) -> bool {
        self.session.is_freed()
    }

    /// Answer the client directly; the target is never contacted.
    pub fn respond(&mut self, response: DirectResponse) -> Result<(), HandlerError> {
        let commands = response.into_commands()?;
        self.session.mark_decided()?;
        for command in commands {
            self.session.emit(command);
        }
        Ok(())
    }

    /// Forward the current proxy request to the target.
    pub fn forward(&mut self) -> Result<(), HandlerError> {
        self.session.mark_decided()?;
        self.session.emit(Command::Proxy(self.proxy.clone()));
        Ok(())
    }

    /// Install the header filter. Must happen before the request is forwarded.
    pub fn set_header_filter<F>(&mut self, filter: F) -> Result<(), HandlerError>
    where
        F: Fn(&HeaderBlock) -> Option<HeaderBlock> + Send + Sync + 'static,
    {
        if self.session.is_decided() {
            return Err(HandlerError::AlreadyDecided);
        }
        self.session.install_header_filter(Arc::new(filter))?;
        self.session.emit(Command::FilterHeaders);
        Ok(())
    }

    /// Install the body filter. Must happen before the request is forwarded.
    ///
    /// Only chunks passed to `transform_body` after installation are affected.
    pub fn set_body_filter<F>(&mut self, filter: F) -> Result<(), HandlerError>
    where
        F: Fn(&[u8], bool) -> Option<Bytes> + Send + Sync + 'static,
    {
        if self.session.is_decided() {
            return Err(HandlerError::AlreadyDecided);
        }
        self.session.install_body_filter(Arc::new(filter))?;
        self.session.emit(Command::FilterBody);
        Ok(())
    }

    /// Next inbound body chunk, or `None` once the body is complete.
    ///
    /// The first call asks the host to start streaming with `ReadBody`.
    pub async fn read_body_chunk(&mut self) -> Option<BodyChunk> {
        if self.body_complete {
            return None;
        }
        if self.session.first_body_request() {
            self.session.emit(Command::ReadBody);
        }

        let chunk = match self.body.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        match chunk {
            Some(chunk) => {
                self.body_complete = chunk.last;
                Some(chunk)
            }
            // Sender dropped: session freed
            None => {
                self.body_complete = true;
                None
            }
        }
    }

    /// Read the remaining body into one buffer.
    pub async fn read_body(&mut self) -> Bytes {
        let mut body = Vec::new();
        while let Some(chunk) = self.read_body_chunk().await {
            body.extend_from_slice(&chunk.data);
        }
        Bytes::from(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(raw: &str) -> (Arc<RequestSession>, RequestContext) {
        let session = Arc::new(RequestSession::new(SessionId::from_raw(9)));
        session.begin().unwrap();
        let body = session.take_body_receiver();
        let head = RequestHead::parse(raw).unwrap();
        (session.clone(), RequestContext::new(session, head, body))
    }

    #[tokio::test]
    async fn test_read_body_in_order() {
        let (session, mut ctx) = context("POST /upload HTTP/1.1\r\n");
        session.send_body(false, Bytes::from_static(b"one,")).unwrap();
        session.send_body(false, Bytes::from_static(b"two,")).unwrap();
        session.send_body(true, Bytes::from_static(b"three")).unwrap();

        assert_eq!(ctx.read_body().await, Bytes::from_static(b"one,two,three"));
        assert!(ctx.read_body_chunk().await.is_none());

        // ReadBody emitted exactly once
        assert_eq!(session.poll(false), Some(Command::ReadBody));
        assert_eq!(session.poll(false), None);
    }

    #[tokio::test]
    async fn test_body_ends_on_teardown() {
        let (session, mut ctx) = context("POST /upload HTTP/1.1\r\n");
        session.send_body(false, Bytes::from_static(b"partial")).unwrap();
        session.teardown();

        let first = ctx.read_body_chunk().await.unwrap();
        assert_eq!(first.data, Bytes::from_static(b"partial"));
        assert!(ctx.read_body_chunk().await.is_none());
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_single_decision() {
        let (session, mut ctx) = context("GET / HTTP/1.1\r\n");
        ctx.respond(DirectResponse::text(200, "ok").unwrap()).unwrap();
        assert!(matches!(ctx.forward(), Err(HandlerError::AlreadyDecided)));
        assert!(matches!(
            ctx.respond(DirectResponse::new(500).unwrap()),
            Err(HandlerError::AlreadyDecided)
        ));

        assert!(matches!(session.poll(false), Some(Command::SendHeaders { status: 200, .. })));
        assert!(matches!(session.poll(false), Some(Command::SendBody { .. })));
        assert_eq!(session.poll(false), None);
    }

    #[test]
    fn test_forward_carries_edits() {
        let (session, mut ctx) = context("GET /a HTTP/1.1\r\nHost: example.com\r\n");
        ctx.proxy_request_mut().headers.append("X-Extra", "1").unwrap();
        ctx.proxy_request_mut().set_uri("/b").unwrap();
        ctx.forward().unwrap();

        match session.poll(false) {
            Some(Command::Proxy(request)) => {
                assert_eq!(request.uri.path(), "/b");
                assert_eq!(request.headers.get("x-extra"), Some("1"));
                assert_eq!(request.headers.get("host"), Some("example.com"));
            }
            other => panic!("expected proxy command, got {other:?}"),
        }
        assert_eq!(ctx.request().path(), "/a");
    }

    #[test]
    fn test_filters_before_forward_only() {
        let (session, mut ctx) = context("GET / HTTP/1.1\r\n");
        ctx.set_header_filter(|h| Some(h.clone())).unwrap();
        assert!(matches!(
            ctx.set_header_filter(|_| None),
            Err(HandlerError::FilterInstalled("header"))
        ));
        ctx.forward().unwrap();
        assert!(matches!(
            ctx.set_body_filter(|_, _| None),
            Err(HandlerError::AlreadyDecided)
        ));

        assert_eq!(session.poll(false), Some(Command::FilterHeaders));
        assert!(matches!(session.poll(false), Some(Command::Proxy(_))));
    }
}
