//! Shared utilities for integration and load testing.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Notify;

use proxy_bridge::config::{BridgeConfig, RuntimeConfig};
use proxy_bridge::http::DirectResponse;
use proxy_bridge::{Bridge, Command, HandlerError, RequestContext, RequestHandler, SessionId};

/// Bridge with the test handler installed and a small worker pool.
pub fn test_bridge() -> Bridge {
    let mut config = BridgeConfig {
        runtime: RuntimeConfig {
            worker_threads: 2,
            ..RuntimeConfig::default()
        },
        ..BridgeConfig::default()
    };
    config.handler.install_test_handler = true;
    Bridge::new(config).unwrap()
}

/// Blocking-poll until `Done` and return everything received, `Done` included.
pub fn drain(bridge: &Bridge, id: SessionId) -> Vec<Command> {
    let mut commands = Vec::new();
    while let Some(command) = bridge.poll_session(id, true).unwrap() {
        let done = command.is_terminal();
        commands.push(command);
        if done {
            break;
        }
    }
    commands
}

/// Build a raw request head.
pub fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> String {
    let mut raw = format!("{} {} HTTP/1.1\r\nHost: localhost\r\n", method, path);
    for (name, value) in headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str("\r\n");
    raw
}

/// Create and start a session.
pub fn start(bridge: &Bridge, raw: &str) -> SessionId {
    let id = bridge.create_session().unwrap();
    bridge.start_session(id, raw).unwrap();
    id
}

/// Handler that answers only after the test releases it.
#[allow(dead_code)]
pub struct GatedHandler {
    pub gate: Arc<Notify>,
}

impl RequestHandler for GatedHandler {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), HandlerError>> {
        async move {
            self.gate.notified().await;
            ctx.respond(DirectResponse::text(200, "released")?)
        }
        .boxed()
    }

    fn name(&self) -> &str {
        "gated"
    }
}
