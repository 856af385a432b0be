//! Failure injection: handler faults, filter panics, resource exhaustion.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use proxy_bridge::config::{BridgeConfig, RuntimeConfig};
use proxy_bridge::{Bridge, BridgeError, Command, HandlerError, RequestContext, RequestHandler};

mod common;

fn kinds(commands: &[Command]) -> Vec<&'static str> {
    commands.iter().map(Command::kind).collect()
}

#[test]
fn test_handler_error_yields_error_then_done() {
    let bridge = common::test_bridge();
    let id = common::start(&bridge, "GET /fail HTTP/1.1\r\n");

    let commands = common::drain(&bridge, id);
    assert_eq!(kinds(&commands), vec!["error", "done"]);
    assert!(matches!(&commands[0], Command::Error { message } if message.contains("test handler failure")));
}

#[test]
fn test_handler_panic_yields_error_then_done() {
    let bridge = common::test_bridge();
    let id = common::start(&bridge, "GET /panic HTTP/1.1\r\n");

    let commands = common::drain(&bridge, id);
    assert_eq!(kinds(&commands), vec!["error", "done"]);
    assert!(matches!(&commands[0], Command::Error { message } if message.contains("test handler panic")));

    // The runtime survives the panic
    let id = common::start(&bridge, "GET /hello HTTP/1.1\r\n");
    assert_eq!(common::drain(&bridge, id).last(), Some(&Command::Done));
}

struct DecidesTwice;

impl RequestHandler for DecidesTwice {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), HandlerError>> {
        async move {
            ctx.forward()?;
            ctx.forward()
        }
        .boxed()
    }
}

#[test]
fn test_second_decision_is_an_error() {
    let bridge = common::test_bridge();
    bridge.install_handler(DecidesTwice);
    let id = common::start(&bridge, "GET / HTTP/1.1\r\n");

    let commands = common::drain(&bridge, id);
    assert_eq!(kinds(&commands), vec!["proxy", "error", "done"]);
}

struct PanickingFilters;

impl RequestHandler for PanickingFilters {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), HandlerError>> {
        async move {
            ctx.set_header_filter(|_| panic!("header filter"))?;
            ctx.set_body_filter(|_, _| panic!("body filter"))?;
            // Second installation is refused
            assert!(matches!(
                ctx.set_header_filter(|_| None),
                Err(HandlerError::FilterInstalled("header"))
            ));
            ctx.forward()
        }
        .boxed()
    }
}

#[test]
fn test_filter_panic_leaves_data_unchanged() {
    let bridge = common::test_bridge();
    bridge.install_handler(PanickingFilters);
    let id = common::start(&bridge, "GET / HTTP/1.1\r\n");

    let commands = common::drain(&bridge, id);
    assert_eq!(kinds(&commands), vec!["filter_headers", "filter_body", "proxy", "done"]);

    assert_eq!(bridge.transform_headers(id, "X-Orig: 1\r\n").unwrap(), None);
    assert_eq!(bridge.transform_body(id, true, b"data").unwrap(), None);
}

#[test]
fn test_malformed_target_headers() {
    let bridge = common::test_bridge();
    let id = common::start(&bridge, "GET /transform-headers HTTP/1.1\r\n");
    common::drain(&bridge, id);

    assert!(matches!(
        bridge.transform_headers(id, "not a header\r\n"),
        Err(BridgeError::MalformedRequest(_))
    ));
}

#[test]
fn test_session_space_exhausted() {
    let mut config = BridgeConfig {
        runtime: RuntimeConfig {
            worker_threads: 1,
            ..RuntimeConfig::default()
        },
        ..BridgeConfig::default()
    };
    config.sessions.max_sessions = 2;
    let bridge = Bridge::new(config).unwrap();

    let a = bridge.create_session().unwrap();
    let _b = bridge.create_session().unwrap();
    assert!(matches!(
        bridge.create_session(),
        Err(BridgeError::SessionSpaceExhausted(2))
    ));

    // Freeing makes room again
    bridge.free_session(a).unwrap();
    assert!(bridge.create_session().is_ok());
}

#[test]
fn test_handle_space_exhausted() {
    let mut config = BridgeConfig::default();
    config.buffers.max_buffers = 1;
    let bridge = Bridge::new(config).unwrap();

    let data = [1u8, 2, 3];
    let handle = bridge.buffers().store(data.as_ptr(), 3).unwrap();
    assert!(matches!(
        bridge.buffers().store(data.as_ptr(), 3),
        Err(BridgeError::HandleSpaceExhausted(1))
    ));

    let region = bridge.buffers().lookup(handle);
    assert_eq!(region.as_ptr(), data.as_ptr());
    assert_eq!(region.len(), 3);
    assert!(bridge.buffers().release(handle).is_some());
    assert!(bridge.buffers().lookup(handle).is_null());
}

#[test]
fn test_shutdown_with_running_sessions() {
    let bridge = Arc::new(common::test_bridge());
    let id = common::start(&bridge, "POST /echo HTTP/1.1\r\n");
    assert_eq!(bridge.poll_session(id, true).unwrap(), Some(Command::ReadBody));

    bridge.shutdown();
    assert_eq!(bridge.live_sessions(), 0);
    assert!(matches!(
        bridge.send_body_chunk(id, true, b"x"),
        Err(BridgeError::UnknownSession(_))
    ));
    assert!(matches!(bridge.create_session(), Err(BridgeError::ShutDown)));
}
