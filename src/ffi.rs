//! C ABI over a process-global [`Bridge`].
//!
//! # Conventions
//! - Session ids and buffer handles are `u32`; 0 means "none" or "failed"
//! - Status-returning calls return 1 on success and 0 on a contract
//!   violation, which is also logged at `warn`
//! - Strings returned to the host are NUL-terminated JSON or header text and
//!   must be released with `proxy_bridge_free_string`
//! - Byte payloads handed to the host (`SendBody`, transformed body chunks)
//!   are registered in the buffer table and read by handle with
//!   `proxy_bridge_get_buffer` / `proxy_bridge_get_buffer_length`; they stay
//!   valid until the session is freed, which also releases the handles
//!
//! # Poll wire format
//! ```text
//! {"command":"read_body"}
//! {"command":"send_headers","status":200,"headers":[["Content-Length","13"]]}
//! {"command":"send_body","chunk":7,"length":13}
//! {"command":"proxy","method":"GET","uri":"/x","headers":[...],"target":null}
//! {"command":"filter_headers"}
//! {"command":"filter_body"}
//! {"command":"error","message":"..."}
//! {"command":"done"}
//! ```

use std::ffi::{c_char, CStr, CString};
use std::sync::OnceLock;

use hyper::body::Bytes;
use serde::Serialize;

use crate::bridge::Bridge;
use crate::buffer::BufferHandle;
use crate::command::Command;
use crate::config::{self, ObservabilityConfig};
use crate::error::BridgeResult;
use crate::http::HeaderBlock;
use crate::observability;
use crate::session::SessionId;

static BRIDGE: OnceLock<Option<Bridge>> = OnceLock::new();

fn init_bridge() -> Result<Bridge, Box<dyn std::error::Error>> {
    let config = match config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            observability::init_logging(&ObservabilityConfig::default());
            return Err(e.into());
        }
    };
    observability::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = observability::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    Ok(Bridge::new(config)?)
}

/// The global bridge, created on first use.
fn bridge() -> Option<&'static Bridge> {
    BRIDGE
        .get_or_init(|| match init_bridge() {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                tracing::error!(error = %e, "Bridge initialization failed");
                None
            }
        })
        .as_ref()
}

fn status(result: BridgeResult<()>, op: &'static str) -> i32 {
    match result {
        Ok(()) => 1,
        Err(e) => {
            tracing::warn!(op, error = %e, "Boundary call rejected");
            0
        }
    }
}

fn into_c_string(text: String) -> *mut c_char {
    match CString::new(text) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            tracing::warn!(error = %e, "String contains NUL, dropped");
            std::ptr::null_mut()
        }
    }
}

/// Borrow a host string. Null or non-UTF-8 input yields `None`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn host_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Borrow host bytes. A null pointer is treated as an empty slice.
///
/// # Safety
/// `data` must be null or valid for reads of `len` bytes.
unsafe fn host_bytes<'a>(data: *const u8, len: u32) -> &'a [u8] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data, len as usize)
    }
}

#[derive(Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum WireCommand<'a> {
    ReadBody,
    SendHeaders {
        status: u16,
        headers: &'a HeaderBlock,
    },
    SendBody {
        chunk: BufferHandle,
        length: u32,
    },
    Proxy {
        method: &'a str,
        uri: String,
        headers: &'a HeaderBlock,
        target: Option<&'a str>,
    },
    FilterHeaders,
    FilterBody,
    Error {
        message: String,
    },
    Done,
}

/// Render a command in the poll wire format.
///
/// A body chunk that cannot be exported is reported as an `error` command.
pub(crate) fn encode_command(bridge: &Bridge, id: SessionId, command: &Command) -> String {
    let wire = match command {
        Command::ReadBody => WireCommand::ReadBody,
        Command::SendHeaders { status, headers } => WireCommand::SendHeaders {
            status: *status,
            headers,
        },
        Command::SendBody { data } => match bridge.export_chunk(id, data.clone()) {
            Ok((chunk, length)) => WireCommand::SendBody { chunk, length },
            Err(e) => {
                tracing::warn!(error = %e, len = data.len(), "Failed to export response body chunk");
                WireCommand::Error {
                    message: e.to_string(),
                }
            }
        },
        Command::Proxy(request) => WireCommand::Proxy {
            method: request.method.as_str(),
            uri: request.uri.to_string(),
            headers: &request.headers,
            target: request.target.as_deref(),
        },
        Command::FilterHeaders => WireCommand::FilterHeaders,
        Command::FilterBody => WireCommand::FilterBody,
        Command::Error { message } => WireCommand::Error {
            message: message.clone(),
        },
        Command::Done => WireCommand::Done,
    };
    // Only strings, integers and sequences of them; serialization cannot fail
    serde_json::to_string(&wire).unwrap_or_else(|e| {
        format!(r#"{{"command":"error","message":{:?}}}"#, e.to_string())
    })
}

/// Create a session. Returns its id, or 0 on failure.
#[no_mangle]
pub extern "C" fn proxy_bridge_create_session() -> u32 {
    let Some(bridge) = bridge() else { return 0 };
    match bridge.create_session() {
        Ok(id) => id.as_u32(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create session");
            0
        }
    }
}

/// Free a session created by `proxy_bridge_create_session`.
#[no_mangle]
pub extern "C" fn proxy_bridge_free_session(id: u32) -> i32 {
    let Some(bridge) = bridge() else { return 0 };
    status(bridge.free_session(SessionId::from_raw(id)), "free_session")
}

/// Start a session with a CRLF-delimited request line and headers.
///
/// # Safety
/// `raw_head` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn proxy_bridge_start_session(id: u32, raw_head: *const c_char) -> i32 {
    let Some(bridge) = bridge() else { return 0 };
    let Some(raw_head) = host_str(raw_head) else {
        tracing::warn!(session_id = id, "Request head is null or not UTF-8");
        return 0;
    };
    status(bridge.start_session(SessionId::from_raw(id), raw_head), "start_session")
}

/// Poll the next command as JSON. Null when there is none.
///
/// A non-zero `block` waits until a command is available or the session is freed.
#[no_mangle]
pub extern "C" fn proxy_bridge_poll_session(id: u32, block: i32) -> *mut c_char {
    let Some(bridge) = bridge() else {
        return std::ptr::null_mut();
    };
    let id = SessionId::from_raw(id);
    match bridge.poll_session(id, block != 0) {
        Ok(Some(command)) => into_c_string(encode_command(bridge, id, &command)),
        Ok(None) => std::ptr::null_mut(),
        Err(e) => {
            tracing::warn!(op = "poll_session", error = %e, "Boundary call rejected");
            std::ptr::null_mut()
        }
    }
}

/// Deliver a request body chunk. The bytes are copied before returning.
///
/// # Safety
/// `data` must be null or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn proxy_bridge_send_body_chunk(id: u32, last: i32, data: *const u8, len: u32) -> i32 {
    let Some(bridge) = bridge() else { return 0 };
    let data = host_bytes(data, len);
    status(
        bridge.send_body_chunk(SessionId::from_raw(id), last != 0, data),
        "send_body_chunk",
    )
}

/// Run the header filter. Returns the new header block, or null when unchanged.
///
/// # Safety
/// `headers` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn proxy_bridge_transform_headers(id: u32, headers: *const c_char) -> *mut c_char {
    let Some(bridge) = bridge() else {
        return std::ptr::null_mut();
    };
    let Some(headers) = host_str(headers) else {
        tracing::warn!(session_id = id, "Header block is null or not UTF-8");
        return std::ptr::null_mut();
    };
    match bridge.transform_headers(SessionId::from_raw(id), headers) {
        Ok(Some(out)) => into_c_string(out),
        Ok(None) => std::ptr::null_mut(),
        Err(e) => {
            tracing::warn!(op = "transform_headers", error = %e, "Boundary call rejected");
            std::ptr::null_mut()
        }
    }
}

/// Run the body filter. Returns a buffer handle for the new chunk, or 0 when
/// unchanged. The chunk stays readable until the session is freed.
///
/// # Safety
/// `data` must be null or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn proxy_bridge_transform_body(id: u32, last: i32, data: *const u8, len: u32) -> u32 {
    let Some(bridge) = bridge() else { return 0 };
    let id = SessionId::from_raw(id);
    let data = host_bytes(data, len);
    let out: Bytes = match bridge.transform_body(id, last != 0, data) {
        Ok(Some(out)) => out,
        Ok(None) => return 0,
        Err(e) => {
            tracing::warn!(op = "transform_body", error = %e, "Boundary call rejected");
            return 0;
        }
    };
    match bridge.export_chunk(id, out) {
        Ok((handle, _)) => handle.as_u32(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to export transformed body chunk");
            0
        }
    }
}

/// Register host memory. Returns a handle, or 0 when the table is full.
#[no_mangle]
pub extern "C" fn proxy_bridge_store_buffer(data: *const u8, len: u32) -> u32 {
    let Some(bridge) = bridge() else { return 0 };
    match bridge.buffers().store(data, len) {
        Ok(handle) => handle.as_u32(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to store buffer");
            0
        }
    }
}

/// Drop a handle mapping. The memory itself is not freed.
#[no_mangle]
pub extern "C" fn proxy_bridge_release_buffer(handle: u32) {
    if let Some(bridge) = bridge() {
        bridge.buffers().release(BufferHandle::from_raw(handle));
    }
}

/// Address of a registered region, or null for an unknown handle.
#[no_mangle]
pub extern "C" fn proxy_bridge_get_buffer(handle: u32) -> *const u8 {
    match bridge() {
        Some(bridge) => bridge.buffers().lookup(BufferHandle::from_raw(handle)).as_ptr(),
        None => std::ptr::null(),
    }
}

/// Length of a registered region, or 0 for an unknown handle.
#[no_mangle]
pub extern "C" fn proxy_bridge_get_buffer_length(handle: u32) -> u32 {
    match bridge() {
        Some(bridge) => bridge.buffers().lookup(BufferHandle::from_raw(handle)).len(),
        None => 0,
    }
}

#[no_mangle]
pub extern "C" fn proxy_bridge_install_test_handler() {
    if let Some(bridge) = bridge() {
        bridge.install_test_handler();
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// `s` must be null or a pointer returned by this library, freed only once.
#[no_mangle]
pub unsafe extern "C" fn proxy_bridge_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free every session and stop the handler runtime.
#[no_mangle]
pub extern "C" fn proxy_bridge_shutdown() {
    if let Some(bridge) = BRIDGE.get().and_then(Option::as_ref) {
        bridge.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, RuntimeConfig};
    use crate::http::ProxyRequest;
    use crate::http::RequestHead;

    fn local_bridge() -> Bridge {
        Bridge::new(BridgeConfig {
            runtime: RuntimeConfig {
                worker_threads: 1,
                ..RuntimeConfig::default()
            },
            ..BridgeConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_encode_simple_commands() {
        let bridge = local_bridge();
        let id = bridge.create_session().unwrap();
        assert_eq!(encode_command(&bridge, id, &Command::ReadBody), r#"{"command":"read_body"}"#);
        assert_eq!(encode_command(&bridge, id, &Command::Done), r#"{"command":"done"}"#);
        assert_eq!(
            encode_command(
                &bridge,
                id,
                &Command::Error {
                    message: "boom".into()
                }
            ),
            r#"{"command":"error","message":"boom"}"#
        );
    }

    #[test]
    fn test_encode_proxy() {
        let bridge = local_bridge();
        let head = RequestHead::parse("POST /api?x=1 HTTP/1.1\r\nHost: example\r\n").unwrap();
        let mut request = ProxyRequest::from_head(&head);
        request.set_target("http://backend:8080");

        let id = bridge.create_session().unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&encode_command(&bridge, id, &Command::Proxy(request))).unwrap();
        assert_eq!(json["command"], "proxy");
        assert_eq!(json["method"], "POST");
        assert_eq!(json["uri"], "/api?x=1");
        assert_eq!(json["headers"][0][0], "Host");
        assert_eq!(json["target"], "http://backend:8080");
    }

    #[test]
    fn test_send_body_exported_through_buffer_table() {
        let bridge = local_bridge();
        let id = bridge.create_session().unwrap();
        let command = Command::SendBody {
            data: Bytes::from_static(b"Hello, World!"),
        };

        let json: serde_json::Value = serde_json::from_str(&encode_command(&bridge, id, &command)).unwrap();
        assert_eq!(json["command"], "send_body");
        assert_eq!(json["length"], 13);

        let handle = BufferHandle::from_raw(json["chunk"].as_u64().unwrap() as u32);
        let region = bridge.buffers().lookup(handle);
        assert_eq!(region.len(), 13);
        let bytes = unsafe { std::slice::from_raw_parts(region.as_ptr(), region.len() as usize) };
        assert_eq!(bytes, b"Hello, World!");

        bridge.free_session(id).unwrap();
        assert!(bridge.buffers().lookup(handle).is_null());
    }

    #[test]
    fn test_send_body_for_freed_session_becomes_error() {
        let bridge = local_bridge();
        let id = bridge.create_session().unwrap();
        bridge.free_session(id).unwrap();

        let command = Command::SendBody {
            data: Bytes::from_static(b"late"),
        };
        let json: serde_json::Value = serde_json::from_str(&encode_command(&bridge, id, &command)).unwrap();
        assert_eq!(json["command"], "error");
        assert!(bridge.buffers().is_empty());
    }

    #[test]
    fn test_host_helpers_tolerate_null() {
        unsafe {
            assert_eq!(host_str(std::ptr::null()), None);
            assert!(host_bytes(std::ptr::null(), 10).is_empty());
        }
        let s = CString::new("X-Orig: 1\r\n").unwrap();
        assert_eq!(unsafe { host_str(s.as_ptr()) }, Some("X-Orig: 1\r\n"));
    }
}
