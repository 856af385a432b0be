//! Handler runtime.
//!
//! # Responsibilities
//! - Own the tokio runtime that executes handler tasks
//! - Hold the currently installed handler (hot-swappable)
//! - Guarantee every launched session ends with `Done`
//!
//! # Design Decisions
//! - One task per session, all sessions in parallel on a multi-threaded runtime
//! - Handler errors and panics become `Error` followed by `Done`
//! - A handler that returns without deciding forwards its proxy request

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::Instrument;

use crate::command::Command;
use crate::config::RuntimeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::handler::{PassThrough, RequestContext, RequestHandler};
use crate::http::RequestHead;
use crate::observability::metrics;
use crate::session::RequestSession;

type SharedHandler = Arc<Box<dyn RequestHandler>>;

pub struct HandlerRuntime {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    handler: ArcSwap<Box<dyn RequestHandler>>,
    shut_down: AtomicBool,
    shutdown_timeout: Duration,
}

impl HandlerRuntime {
    /// Build the worker pool. The pass-through handler is installed initially.
    pub fn new(config: &RuntimeConfig) -> BridgeResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()
            .map_err(BridgeError::Runtime)?;
        let handle = runtime.handle().clone();

        tracing::debug!(
            worker_threads = config.worker_threads,
            thread_name = %config.thread_name,
            "Handler runtime started"
        );

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            handler: ArcSwap::from_pointee(Box::new(PassThrough) as Box<dyn RequestHandler>),
            shut_down: AtomicBool::new(false),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        })
    }

    /// Replace the handler used by sessions started from now on.
    pub fn install<H: RequestHandler>(&self, handler: H) {
        let name = handler.name().to_string();
        self.handler.store(Arc::new(Box::new(handler)));
        tracing::info!(handler = %name, "Request handler installed");
    }

    /// Name of the currently installed handler.
    pub fn handler_name(&self) -> String {
        self.handler.load().name().to_string()
    }

    /// Spawn the handler task for a session that just entered `Running`.
    pub fn launch(&self, session: Arc<RequestSession>, head: RequestHead) -> BridgeResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(BridgeError::ShutDown);
        }

        let handler = self.handler.load_full();
        let body = session.take_body_receiver();
        let span = tracing::info_span!(
            "session",
            session_id = %session.id(),
            trace_id = %session.trace_id(),
            method = %head.method,
            path = %head.path(),
        );
        self.handle
            .spawn(run_session(handler, session, head, body).instrument(span));
        Ok(())
    }

    /// Stop accepting sessions and wait up to the configured timeout for tasks.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(self.shutdown_timeout);
            tracing::info!("Handler runtime stopped");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for HandlerRuntime {
    fn drop(&mut self) {
        // Dropping a runtime from inside another runtime panics; detach instead.
        if let Some(runtime) = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            runtime.shutdown_background();
        }
    }
}

async fn run_session(
    handler: SharedHandler,
    session: Arc<RequestSession>,
    head: RequestHead,
    body: Option<crate::session::request_session::BodyReceiver>,
) {
    tracing::debug!("Handler started");
    let mut ctx = RequestContext::new(session.clone(), head, body);
    let outcome = AssertUnwindSafe(handler.handle(&mut ctx))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            if !session.is_decided() {
                tracing::debug!("Handler made no decision, forwarding request");
                // Cannot fail: no decision was taken
                let _ = ctx.forward();
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Handler failed");
            metrics::record_handler_fault("error");
            session.emit(Command::Error {
                message: e.to_string(),
            });
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(panic = %message, "Handler panicked");
            metrics::record_handler_fault("panic");
            session.emit(Command::Error {
                message: format!("handler panicked: {message}"),
            });
        }
    }

    session.finish();
    tracing::debug!(state = %session.state(), "Handler finished");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
