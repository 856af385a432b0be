//! Handler subsystem.
//!
//! # Data Flow
//! ```text
//! start_session
//!     → runtime.rs spawns one task per session
//!     → RequestHandler::handle(&mut RequestContext)
//!         context.rs: read head, stream body, edit proxy request,
//!                     respond / forward, install filters
//!     → commands appended to the session queue
//!     → runtime.rs queues Done (Error + Done on failure)
//!
//! transform_headers / transform_body (host thread)
//!     → filters.rs runs the installed filter synchronously
//! ```
//!
//! # Design Decisions
//! - Handlers are trait objects so the host can swap them at runtime
//! - The handler borrows its context; the runtime keeps ownership so it can
//!   forward on the handler's behalf when no decision was made

pub mod context;
pub mod filters;
pub mod runtime;
pub mod test_handler;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::HandlerError;

pub use context::RequestContext;
pub use filters::{BodyFilter, HeaderFilter};
pub use runtime::HandlerRuntime;
pub use test_handler::TestHandler;

/// User-supplied per-request logic.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), HandlerError>>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Forwards every request unmodified.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl RequestHandler for PassThrough {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), HandlerError>> {
        async move { ctx.forward() }.boxed()
    }

    fn name(&self) -> &str {
        "pass-through"
    }
}
