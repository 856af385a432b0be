//! Deterministic handler used for conformance testing.
//!
//! Behavior is selected by request path:
//!
//! | Path                 | Behavior                                        |
//! |----------------------|-------------------------------------------------|
//! | `/`, `/hello`        | respond 200 `Hello, World!`                     |
//! | `/echo`              | read the whole body, respond 200 with it        |
//! | `/modify`            | add `X-Bridge-Modified`, drop `Cookie`, forward |
//! | `/transform-headers` | header filter appending `X-Bridge-Injected`     |
//! | `/transform-body`    | body filter upper-casing ASCII                  |
//! | `/slow`              | wait [`SLOW_DELAY`], then respond 200           |
//! | `/fail`              | return an error                                 |
//! | `/panic`             | panic                                           |
//! | anything else        | forward unmodified                              |

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use hyper::body::Bytes;

use crate::error::HandlerError;
use crate::handler::{RequestContext, RequestHandler};
use crate::http::DirectResponse;

pub const MODIFIED_HEADER: &str = "X-Bridge-Modified";
pub const INJECTED_HEADER: &str = "X-Bridge-Injected";
pub const SLOW_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Default, Clone, Copy)]
pub struct TestHandler;

impl RequestHandler for TestHandler {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), HandlerError>> {
        async move {
            let path = ctx.request().path().to_string();
            match path.as_str() {
                "/" | "/hello" => ctx.respond(DirectResponse::text(200, "Hello, World!")?),
                "/echo" => {
                    let content_type = ctx
                        .request()
                        .headers
                        .get("content-type")
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let body = ctx.read_body().await;
                    ctx.respond(
                        DirectResponse::new(200)?
                            .header("Content-Type", content_type)?
                            .body(body),
                    )
                }
                "/modify" => {
                    let proxy = ctx.proxy_request_mut();
                    proxy.headers.set(MODIFIED_HEADER, "true")?;
                    proxy.headers.remove("cookie");
                    ctx.forward()
                }
                "/transform-headers" => {
                    ctx.set_header_filter(|headers| {
                        let mut out = headers.clone();
                        out.append(INJECTED_HEADER, "1").ok()?;
                        Some(out)
                    })?;
                    ctx.forward()
                }
                "/transform-body" => {
                    ctx.set_body_filter(|chunk, _last| Some(Bytes::from(chunk.to_ascii_uppercase())))?;
                    ctx.forward()
                }
                "/slow" => {
                    tokio::time::sleep(SLOW_DELAY).await;
                    ctx.respond(DirectResponse::text(200, "Slow response")?)
                }
                "/fail" => Err(HandlerError::Failed("test handler failure".to_string())),
                "/panic" => panic!("test handler panic"),
                _ => ctx.forward(),
            }
        }
        .boxed()
    }

    fn name(&self) -> &str {
        "test"
    }
}
