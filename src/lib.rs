//! # strata
//!
//! Typed route groups and handler composition for async HTTP/1.1 services.
//!
//! A [`Router`] is the root of a tree of [`Group`]s. Each level of the tree
//! carries its own per-request data type, derived from the parent's by a plain
//! function, and can wrap everything below it in Before-hooks that see that
//! data and may answer early. Transport-level middleware runs around the whole
//! tree on the raw [`Request`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::{Response, Router, Server, StatusCode};
//!
//! #[derive(Clone)]
//! struct App {
//!     user: Option<String>,
//! }
//!
//! struct Admin {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new(|req| App {
//!         user: req.headers().get("x-user").map(str::to_owned),
//!     });
//!
//!     router.get("/hello/:name", |_cx, ctx| async move {
//!         let name = ctx.param("name").unwrap_or("stranger").to_owned();
//!         Response::text(StatusCode::Ok, format!("hello {name}"))
//!     });
//!
//!     router.sub_router("/admin", |app: App| app, |admin| {
//!         admin.before(|cx, ctx, next| async move {
//!             if ctx.data().user.is_none() {
//!                 return Response::text(StatusCode::Forbidden, "nope");
//!             }
//!             next.run(cx, ctx).await
//!         });
//!         admin.group(
//!             |app: App| Admin { name: app.user.unwrap_or_default() },
//!             |g| {
//!                 g.get("/whoami", |_cx, ctx| async move {
//!                     Response::text(StatusCode::Ok, ctx.data().name.clone())
//!                 });
//!             },
//!         );
//!     });
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod testing;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::{CancelToken, PathParams, RequestContext};
pub use http::{BufferedSink, Headers, Method, Request, Response, ResponseSink, StatusCode};
pub use router::{Group, Next, Router, inherit};
pub use server::{Server, ServerConfig, ServerError};
