//! Transport-level middleware: composable logic that runs around routing.
//!
//! Middleware sees the raw [`Request`] before any typed group data exists. The
//! stack is an ordered continuation chain; the first middleware registered on
//! the [`Router`](crate::Router) is the outermost, and the innermost link is
//! the router's own dispatch. Middleware wraps every request, matched or not.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by struct middleware.
//! - [`Next`]: cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] / [`from_fn`]: turn a trait object or a closure into a
//!   [`MiddlewareHandler`].
//!
//! ## Bundled middleware
//!
//! - [`LoggerMiddleware`]: one log line per request.
//! - [`TimeoutMiddleware`]: answers `504` when the rest of the chain is too slow.
//! - [`SlashNormalizer`]: redirects paths with repeated slashes.
//! - [`MethodOverride`]: lets HTML forms tunnel `PUT`/`PATCH`/`DELETE` through `POST`.

mod method_override;
mod normalize;
mod timeout;

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;

pub use method_override::MethodOverride;
pub use normalize::SlashNormalizer;
pub use timeout::TimeoutMiddleware;

use crate::context::CancelToken;
use crate::http::{Request, Response, ResponseFuture};

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler =
    Arc<dyn Fn(CancelToken, Request, Next) -> ResponseFuture + Send + Sync + 'static>;

/// The link a chain ends in once every middleware has run.
pub type Endpoint = Arc<dyn Fn(CancelToken, Request) -> ResponseFuture + Send + Sync + 'static>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] invokes the next middleware, or the endpoint when the
/// chain is exhausted. Not calling it short-circuits the request.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::CancelToken;
/// use strata::http::{Request, ResponseFuture};
/// use strata::middleware::{Middleware, Next};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, cx: CancelToken, request: Request, next: Next) -> ResponseFuture {
///         Box::pin(async move { next.run(cx, request).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
    endpoint: Endpoint,
}

impl Next {
    /// Creates a new `Next` positioned at the start of `middlewares`, ending
    /// in `endpoint`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, endpoint: Endpoint) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. Once the chain is exhausted the endpoint runs.
    pub async fn run(mut self, cx: CancelToken, request: Request) -> Response {
        if self.index < self.middlewares.len() {
            let handler = Arc::clone(&self.middlewares[self.index]);
            self.index += 1;
            handler(cx, request, self).await
        } else {
            (self.endpoint)(cx, request).await
        }
    }
}

/// The core trait for struct middleware.
///
/// Implementors receive the cancellation token, the raw [`Request`] and a
/// [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(cx, request).await` unchanged.
/// - **Rewrite**: modify the request (method, path, headers) before passing it on.
/// - **Short-circuit**: return a [`Response`] without calling `next`.
/// - **Decorate**: inspect or change the response `next` produced.
///
/// Implementations are shared across Tokio tasks, hence `Send + Sync`.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the rest of the chain.
    fn handle(&self, cx: CancelToken, request: Request, next: Next) -> ResponseFuture;
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use strata::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |cx: CancelToken, request: Request, next: Next| {
        middleware.handle(cx, request, next)
    })
}

/// Converts an async closure into a [`MiddlewareHandler`].
pub fn from_fn<H, F>(middleware: H) -> MiddlewareHandler
where
    H: Fn(CancelToken, Request, Next) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    Arc::new(
        move |cx: CancelToken, request: Request, next: Next| -> ResponseFuture {
            Box::pin(middleware(cx, request, next))
        },
    )
}

/// Logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` event after the rest of the chain completes.
/// Never short-circuits.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::Router;
/// use strata::middleware::LoggerMiddleware;
///
/// let mut router = Router::default();
/// router.middleware(LoggerMiddleware);
/// ```
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, cx: CancelToken, request: Request, next: Next) -> ResponseFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().clone();
            let path = request.path().to_owned();

            let response = next.run(cx, request).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );

            response
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::StatusCode;

    /// Endpoint that echoes the method and path it finally sees.
    pub(crate) fn echo_endpoint() -> Endpoint {
        Arc::new(|_: CancelToken, request: Request| -> ResponseFuture {
            Box::pin(async move {
                Response::text(
                    StatusCode::Ok,
                    format!("{} {}", request.method(), request.path()),
                )
            })
        })
    }

    pub(crate) async fn run_chain(
        middlewares: Vec<MiddlewareHandler>,
        request: Request,
    ) -> Response {
        Next::new(middlewares, echo_endpoint())
            .run(CancelToken::new(), request)
            .await
    }

    pub(crate) fn body_of(response: &Response) -> String {
        String::from_utf8(response.collect_body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn empty_chain_reaches_endpoint() {
        let response = run_chain(Vec::new(), Request::new("GET", "/x")).await;
        assert_eq!(body_of(&response), "GET /x");
    }

    #[tokio::test]
    async fn first_registered_is_outermost() {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let layer = |name: &'static str| {
            let log = Arc::clone(&log);
            from_fn(move |cx, request, next: Next| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(format!("{name} in"));
                    let response = next.run(cx, request).await;
                    log.lock().unwrap().push(format!("{name} out"));
                    response
                }
            })
        };

        run_chain(vec![layer("a"), layer("b")], Request::new("GET", "/")).await;
        assert_eq!(*log.lock().unwrap(), vec!["a in", "b in", "b out", "a out"]);
    }

    #[tokio::test]
    async fn skipping_next_short_circuits() {
        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);

        let deny = from_fn(|_, _, _| async { Response::text(StatusCode::Unauthorized, "halt") });
        let inner = from_fn(move |cx, request, next: Next| {
            *flag.lock().unwrap() = true;
            next.run(cx, request)
        });

        let response = run_chain(vec![deny, inner], Request::new("GET", "/")).await;
        assert_eq!(response.status(), StatusCode::Unauthorized);
        assert_eq!(body_of(&response), "halt");
        assert!(!*reached.lock().unwrap());
    }

    #[tokio::test]
    async fn struct_middleware_decorates_response() {
        struct Stamp;

        impl Middleware for Stamp {
            fn handle(&self, cx: CancelToken, request: Request, next: Next) -> ResponseFuture {
                Box::pin(async move { next.run(cx, request).await.header("X-Stamp", "1") })
            }
        }

        let response = run_chain(
            vec![from_middleware(Arc::new(Stamp)), from_middleware(Arc::new(LoggerMiddleware))],
            Request::new("GET", "/"),
        )
        .await;
        assert_eq!(response.headers().get("x-stamp"), Some("1"));
        assert_eq!(body_of(&response), "GET /");
    }
}
