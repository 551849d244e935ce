//! Request routing: a tree of typed groups under a [`Router`].
//!
//! Routes are registered on the router or on nested [`Group`]s. Every level of
//! the tree carries its own data type, derived from its parent's by a total
//! transform, and may wrap its subtree in Before-hooks that see that typed
//! data. The router adds transport-level middleware around the whole tree and
//! a fallback for requests nothing matched.
//!
//! | Pattern              | Example match              | Captured params   |
//! |----------------------|----------------------------|-------------------|
//! | `/users`             | `/users`                   | *(none)*          |
//! | `/users/:id`         | `/users/42`                | `id → "42"`       |
//! | `/hello/:name`       | `/hello/Fox%20Mulder`      | `name → "Fox Mulder"` |
//!
//! Paths are compared segment by segment with no normalization, so `/users/`
//! and `/users` are different routes. Within a group, own routes are tried in
//! registration order before any nested group, and the first match wins.
//!
//! # Request flow
//!
//! ```text
//! serve_request ─▶ middleware 1 ─▶ middleware 2 ─▶ dispatch
//!                                                    │
//!                         root transform ◀───────────┘
//!                         root hooks ─▶ group transform ─▶ group hooks ─▶ handler
//! ```

mod group;
mod hooks;
mod pattern;
mod route;

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

pub use group::{Group, inherit};
pub use hooks::{BeforeHook, Next};
pub use pattern::{Pattern, PatternError};
pub use route::{Handler, Route};

use group::{Dispatch, Matched};

use crate::context::{CancelToken, PathParams, RequestContext};
use crate::http::{Method, Request, Response, ResponseFuture, ResponseSink, StatusCode};
use crate::middleware::{self, Endpoint, Middleware, MiddlewareHandler};

/// Root of the routing tree.
///
/// `D` is the data type handed to top-level routes and hooks; it is created
/// fresh for every request by the creator passed to [`Router::new`].
///
/// A router is built once and then shared read-only behind an [`Arc`] while
/// serving. Registering routes after serving has started is not supported.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::{Response, Router, StatusCode, router::inherit};
///
/// #[derive(Clone)]
/// struct App {
///     user: Option<String>,
/// }
///
/// let mut router = Router::new(|req| App {
///     user: req.headers().get("x-user").map(str::to_owned),
/// });
///
/// router.get("/", |_cx, _ctx| async { Response::ok() });
///
/// router.sub_router("/admin", inherit, |admin| {
///     admin.before(|cx, ctx, next| async move {
///         if ctx.data().user.is_none() {
///             return Response::text(StatusCode::Forbidden, "nope");
///         }
///         next.run(cx, ctx).await
///     });
///     admin.get("/stats", |_cx, _ctx| async { Response::ok() });
/// });
/// ```
pub struct Router<D> {
    root: Group<Arc<Request>, D>,
    middlewares: Vec<MiddlewareHandler>,
    missing: Option<Handler<D>>,
}

impl Default for Router<()> {
    fn default() -> Self {
        Self::new(|_| ())
    }
}

impl<D: Send + 'static> Router<D> {
    /// Create an empty router whose top-level data is built by `creator`.
    ///
    /// `creator` runs at most once per request, and only when a route matched
    /// or the missing-route handler is about to run.
    pub fn new<C>(creator: C) -> Self
    where
        C: Fn(&Request) -> D + Send + Sync + 'static,
    {
        Self {
            root: Group::new(String::new(), move |request: Arc<Request>| {
                creator(&request)
            }),
            middlewares: Vec::new(),
            missing: None,
        }
    }

    /// Register `handler` for `method` requests matching `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is malformed; see [`try_route`](Self::try_route).
    pub fn route<H, F>(&mut self, method: Method, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.route(method, pattern, handler);
    }

    /// Fallible form of [`route`](Self::route).
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] describing why `pattern` was rejected.
    pub fn try_route<H, F>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), PatternError>
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.try_route(method, pattern, handler)
    }

    /// Register a handler for `GET` requests matching `pattern`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use strata::{Response, Router, StatusCode};
    ///
    /// let mut router = Router::default();
    /// router.get("/hello/:name", |_cx, ctx| async move {
    ///     let name = ctx.param("name").unwrap_or("stranger").to_owned();
    ///     Response::text(StatusCode::Ok, format!("hello {name}"))
    /// });
    /// ```
    pub fn get<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.get(pattern, handler);
    }

    /// Register a handler for `POST` requests matching `pattern`.
    pub fn post<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.post(pattern, handler);
    }

    /// Register a handler for `PUT` requests matching `pattern`.
    pub fn put<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.put(pattern, handler);
    }

    /// Register a handler for `PATCH` requests matching `pattern`.
    pub fn patch<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.patch(pattern, handler);
    }

    /// Register a handler for `DELETE` requests matching `pattern`.
    pub fn delete<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.delete(pattern, handler);
    }

    /// Add a Before-hook around every route in the tree.
    ///
    /// Hooks do not run for the missing-route fallback.
    pub fn before<H, F>(&mut self, hook: H)
    where
        H: Fn(CancelToken, RequestContext<D>, Next<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.root.before(hook);
    }

    /// Nest a group at the root prefix whose data is derived by `transform`.
    pub fn group<C, T>(&mut self, transform: T, build: impl FnOnce(&mut Group<D, C>))
    where
        C: Send + 'static,
        T: Fn(D) -> C + Send + Sync + 'static,
    {
        self.root.group(transform, build);
    }

    /// Nest a group under `prefix` whose data is derived by `transform`.
    pub fn sub_router<C, T>(
        &mut self,
        prefix: &str,
        transform: T,
        build: impl FnOnce(&mut Group<D, C>),
    ) where
        C: Send + 'static,
        T: Fn(D) -> C + Send + Sync + 'static,
    {
        self.root.sub_router(prefix, transform, build);
    }

    /// Append a transport-level middleware. The first one added is outermost.
    pub fn middleware<M>(&mut self, middleware: M)
    where
        M: Middleware + 'static,
    {
        self.middlewares
            .push(middleware::from_middleware(Arc::new(middleware)));
    }

    /// Append a closure as a transport-level middleware.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use strata::Router;
    ///
    /// let mut router = Router::default();
    /// router.middleware_fn(|cx, request, next| async move {
    ///     next.run(cx, request).await.header("X-Served-By", "strata")
    /// });
    /// ```
    pub fn middleware_fn<H, F>(&mut self, middleware: H)
    where
        H: Fn(CancelToken, Request, middleware::Next) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.middlewares.push(middleware::from_fn(middleware));
    }

    /// Set the handler used when no route matches.
    ///
    /// It receives top-level data from the creator, empty params and an empty
    /// matched pattern. Without one, unmatched requests get a plain-text `404`.
    pub fn missing<H, F>(&mut self, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.missing = Some(Arc::new(
            move |cx: CancelToken, ctx: RequestContext<D>| -> ResponseFuture {
                Box::pin(handler(cx, ctx))
            },
        ));
    }

    /// Number of routes in the whole tree.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `request` through the middleware chain and the routing tree and
    /// return the response without writing it anywhere.
    pub async fn handle(self: &Arc<Self>, cx: CancelToken, request: Request) -> Response {
        let router = Arc::clone(self);
        let endpoint: Endpoint =
            Arc::new(move |cx: CancelToken, request: Request| -> ResponseFuture {
                let router = Arc::clone(&router);
                Box::pin(async move { router.dispatch(cx, request).await })
            });

        middleware::Next::new(self.middlewares.clone(), endpoint)
            .run(cx, request)
            .await
    }

    /// Dispatch `request` and write the response to `sink`: status, then
    /// headers, then body chunks in order.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use strata::{BufferedSink, CancelToken, Request, Response, Router};
    ///
    /// # async fn example() {
    /// let mut router = Router::default();
    /// router.get("/ping", |_cx, _ctx| async { Response::text(strata::StatusCode::Ok, "pong") });
    /// let router = Arc::new(router);
    ///
    /// let mut sink = BufferedSink::new();
    /// router
    ///     .serve_request(CancelToken::new(), Request::new("GET", "/ping"), &mut sink)
    ///     .await;
    /// assert_eq!(&sink.into_response().collect_body()[..], b"pong");
    /// # }
    /// ```
    pub async fn serve_request<S>(self: &Arc<Self>, cx: CancelToken, request: Request, sink: &mut S)
    where
        S: ResponseSink + Send + ?Sized,
    {
        let response = self.handle(cx, request).await;
        response.write_to(sink);
    }

    // Terminal link of the middleware chain: walk the tree, or fall back.
    async fn dispatch(&self, cx: CancelToken, request: Request) -> Response {
        let request = Arc::new(request);

        if let Some(Matched { pattern, enter, .. }) = self.root.dispatch(&request) {
            debug!(
                method = %request.method(),
                path = request.path(),
                pattern = &*pattern,
                "route matched"
            );
            return enter(cx, Arc::clone(&request)).await;
        }

        debug!(method = %request.method(), path = request.path(), "no route matched");

        match &self.missing {
            Some(handler) => {
                let data = (self.root.transform())(Arc::clone(&request));
                let ctx = RequestContext::new(
                    request,
                    Arc::new(PathParams::new()),
                    Arc::from(""),
                    data,
                );
                handler(cx, ctx).await
            }
            None => Response::text(StatusCode::NotFound, "404 not found"),
        }
    }
}
