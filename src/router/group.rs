//! Route groups: nested nodes that derive their own typed data from their
//! parent's and wrap their subtree in Before-hooks.
//!
//! Every group is generic over its parent's data `P` and its own data `D`, so
//! the concrete types differ from level to level. A parent never sees a child's
//! `D`: it only holds the child as a [`Dispatch<D>`] capability ("given my
//! data, produce a response"), and the child's transform and hooks are closed
//! over inside the continuation it returns.
//!
//! ```text
//! Router<App>
//! ├── Group<App, Session>          transform: App -> Session
//! │   ├── Group<Session, Team>     transform: Session -> Team
//! │   └── Group<Session, Admin>    transform: Session -> Admin
//! │       └── Group<Admin, Admin>  transform: inherit
//! └── (own routes over App)
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use super::hooks::{BeforeHook, Inner, Next};
use super::pattern::{Pattern, PatternError};
use super::route::{Handler, Route};
use crate::context::{CancelToken, PathParams, RequestContext};
use crate::http::{Method, Request, Response, ResponseFuture};

/// Total function from a parent's data to a group's data.
pub(crate) type Transform<P, D> = Arc<dyn Fn(P) -> D + Send + Sync + 'static>;

/// Continuation produced by a successful dispatch: takes the parent's data,
/// runs the group's transform and hooks, and descends to the leaf.
pub(crate) type Enter<P> = Box<dyn FnOnce(CancelToken, P) -> ResponseFuture + Send>;

/// The route a request resolved to, plus how to get there from the parent.
pub(crate) struct Matched<P> {
    pub(crate) params: Arc<PathParams>,
    pub(crate) pattern: Arc<str>,
    pub(crate) enter: Enter<P>,
}

/// A node that can resolve a request on behalf of a parent carrying data `P`.
pub(crate) trait Dispatch<P>: Send + Sync {
    /// Resolves `request` within this subtree: own routes first, then children,
    /// first match wins. `None` when nothing below matches.
    fn dispatch(&self, request: &Arc<Request>) -> Option<Matched<P>>;

    /// Number of routes in this subtree.
    fn route_count(&self) -> usize;
}

/// Identity transform for groups that keep their parent's data unchanged.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::{Response, Router, router::inherit};
///
/// let mut router = Router::new(|_req| 1_u32);
/// router.sub_router("/api", inherit, |api| {
///     api.get("/ping", |_cx, _ctx| async { Response::ok() });
/// });
/// ```
pub fn inherit<D>(data: D) -> D {
    data
}

/// A set of routes and nested groups sharing a path prefix, a data transform
/// and a Before-hook chain.
///
/// Groups are created through [`Router::group`](super::Router::group),
/// [`Router::sub_router`](super::Router::sub_router), or the same methods on a
/// parent group; the build closure receives the new group to register on.
pub struct Group<P, D> {
    prefix: String,
    routes: Vec<Route<D>>,
    children: Vec<Box<dyn Dispatch<D>>>,
    hooks: Vec<BeforeHook<D>>,
    transform: Transform<P, D>,
}

impl<P, D> Group<P, D>
where
    P: Send + 'static,
    D: Send + 'static,
{
    pub(crate) fn new<T>(prefix: String, transform: T) -> Self
    where
        T: Fn(P) -> D + Send + Sync + 'static,
    {
        Self {
            prefix,
            routes: Vec::new(),
            children: Vec::new(),
            hooks: Vec::new(),
            transform: Arc::new(transform),
        }
    }

    /// The path prefix prepended to every pattern registered on this group.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register `handler` for `method` requests matching `pattern` (relative to
    /// the group prefix). `"/"` addresses the prefix itself.
    ///
    /// # Panics
    ///
    /// Panics if the joined pattern is malformed; see [`try_route`](Self::try_route).
    pub fn route<H, F>(&mut self, method: Method, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        if let Err(err) = self.try_route(method, pattern, handler) {
            panic!("{err}");
        }
    }

    /// Fallible form of [`route`](Self::route).
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] describing why the joined pattern was rejected.
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
        let pattern = Pattern::parse(&self.join(pattern))?;
        debug!(method = %method, pattern = %pattern, "route registered");

        let handler: Handler<D> =
            Arc::new(move |cx: CancelToken, ctx: RequestContext<D>| -> ResponseFuture {
                Box::pin(handler(cx, ctx))
            });
        self.routes.push(Route::new(method, pattern, handler));
        Ok(())
    }

    /// Register a handler for `GET` requests matching `pattern`.
    pub fn get<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Get, pattern, handler);
    }

    /// Register a handler for `POST` requests matching `pattern`.
    pub fn post<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Post, pattern, handler);
    }

    /// Register a handler for `PUT` requests matching `pattern`.
    pub fn put<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Put, pattern, handler);
    }

    /// Register a handler for `PATCH` requests matching `pattern`.
    pub fn patch<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Patch, pattern, handler);
    }

    /// Register a handler for `DELETE` requests matching `pattern`.
    pub fn delete<H, F>(&mut self, pattern: &str, handler: H)
    where
        H: Fn(CancelToken, RequestContext<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Delete, pattern, handler);
    }

    /// Add a Before-hook around every route in this group and its subgroups.
    ///
    /// Hooks run in registration order; see [`Next`] for the continuation contract.
    pub fn before<H, F>(&mut self, hook: H)
    where
        H: Fn(CancelToken, RequestContext<D>, Next<D>) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let hook: BeforeHook<D> = Arc::new(
            move |cx: CancelToken, ctx: RequestContext<D>, next: Next<D>| -> ResponseFuture {
                Box::pin(hook(cx, ctx, next))
            },
        );
        self.hooks.push(hook);
    }

    /// Nest a group with the same prefix whose data is derived by `transform`.
    pub fn group<C, T>(&mut self, transform: T, build: impl FnOnce(&mut Group<D, C>))
    where
        C: Send + 'static,
        T: Fn(D) -> C + Send + Sync + 'static,
    {
        let mut child = Group::new(self.prefix.clone(), transform);
        build(&mut child);
        self.children.push(Box::new(child));
    }

    /// Nest a group under `prefix` appended to this group's prefix.
    pub fn sub_router<C, T>(
        &mut self,
        prefix: &str,
        transform: T,
        build: impl FnOnce(&mut Group<D, C>),
    ) where
        C: Send + 'static,
        T: Fn(D) -> C + Send + Sync + 'static,
    {
        let mut child = Group::new(format!("{}{prefix}", self.prefix), transform);
        build(&mut child);
        self.children.push(Box::new(child));
    }

    /// Number of routes registered here and in every nested group.
    pub fn len(&self) -> usize {
        self.route_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn transform(&self) -> &Transform<P, D> {
        &self.transform
    }

    // `"/"` maps to the prefix itself; otherwise exactly one slash joins the two.
    fn join(&self, pattern: &str) -> String {
        let joined = if pattern == "/" {
            self.prefix.clone()
        } else {
            format!(
                "{}/{}",
                self.prefix.trim_end_matches('/'),
                pattern.trim_start_matches('/')
            )
        };

        if joined.is_empty() {
            "/".to_owned()
        } else {
            joined
        }
    }

    // Finds the match below this group and the continuation that runs it once
    // this group's context exists.
    fn locate(&self, request: &Arc<Request>) -> Option<(Arc<PathParams>, Arc<str>, Inner<D>)> {
        for route in &self.routes {
            if let Some(params) = route.is_match(request) {
                let handler = Arc::clone(route.handler());
                let inner: Inner<D> =
                    Box::new(move |cx: CancelToken, ctx: RequestContext<D>| handler(cx, ctx));
                return Some((Arc::new(params), Arc::from(route.pattern().as_str()), inner));
            }
        }

        for child in &self.children {
            if let Some(Matched {
                params,
                pattern,
                enter,
            }) = child.dispatch(request)
            {
                let inner: Inner<D> = Box::new(move |cx: CancelToken, ctx: RequestContext<D>| {
                    enter(cx, ctx.into_data())
                });
                return Some((params, pattern, inner));
            }
        }

        None
    }
}

impl<P, D> Dispatch<P> for Group<P, D>
where
    P: Send + 'static,
    D: Send + 'static,
{
    fn dispatch(&self, request: &Arc<Request>) -> Option<Matched<P>> {
        let (params, pattern, inner) = self.locate(request)?;

        let transform = Arc::clone(&self.transform);
        let hooks = self.hooks.clone();
        let request = Arc::clone(request);
        let ctx_params = Arc::clone(&params);
        let ctx_pattern = Arc::clone(&pattern);

        let enter: Enter<P> = Box::new(move |cx: CancelToken, parent: P| -> ResponseFuture {
            let data = transform(parent);
            let ctx = RequestContext::new(request, ctx_params, ctx_pattern, data);
            Box::pin(Next::new(hooks, inner).run(cx, ctx))
        });

        Some(Matched {
            params,
            pattern,
            enter,
        })
    }

    fn route_count(&self) -> usize {
        self.routes.len()
            + self
                .children
                .iter()
                .map(|child| child.route_count())
                .sum::<usize>()
    }
}
