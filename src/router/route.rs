use std::fmt;
use std::sync::Arc;

use super::pattern::Pattern;
use crate::context::{CancelToken, PathParams, RequestContext};
use crate::http::{Method, Request, ResponseFuture};

/// Type-erased async handler for routes whose group carries data `D`.
///
/// You rarely build one directly; the registration methods on
/// [`Router`](super::Router) and [`Group`](super::Group) box closures into it.
pub type Handler<D> =
    Arc<dyn Fn(CancelToken, RequestContext<D>) -> ResponseFuture + Send + Sync + 'static>;

/// A registered (method, pattern, handler) triple. Immutable once built.
pub struct Route<D> {
    method: Method,
    pattern: Pattern,
    handler: Handler<D>,
}

impl<D> Route<D> {
    pub(crate) fn new(method: Method, pattern: Pattern, handler: Handler<D>) -> Self {
        Self {
            method,
            pattern,
            handler,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub(crate) fn handler(&self) -> &Handler<D> {
        &self.handler
    }

    /// Returns the captured parameters when both the method (compared exactly)
    /// and the path match, `None` otherwise.
    pub fn is_match(&self, request: &Request) -> Option<PathParams> {
        if &self.method == request.method() {
            self.pattern.matches(request.path())
        } else {
            None
        }
    }
}

impl<D> fmt::Debug for Route<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}
