//! Before-hooks: typed interceptors that wrap everything below a group.
//!
//! A group's hooks run in registration order, each one strictly around the
//! next. The first registered hook is outermost; the innermost link is the
//! matched handler (or the nested group the request descends into). A hook
//! that returns without calling [`Next::run`] ends the chain and its own
//! response travels back up.

use std::sync::Arc;

use crate::context::{CancelToken, RequestContext};
use crate::http::{Response, ResponseFuture};

/// Type-erased Before-hook for a group carrying data `D`.
pub type BeforeHook<D> = Arc<
    dyn Fn(CancelToken, RequestContext<D>, Next<D>) -> ResponseFuture + Send + Sync + 'static,
>;

/// What sits below the last hook: the leaf handler or a nested group.
pub(crate) type Inner<D> = Box<dyn FnOnce(CancelToken, RequestContext<D>) -> ResponseFuture + Send>;

/// Continuation handed to each Before-hook.
///
/// Consumed by [`run`](Self::run), so a hook can continue the chain at most once.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::{Response, Router, StatusCode};
///
/// let mut router = Router::new(|_req| 0_u32);
///
/// router.before(|cx, mut ctx, next| async move {
///     if ctx.header("authorization").is_none() {
///         return Response::text(StatusCode::Unauthorized, "sign in first");
///     }
///     *ctx.data_mut() += 1;
///     next.run(cx, ctx).await
/// });
/// ```
pub struct Next<D> {
    hooks: Vec<BeforeHook<D>>,
    // Tracks which hook to invoke on the next `run` call.
    index: usize,
    inner: Inner<D>,
}

impl<D: Send + 'static> Next<D> {
    pub(crate) fn new(hooks: Vec<BeforeHook<D>>, inner: Inner<D>) -> Self {
        Self {
            hooks,
            index: 0,
            inner,
        }
    }

    /// Runs the rest of the chain with `ctx` and returns its response.
    ///
    /// Advances to the next hook when one remains; otherwise calls the inner
    /// handler.
    pub async fn run(mut self, cx: CancelToken, ctx: RequestContext<D>) -> Response {
        let hook = self.hooks.get(self.index).cloned();
        match hook {
            Some(hook) => {
                self.index += 1;
                hook(cx, ctx, self).await
            }
            None => (self.inner)(cx, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::context::PathParams;
    use crate::http::{Request, StatusCode};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn ctx(value: u32) -> RequestContext<u32> {
        RequestContext::new(
            Arc::new(Request::new("GET", "/")),
            Arc::new(PathParams::new()),
            Arc::from("/"),
            value,
        )
    }

    fn recording_hook(log: &Log, name: &'static str) -> BeforeHook<u32> {
        let log = Arc::clone(log);
        Arc::new(
            move |cx: CancelToken,
                  mut ctx: RequestContext<u32>,
                  next: Next<u32>|
                  -> ResponseFuture {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().unwrap().push(name);
                    *ctx.data_mut() *= 10;
                    let response = next.run(cx, ctx).await;
                    log.lock().unwrap().push(name);
                    response
                })
            },
        )
    }

    fn leaf(log: &Log) -> Inner<u32> {
        let log = Arc::clone(log);
        Box::new(move |_: CancelToken, ctx: RequestContext<u32>| -> ResponseFuture {
            Box::pin(async move {
                log.lock().unwrap().push("leaf");
                Response::text(StatusCode::Ok, ctx.data().to_string())
            })
        })
    }

    #[tokio::test]
    async fn first_registered_hook_is_outermost() {
        let log: Log = Arc::default();
        let hooks = vec![recording_hook(&log, "a"), recording_hook(&log, "b")];

        let response = Next::new(hooks, leaf(&log)).run(CancelToken::new(), ctx(1)).await;

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "leaf", "b", "a"]);
        assert_eq!(&response.collect_body()[..], b"100");
    }

    #[tokio::test]
    async fn no_hooks_runs_inner_directly() {
        let log: Log = Arc::default();
        let response = Next::new(Vec::new(), leaf(&log)).run(CancelToken::new(), ctx(5)).await;
        assert_eq!(&response.collect_body()[..], b"5");
        assert_eq!(*log.lock().unwrap(), vec!["leaf"]);
    }

    #[tokio::test]
    async fn skipping_next_short_circuits() {
        let log: Log = Arc::default();
        let deny: BeforeHook<u32> =
            Arc::new(|_: CancelToken, _: RequestContext<u32>, _: Next<u32>| -> ResponseFuture {
                Box::pin(async { Response::text(StatusCode::Forbidden, "nope") })
            });
        let hooks = vec![deny, recording_hook(&log, "never")];

        let response = Next::new(hooks, leaf(&log)).run(CancelToken::new(), ctx(1)).await;

        assert_eq!(response.status(), StatusCode::Forbidden);
        assert_eq!(&response.collect_body()[..], b"nope");
        assert!(log.lock().unwrap().is_empty());
    }
}
