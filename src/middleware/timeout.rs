use std::time::Duration;

use tracing::warn;

use super::{Middleware, Next};
use crate::context::CancelToken;
use crate::http::{Request, Response, ResponseFuture, StatusCode};

/// Bounds how long the rest of the chain may take.
///
/// Everything downstream receives a token whose deadline is at most `limit`
/// away, or sooner when the incoming token already expires earlier. If no
/// response arrives by that deadline the downstream future is dropped and the
/// token is cancelled. The client then gets `504 Gateway Timeout`.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use strata::Router;
/// use strata::middleware::TimeoutMiddleware;
///
/// let mut router = Router::default();
/// router.middleware(TimeoutMiddleware::new(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    limit: Duration,
}

impl TimeoutMiddleware {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl Middleware for TimeoutMiddleware {
    fn handle(&self, cx: CancelToken, request: Request, next: Next) -> ResponseFuture {
        let limit = self.limit;
        Box::pin(async move {
            let scoped = cx.with_timeout(limit);
            // An earlier upstream deadline wins over our own limit.
            let wait = scoped.remaining().unwrap_or(limit);
            let method = request.method().clone();
            let path = request.path().to_owned();

            match tokio::time::timeout(wait, next.run(scoped.clone(), request)).await {
                Ok(response) => response,
                Err(_) => {
                    scoped.cancel();
                    warn!(method = %method, path = %path, waited = ?wait, "request timed out");
                    Response::text(StatusCode::GatewayTimeout, "request timed out")
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::middleware::tests::{body_of, run_chain};
    use crate::middleware::{from_fn, from_middleware};

    #[tokio::test]
    async fn fast_chain_passes_through() {
        let chain = vec![from_middleware(Arc::new(TimeoutMiddleware::new(
            Duration::from_secs(5),
        )))];
        let response = run_chain(chain, Request::new("GET", "/quick")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(&response), "GET /quick");
    }

    #[tokio::test]
    async fn slow_chain_gets_504_and_cancelled_token() {
        let seen: Arc<Mutex<Option<CancelToken>>> = Arc::default();
        let slot = Arc::clone(&seen);

        let slow = from_fn(move |cx: CancelToken, _, _| {
            *slot.lock().unwrap() = Some(cx.clone());
            async move {
                cx.cancelled().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Response::ok()
            }
        });
        let chain = vec![
            from_middleware(Arc::new(TimeoutMiddleware::new(Duration::from_millis(50)))),
            slow,
        ];

        let response = run_chain(chain, Request::new("GET", "/slow")).await;
        assert_eq!(response.status(), StatusCode::GatewayTimeout);
        assert_eq!(body_of(&response), "request timed out");

        let token = seen.lock().unwrap().take().unwrap();
        assert!(token.is_cancelled());
        assert!(token.deadline().is_some());
    }

    #[tokio::test]
    async fn keeps_an_earlier_upstream_deadline() {
        let outer = CancelToken::new().with_timeout(Duration::from_millis(10));
        let seen: Arc<Mutex<Option<CancelToken>>> = Arc::default();
        let slot = Arc::clone(&seen);

        let record = from_fn(move |cx: CancelToken, request, next: Next| {
            *slot.lock().unwrap() = Some(cx.clone());
            next.run(cx, request)
        });
        let chain = vec![
            from_middleware(Arc::new(TimeoutMiddleware::new(Duration::from_secs(60)))),
            record,
        ];

        Next::new(chain, crate::middleware::tests::echo_endpoint())
            .run(outer.clone(), Request::new("GET", "/"))
            .await;

        let token = seen.lock().unwrap().take().unwrap();
        assert_eq!(token.deadline(), outer.deadline());
    }

    #[tokio::test]
    async fn times_out_on_an_earlier_upstream_deadline() {
        let outer = CancelToken::new().with_timeout(Duration::from_millis(20));
        let slow = from_fn(|_, _, _| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Response::ok()
        });
        let chain = vec![
            from_middleware(Arc::new(TimeoutMiddleware::new(Duration::from_secs(60)))),
            slow,
        ];

        let run = Next::new(chain, crate::middleware::tests::echo_endpoint())
            .run(outer, Request::new("GET", "/slow"));
        let response = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("the upstream deadline should end the request");
        assert_eq!(response.status(), StatusCode::GatewayTimeout);
    }
}
