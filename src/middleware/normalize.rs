use super::{Middleware, Next};
use crate::context::CancelToken;
use crate::http::{Request, Response, ResponseFuture, StatusCode};

/// Redirects paths containing repeated slashes to their collapsed form.
///
/// `GET //users///7?tab=posts` is answered with `301 Moved Permanently` and
/// `Location: /users/7?tab=posts`; the rest of the chain does not run. Clean
/// paths pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlashNormalizer;

impl Middleware for SlashNormalizer {
    fn handle(&self, cx: CancelToken, request: Request, next: Next) -> ResponseFuture {
        Box::pin(async move {
            if !request.path().contains("//") {
                return next.run(cx, request).await;
            }

            let mut location = collapse_slashes(request.path());
            if let Some(query) = request.query_string() {
                location.push('?');
                location.push_str(query);
            }

            Response::new(StatusCode::MovedPermanently).header("Location", location)
        })
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::middleware::from_middleware;
    use crate::middleware::tests::{body_of, run_chain};

    #[test]
    fn collapses_runs() {
        assert_eq!(collapse_slashes("//hello"), "/hello");
        assert_eq!(collapse_slashes("/a///b//c/"), "/a/b/c/");
        assert_eq!(collapse_slashes("/clean"), "/clean");
    }

    #[tokio::test]
    async fn redirects_double_slash_without_running_chain() {
        let chain = vec![from_middleware(Arc::new(SlashNormalizer))];
        let response = run_chain(chain, Request::new("GET", "//hello")).await;

        assert_eq!(response.status(), StatusCode::MovedPermanently);
        assert_eq!(response.headers().get("location"), Some("/hello"));
        assert!(response.collect_body().is_empty());
    }

    #[tokio::test]
    async fn redirect_keeps_query() {
        let chain = vec![from_middleware(Arc::new(SlashNormalizer))];
        let response = run_chain(chain, Request::new("GET", "/users//7?tab=posts")).await;
        assert_eq!(response.headers().get("location"), Some("/users/7?tab=posts"));
    }

    #[tokio::test]
    async fn clean_path_passes_through() {
        let chain = vec![from_middleware(Arc::new(SlashNormalizer))];
        let response = run_chain(chain, Request::new("GET", "/hello")).await;

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body_of(&response), "GET /hello");
    }
}
