//! An in-process client for exercising a [`Router`] without a socket.
//!
//! Requests go through [`Router::serve_request`] into a [`BufferedSink`], so
//! middleware, hooks and the missing-route fallback all run exactly as they
//! would behind the server.
//!
//! ```
//! use strata::testing::Client;
//! use strata::{Response, Router, StatusCode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut router = Router::default();
//! router.get("/old", |_, _| async { Response::redirect("/new") });
//! router.get("/new", |_, _| async { Response::text(StatusCode::Ok, "moved in") });
//!
//! let client = Client::new(router);
//! let first = client.get("/old").await;
//! assert!(first.is_redirect());
//!
//! let second = client.follow_redirect(&first).await.unwrap();
//! assert!(second.is_ok());
//! assert_eq!(second.text(), "moved in");
//! # }
//! ```

use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::context::CancelToken;
use crate::http::{BufferedSink, Headers, Method, Request, Response, StatusCode};
use crate::router::Router;

/// Bytes left alone when encoding form fields; everything else is escaped.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const HOST: &str = "app.test";

/// Sends requests straight into a shared router.
pub struct Client<D> {
    router: Arc<Router<D>>,
}

impl<D> Clone for Client<D> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
        }
    }
}

impl<D: Send + 'static> Client<D> {
    pub fn new(router: Router<D>) -> Self {
        Self::shared(Arc::new(router))
    }

    /// Wraps a router that is already shared, e.g. with a running server.
    pub fn shared(router: Arc<Router<D>>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Arc<Router<D>> {
        &self.router
    }

    /// `GET path`. The path may carry a query string.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.get_with(path, &[]).await
    }

    /// `GET path` with extra request headers.
    pub async fn get_with(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.send(with_headers(Request::new(Method::Get, path), headers))
            .await
    }

    /// `POST path` with `fields` as an urlencoded form body.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.post_form_with(path, &[], fields).await
    }

    /// Like [`Client::post_form`], with extra request headers.
    pub async fn post_form_with(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = encode_form(fields);
        let request = with_headers(Request::new(Method::Post, path), headers)
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_header("Content-Length", body.len().to_string())
            .with_body(body);
        self.send(request).await
    }

    /// Issues a `GET` to the `Location` of `response`. Returns `None` when
    /// there is no `Location` header.
    pub async fn follow_redirect(&self, response: &TestResponse) -> Option<TestResponse> {
        let location = response.header("location")?.to_owned();
        Some(self.get(&location).await)
    }

    /// Sends a hand-built request. A `Host` header is added when missing.
    pub async fn send(&self, mut request: Request) -> TestResponse {
        if !request.headers().contains("host") {
            request.headers_mut().set("Host", HOST);
        }
        let mut sink = BufferedSink::new();
        self.router
            .serve_request(CancelToken::new(), request, &mut sink)
            .await;
        TestResponse {
            inner: sink.into_response(),
        }
    }
}

/// A response captured by [`Client`].
#[derive(Debug)]
pub struct TestResponse {
    inner: Response,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// `true` for 301, 302, 303, 307 and 308.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status().as_u16(), 301 | 302 | 303 | 307 | 308)
    }

    pub fn is_ok(&self) -> bool {
        self.status() == StatusCode::Ok
    }

    pub fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)
    }

    /// The body as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.inner.collect_body()).into_owned()
    }

    pub fn into_inner(self) -> Response {
        self.inner
    }
}

fn with_headers(mut request: Request, headers: &[(&str, &str)]) -> Request {
    for (name, value) in headers {
        request.headers_mut().insert(*name, *value);
    }
    request
}

fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, FORM),
                utf8_percent_encode(value, FORM)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::SlashNormalizer;

    #[derive(Debug, Clone)]
    struct Visitor {
        name: Option<String>,
    }

    fn app() -> Client<Visitor> {
        let mut router = Router::new(|req: &Request| Visitor {
            name: req.headers().get("x-name").map(str::to_owned),
        });
        router.middleware(SlashNormalizer);
        router.get("/whoami", |_, ctx| async move {
            let name = ctx.data().name.clone().unwrap_or_else(|| "nobody".to_owned());
            Response::text(StatusCode::Ok, name)
        });
        router.get("/host", |_, ctx| async move {
            Response::text(StatusCode::Ok, ctx.header("host").unwrap_or_default().to_owned())
        });
        router.post("/notes", |_, ctx| async move {
            let title = ctx.form_value("title").unwrap_or_default();
            let tag = ctx.form_value("tag").unwrap_or_default();
            let kind = ctx.header("content-type").unwrap_or_default().to_owned();
            Response::text(StatusCode::Created, format!("{title}|{tag}|{kind}"))
        });
        Client::new(router)
    }

    #[tokio::test]
    async fn get_runs_through_the_router() {
        let client = app();
        let response = client.get("/whoami").await;
        assert!(response.is_ok());
        assert_eq!(response.text(), "nobody");

        assert_eq!(client.get("/nowhere").await.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn get_with_passes_headers() {
        let response = app().get_with("/whoami", &[("X-Name", "scully")]).await;
        assert_eq!(response.text(), "scully");
    }

    #[tokio::test]
    async fn requests_carry_a_default_host() {
        let client = app();
        assert_eq!(client.get("/host").await.text(), "app.test");
        let custom = client.get_with("/host", &[("Host", "example.org")]).await;
        assert_eq!(custom.text(), "example.org");
    }

    #[tokio::test]
    async fn post_form_encodes_fields_and_sets_content_type() {
        let client = app();
        let response = client
            .post_form("/notes", &[("title", "a&b c"), ("tag", "x=y")])
            .await;
        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(response.text(), "a&b c|x=y|application/x-www-form-urlencoded");
    }

    #[tokio::test]
    async fn follow_redirect_gets_the_location() {
        let client = app();
        let first = client.get("//whoami").await;
        assert!(first.is_redirect());
        assert_eq!(first.header("location"), Some("/whoami"));

        let second = client.follow_redirect(&first).await.unwrap();
        assert!(second.is_ok());
        assert_eq!(second.text(), "nobody");
    }

    #[tokio::test]
    async fn unnamed_redirect_codes_count_as_redirects() {
        let mut router = Router::default();
        router.get("/r", |_, _| async {
            Response::new(StatusCode::Other(308)).header("Location", "/")
        });
        router.get("/multi", |_, _| async {
            Response::new(StatusCode::Other(300)).header("Location", "/")
        });
        let client = Client::new(router);

        assert!(client.get("/r").await.is_redirect());
        assert!(!client.get("/multi").await.is_redirect());
    }

    #[tokio::test]
    async fn follow_redirect_without_location_is_none() {
        let client = app();
        let response = client.get("/whoami").await;
        assert!(!response.is_redirect());
        assert!(client.follow_redirect(&response).await.is_none());
    }

    #[test]
    fn form_encoding_escapes_reserved_bytes() {
        assert_eq!(
            encode_form(&[("q", "rust lang"), ("a+b", "1=2&3"), ("name", "Zoë")]),
            "q=rust%20lang&a%2Bb=1%3D2%263&name=Zo%C3%AB"
        );
        assert_eq!(encode_form(&[]), "");
    }
}
