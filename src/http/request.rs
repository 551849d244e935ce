//! The transport-level request: HTTP/1.1 parsing via [`httparse`] plus the
//! accessors middleware and handlers read from.

use std::borrow::Cow;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A request as it arrives from the transport, before any typed data exists.
///
/// The path is kept exactly as received (still percent-encoded); the router
/// decodes each segment while matching. Query and form values are decoded on
/// lookup.
///
/// # Examples
///
/// ```
/// use strata::http::Request;
///
/// let raw = b"GET /hello?name=Fox%20Mulder HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name").as_deref(), Some("Fox Mulder"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator). The
    /// body is everything after that offset; callers that honour
    /// `Content-Length` should wait until enough bytes are buffered.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: more data is needed to complete the request headers.
    /// - [`RequestError::Parse`]: the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`]: a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = Method::from(
            raw_req
                .method
                .ok_or(RequestError::MissingField { field: "method" })?,
        );

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body_end = match header_map
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            Some(len) => body_offset.saturating_add(len).min(buf.len()),
            None => buf.len(),
        };

        let mut request = Self::new(method, target);
        request.version = version;
        request.headers = header_map;
        request.body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        Ok((request, body_offset))
    }

    /// Build a request by hand from a method and a request target
    /// (`/path?query`). Used by tests and by transports that do their own parsing.
    pub fn new(method: impl Into<Method>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        Self {
            method: method.into(),
            path,
            version: 1,
            headers: Headers::new(),
            query,
            body: Bytes::new(),
        }
    }

    /// Appends a header, builder style.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body, builder style.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Rewrites the method. Meant for transport middleware running ahead of dispatch.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Returns the request path (without the query string), still percent-encoded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rewrites the path, leaving the query string alone.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the first decoded value for `key` in the query string.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.query.as_deref().and_then(|q| first_value(q, key))
    }

    /// Returns the first decoded value for `key`, looking in an urlencoded
    /// body first and then in the query string.
    pub fn form_value(&self, key: &str) -> Option<String> {
        if self.is_form_encoded() {
            let body = String::from_utf8_lossy(&self.body);
            if let Some(value) = first_value(&body, key) {
                return Some(value);
            }
        }
        self.query_param(key)
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    fn is_form_encoded(&self) -> bool {
        self.headers
            .get("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    }
}

/// Decodes one `application/x-www-form-urlencoded` component: `+` becomes a
/// space, then percent escapes are resolved (invalid UTF-8 is replaced).
pub(crate) fn decode_component(raw: &str) -> String {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

fn first_value(encoded: &str, key: &str) -> Option<String> {
    encoded
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(k, _)| decode_component(k) == key)
        .map(|(_, v)| decode_component(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn parse_keeps_path_encoded() {
        let raw = b"GET /hello/Fox%20Mulder HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/hello/Fox%20Mulder");
    }

    #[test]
    fn query_values_are_decoded() {
        let raw = b"GET /search?q=rust+lang&tag=a%2Bb&tag=second HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.query_string(), Some("q=rust+lang&tag=a%2Bb&tag=second"));
        assert_eq!(req.query_param("q").as_deref(), Some("rust lang"));
        assert_eq!(req.query_param("tag").as_deref(), Some("a+b"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_rules() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn body_is_bounded_by_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n\r\n";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(&req.body()[..], b"hello");
        assert_eq!(&raw[body_offset..body_offset + 5], b"hello");
    }

    #[test]
    fn huge_content_length_keeps_what_was_buffered() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nab";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(usize::MAX));
        assert_eq!(&req.body()[..], b"ab");
        assert_eq!(body_offset, raw.len() - 2);
    }

    #[test]
    fn form_value_prefers_body_then_query() {
        let req = Request::new(Method::Post, "/items?_method=GET&page=2")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("_method=delete&title=Hello+World");
        assert_eq!(req.form_value("_method").as_deref(), Some("delete"));
        assert_eq!(req.form_value("title").as_deref(), Some("Hello World"));
        assert_eq!(req.form_value("page").as_deref(), Some("2"));
    }

    #[test]
    fn form_value_ignores_non_form_bodies() {
        let req = Request::new(Method::Post, "/items")
            .with_header("Content-Type", "application/json")
            .with_body("_method=delete");
        assert_eq!(req.form_value("_method"), None);
    }

    #[test]
    fn setters_rewrite_method_and_path() {
        let mut req = Request::new("POST", "/a//b?x=1");
        req.set_method(Method::Delete);
        req.set_path("/a/b");
        assert_eq!(req.method(), &Method::Delete);
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query_string(), Some("x=1"));
    }
}
