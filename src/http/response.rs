//! Response builder.
//!
//! A [`Response`] accumulates a status, a multi-valued header map, and a body
//! made of chunks appended in call order. Building is transport independent:
//! [`Response::write_to`] replays it onto a [`ResponseSink`], and
//! [`Response::into_bytes`] serializes it in HTTP/1.1 wire format.

use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::{Headers, ResponseSink, StatusCode};

/// Boxed future every handler, hook and middleware resolves to.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// An HTTP response under construction.
///
/// The status defaults to `200 OK`. Each body write is kept as its own chunk,
/// so a sink sees the writes in the order they happened.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use strata::http::{Response, StatusCode};
///
/// let mut response = Response::new(StatusCode::Created).header("X-Id", "7");
/// write!(response, "hello ").unwrap();
/// write!(response, "world").unwrap();
///
/// assert_eq!(&response.collect_body()[..], b"hello world");
/// let text = String::from_utf8(response.into_bytes().to_vec()).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Content-Length: 11\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<Bytes>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Plain-text response with the given status.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
    }

    /// `200 OK` with the body `"OK"`.
    pub fn ok() -> Self {
        Self::text(StatusCode::Ok, "OK")
    }

    /// `302 Found` pointing at `to`, with a human-readable fallback body.
    pub fn redirect(to: &str) -> Self {
        Self::new(StatusCode::Found)
            .header("Location", to)
            .body(format!("redirecting to {to}"))
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Propagates the [`serde_json::Error`] if `value` cannot be serialized.
    pub fn json<T>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .header("Content-Type", "application/json")
            .body_bytes(body))
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place. Intended for middleware and hooks that receive
    /// a `Response` from downstream and need to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Replaces all values of a header in-place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Replaces the body with a string.
    #[must_use]
    pub fn body(self, body: impl Into<String>) -> Self {
        self.body_bytes(body.into())
    }

    /// Replaces the body with raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body.clear();
        if !body.is_empty() {
            self.body.push(body);
        }
        self
    }

    /// Appends a chunk after whatever was written so far.
    pub fn append(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.body.push(chunk);
        }
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Whether the connection may stay open after this response.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// The body chunks in write order.
    pub fn chunks(&self) -> &[Bytes] {
        &self.body
    }

    /// Total body length in bytes.
    pub fn body_len(&self) -> usize {
        self.body.iter().map(Bytes::len).sum()
    }

    /// Concatenates the body chunks into one buffer.
    pub fn collect_body(&self) -> Bytes {
        match self.body.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            chunks => {
                let mut buf = BytesMut::with_capacity(self.body_len());
                for chunk in chunks {
                    buf.put_slice(chunk);
                }
                buf.freeze()
            }
        }
    }

    /// Replays the response onto `sink`: status, then every header, then each
    /// body chunk in order.
    ///
    /// A response that refuses keep-alive carries `Connection: close` so the
    /// transport behind the sink can see it.
    pub fn write_to<S>(&self, sink: &mut S)
    where
        S: ResponseSink + ?Sized,
    {
        sink.write_status(self.status);
        for (name, value) in self.headers.iter() {
            sink.write_header(name, value);
        }
        if !self.keep_alive && !self.headers.contains("connection") {
            sink.write_header("Connection", "close");
        }
        for chunk in &self.body {
            sink.write_body(chunk);
        }
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written, any handler-set value is dropped).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body_len();

        if content_length > 0 && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers.remove("content-length");

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        for chunk in &self.body {
            buf.put_slice(chunk);
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

impl io::Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(Bytes::copy_from_slice(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::http::BufferedSink;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn default_status_is_ok() {
        let r = Response::default();
        assert_eq!(r.status(), StatusCode::Ok);
        assert_eq!(r.body_len(), 0);
    }

    #[test]
    fn simple_ok_response() {
        let s = to_string(Response::ok().into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 2\r\n"));
        assert!(s.ends_with("\r\n\r\nOK"));
    }

    #[test]
    fn redirect_sets_location_and_fallback_body() {
        let r = Response::redirect("/login");
        assert_eq!(r.status(), StatusCode::Found);
        assert_eq!(r.headers().get("location"), Some("/login"));
        assert_eq!(&r.collect_body()[..], b"redirecting to /login");
    }

    #[test]
    fn writes_append_in_call_order() {
        let mut r = Response::new(StatusCode::Ok);
        r.write_all(b"a").unwrap();
        r.append("b");
        write!(r, "{}", 'c').unwrap();
        assert_eq!(r.chunks().len(), 3);
        assert_eq!(&r.collect_body()[..], b"abc");
    }

    #[test]
    fn body_replaces_previous_writes() {
        let mut r = Response::new(StatusCode::Ok);
        r.append("stale");
        let r = r.body("fresh");
        assert_eq!(&r.collect_body()[..], b"fresh");
    }

    #[test]
    fn json_sets_content_type() {
        let r = Response::json(StatusCode::Created, &serde_json::json!({"id": 7})).unwrap();
        assert_eq!(r.headers().get("content-type"), Some("application/json"));
        assert_eq!(&r.collect_body()[..], br#"{"id":7}"#);
    }

    #[test]
    fn no_body_no_content_type() {
        let s = to_string(Response::new(StatusCode::NoContent).into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let s = to_string(Response::new(StatusCode::Ok).keep_alive(false).into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn write_to_replays_everything() {
        let mut r = Response::new(StatusCode::Forbidden)
            .header("X-A", "1")
            .header("X-A", "2");
        r.append("no");
        r.append("pe");

        let mut sink = BufferedSink::new();
        r.write_to(&mut sink);
        let replayed = sink.into_response();

        assert_eq!(replayed.status(), StatusCode::Forbidden);
        assert_eq!(replayed.headers().get_all("x-a").collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(replayed.chunks().len(), 2);
        assert_eq!(&replayed.collect_body()[..], b"nope");
        assert!(replayed.is_keep_alive());
    }

    #[test]
    fn unnamed_status_serializes_without_reason() {
        let status = StatusCode::try_from(418).unwrap();
        let bytes = Response::text(status, "short and stout").into_bytes();
        let s = std::str::from_utf8(&bytes).unwrap();
        assert!(s.starts_with("HTTP/1.1 418 \r\n"));
        assert!(s.ends_with("short and stout"));
    }

    #[test]
    fn write_to_carries_connection_close() {
        let mut sink = BufferedSink::new();
        Response::ok().keep_alive(false).write_to(&mut sink);
        let replayed = sink.into_response();

        assert!(!replayed.is_keep_alive());
        assert_eq!(replayed.headers().get("connection"), Some("close"));
    }
}
