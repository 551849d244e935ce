//! The transport-facing end of a request: where a finished [`Response`] is
//! materialized.

use bytes::Bytes;
use tracing::warn;

use super::{Headers, Response, StatusCode};

/// A transport's response writer.
///
/// The router calls [`write_status`](Self::write_status) once, then
/// [`write_header`](Self::write_header) for every header value, then
/// [`write_body`](Self::write_body) for each body chunk in order.
pub trait ResponseSink {
    fn write_status(&mut self, status: StatusCode);

    fn write_header(&mut self, name: &str, value: &str);

    fn write_body(&mut self, chunk: &[u8]);
}

/// A sink that defers everything and hands back a [`Response`].
///
/// The server writes through one of these and serializes the result once the
/// router is done; tests use it as a response recorder.
///
/// # Examples
///
/// ```
/// use strata::http::{BufferedSink, ResponseSink, StatusCode};
///
/// let mut sink = BufferedSink::new();
/// sink.write_status(StatusCode::Accepted);
/// sink.write_header("X-Job", "42");
/// sink.write_body(b"queued");
///
/// let response = sink.into_response();
/// assert_eq!(response.status(), StatusCode::Accepted);
/// assert_eq!(&response.collect_body()[..], b"queued");
/// ```
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: Option<StatusCode>,
    headers: Headers,
    body: Vec<Bytes>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Rebuilds the response. A sink that never saw a status reports `200 OK`,
    /// and a `Connection: close` header turns keep-alive off.
    pub fn into_response(self) -> Response {
        let close = self
            .headers
            .get("connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("close"));
        let mut response =
            Response::new(self.status.unwrap_or(StatusCode::Ok)).keep_alive(!close);
        *response.headers_mut() = self.headers;
        for chunk in self.body {
            response.append(chunk);
        }
        response
    }
}

impl ResponseSink for BufferedSink {
    fn write_status(&mut self, status: StatusCode) {
        match self.status {
            Some(previous) => {
                warn!(%previous, ignored = %status, "status already written");
            }
            None => self.status = Some(status),
        }
    }

    fn write_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name, value);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.body.push(Bytes::copy_from_slice(chunk));
    }
}
