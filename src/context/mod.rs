//! Per-request values handed to handlers and Before-hooks.
//!
//! A [`RequestContext`] is built fresh at every group boundary a request
//! passes through. It bundles the transport request, the parameters captured
//! by the matched route, the matched pattern, and that group's typed data.

mod cancel;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

pub use cancel::CancelToken;

use crate::http::{Headers, Method, Request};

/// Named path captures from the matched route, already percent-decoded.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Returns the captured value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The request as seen by one group: transport request, route captures,
/// matched pattern, and the group's data payload `D`.
///
/// The context is owned by the call frame it was handed to. Before-hooks may
/// change [`data_mut`](Self::data_mut) and pass the context on through
/// [`Next::run`](crate::router::Next::run); a nested group receives the data
/// by value through its transform.
pub struct RequestContext<D> {
    request: Arc<Request>,
    params: Arc<PathParams>,
    pattern: Arc<str>,
    data: D,
}

impl<D> RequestContext<D> {
    pub(crate) fn new(
        request: Arc<Request>,
        params: Arc<PathParams>,
        pattern: Arc<str>,
        data: D,
    ) -> Self {
        Self {
            request,
            params,
            pattern,
            data,
        }
    }

    /// The transport request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The full pattern of the route that matched, e.g. `/users/:id`. Empty
    /// for the missing-route fallback.
    pub fn matched_pattern(&self) -> &str {
        &self.pattern
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn into_data(self) -> D {
        self.data
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn headers(&self) -> &Headers {
        self.request.headers()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.request.query_param(key)
    }

    pub fn form_value(&self, key: &str) -> Option<String> {
        self.request.form_value(key)
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
