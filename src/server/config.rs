use std::time::Duration;

use serde::Deserialize;

/// Tunables for [`Server`](super::Server).
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```
/// use strata::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{ "request_timeout": 30 }"#).unwrap();
/// assert_eq!(config.max_request_size, 8 * 1024 * 1024);
/// assert_eq!(config.request_timeout().map(|t| t.as_secs()), Some(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest request (headers and body) buffered before answering `413`.
    pub max_request_size: usize,

    /// Initial read buffer capacity per connection.
    pub initial_buffer_size: usize,

    /// Per-request deadline in seconds, carried by the request's cancel token.
    pub request_timeout: Option<u64>,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_size: 8 * 1024 * 1024,
            initial_buffer_size: 4096,
            request_timeout: None,
        }
    }
}
