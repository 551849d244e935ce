//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests either to a bare
//! handler function ([`Server::run`]) or through a [`Router`] ([`Server::serve`]).
//! Supports HTTP/1.1 persistent connections (keep-alive) out of the box.

mod config;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub use config::ServerConfig;

use crate::context::CancelToken;
use crate::http::{
    BufferedSink, StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The strata HTTP server.
///
/// Binds to a TCP address and dispatches incoming HTTP/1.1 requests.
///
/// # Examples
///
/// ```rust,no_run
/// use strata::{Response, Router, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::default();
///     router.get("/", |_cx, _ctx| async { Response::ok() });
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.serve(router).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Binds the server to the given TCP address with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        Self::bind_with(addr, ServerConfig::default()).await
    }

    /// Binds the server to the given TCP address with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind_with(
        addr: impl AsRef<str>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves every request through `router`.
    ///
    /// Each request gets a fresh [`CancelToken`], carrying a deadline when
    /// [`ServerConfig::request_timeout`] is set. The router writes into a
    /// [`BufferedSink`] whose contents are then serialized onto the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve<D: Send + 'static>(self, router: Router<D>) -> Result<(), ServerError> {
        let router = Arc::new(router);
        let timeout = self.config.request_timeout();

        self.run(move |request: Request| {
            let router = Arc::clone(&router);
            let cx = match timeout {
                Some(timeout) => CancelToken::new().with_timeout(timeout),
                None => CancelToken::new(),
            };

            async move {
                let mut sink = BufferedSink::new();
                router.serve_request(cx, request, &mut sink).await;
                sink.into_response()
            }
        })
        .await
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler receives a [`Request`] and must return a [`Future`] that
    /// resolves to a [`Response`]. The handler is wrapped in an [`Arc`] and
    /// shared across all spawned Tokio tasks, so it must be `Send + Sync + 'static`.
    ///
    /// This method runs until the process is terminated or an unrecoverable
    /// listener error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let config = Arc::new(self.config);
        info!(address = %self.local_addr, "strata listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);
            let config = Arc::clone(&config);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler, &config).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    config: &ServerConfig,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(config.initial_buffer_size);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > config.max_request_size {
            reject_too_large(&mut stream, peer_addr, config).await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                // Headers not yet fully received.
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                let response =
                    Response::text(StatusCode::BadRequest, format!("Bad Request: {e}"))
                        .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        // A declared body that could never fit is refused before waiting for it.
        let content_length = request.content_length().unwrap_or(0);
        let Some(total_needed) = body_offset
            .checked_add(content_length)
            .filter(|&total| total <= config.max_request_size)
        else {
            reject_too_large(&mut stream, peer_addr, config).await?;
            break;
        };

        // Wait for the full body to arrive if Content-Length is set.
        if buf.len() < total_needed {
            continue;
        }

        let wants_keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = handler(request).await;
        let keep_alive = wants_keep_alive && response.is_keep_alive();
        let response = response.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        // Drop the consumed request bytes from the buffer.
        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}

async fn reject_too_large(
    stream: &mut TcpStream,
    peer_addr: SocketAddr,
    config: &ServerConfig,
) -> Result<(), std::io::Error> {
    warn!(peer = %peer_addr, limit = config.max_request_size, "request too large, sending 413");
    let response =
        Response::text(StatusCode::PayloadTooLarge, "Request entity too large").keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}
