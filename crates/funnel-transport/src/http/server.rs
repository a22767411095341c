//! Axum-backed HTTP listener.
//!
//! Every method and path goes to a single fallback handler, which converts
//! the axum request into a Funnel [`Request`], runs it through the
//! [`Dispatcher`] and writes back the one [`Response`] the cycle produced.
//! Routing itself stays in the dispatcher so unmatched routes are reported
//! by the same error reporter as every other failure.

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body as AxumBody;
use axum::extract::{ConnectInfo, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use funnel_core::{Failure, Request, Response, StatusCode};
use funnel_framework::Dispatcher;
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::{TransportError, TransportResult};
use crate::listener::{Listener, ListenerHandle};

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// HTTP/1.1 listener.
#[derive(Debug, Clone)]
pub struct HttpServer {
    max_body_bytes: usize,
}

impl HttpServer {
    /// Creates a listener with the default body limit.
    pub fn new() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the largest accepted request body.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// The configured body limit.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for the axum handler.
struct ServerState {
    dispatcher: Dispatcher,
    max_body_bytes: usize,
}

#[async_trait]
impl Listener for HttpServer {
    async fn listen(&self, addr: &str, dispatcher: Dispatcher) -> TransportResult<ListenerHandle> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(ServerState {
            dispatcher,
            max_body_bytes: self.max_body_bytes,
        });
        let router = Router::new().fallback(http_dispatch).with_state(state);

        let shutdown_token = CancellationToken::new();
        let signal = shutdown_token.clone();

        info!(addr = %local_addr, max_body_bytes = self.max_body_bytes, "HTTP server listening");

        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(signal.cancelled_owned())
            .await;

            match result {
                Ok(()) => {
                    info!(addr = %local_addr, "HTTP server shut down");
                    Ok(())
                }
                Err(e) => {
                    error!(addr = %local_addr, error = %e, "HTTP server error");
                    Err(TransportError::Serve(e.to_string()))
                }
            }
        });

        Ok(ListenerHandle::new(
            format!("http-server-{local_addr}"),
            local_addr,
            shutdown_token,
            task,
        ))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Fallback handler for every inbound HTTP request.
async fn http_dispatch(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    trace!(remote_addr = %remote_addr, method = %parts.method, uri = %parts.uri, "Received HTTP request");

    let request = Request::new(parts.method, parts.uri.path()).with_headers(parts.headers);

    let response = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => state.dispatcher.dispatch(request.with_body(bytes)).await,
        Err(e) => {
            debug!(remote_addr = %remote_addr, error = %e, "Rejected request body");
            state.dispatcher.reject(request, body_failure(&e)).await
        }
    };

    into_http_response(response)
}

/// Classifies an error from reading the request body.
///
/// Only the configured length limit is a `413`; a truncated or otherwise
/// unreadable body is the client's malformed request.
fn body_failure(err: &axum::Error) -> Failure {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return Failure::new("payload too large").with_status(StatusCode::PAYLOAD_TOO_LARGE);
        }
        source = current.source();
    }
    Failure::bad_request("failed to read request body")
}

/// Serializes a Funnel response for axum.
fn into_http_response(response: Response) -> axum::response::Response {
    let (status, body) = response.into_parts();

    let bytes = match body.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            return (StatusCode::INTERNAL_SERVER_ERROR, Response::FALLBACK_TEXT).into_response();
        }
    };

    let mut http_response = axum::response::Response::new(AxumBody::from(bytes));
    *http_response.status_mut() = status;
    if let Some(content_type) = body.content_type() {
        http_response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    http_response
}
