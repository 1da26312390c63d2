//! Tunnel server — axum HTTP endpoint on an ephemeral loopback port.
//!
//! A server moves through three states, each its own type:
//!
//! ```text
//! TunnelServer ──start()──▶ RunningTunnel ──stop()──▶ (consumed)
//!  nonce + store             listening, URL known
//! ```
//!
//! Every request is gated on the nonce in the first path segment. The second
//! segment is the dotted field path; anything after it is ignored.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use vartunnel_config::{ConfigError, ServerConfig};

use super::types::{GetResponse, SetRequest};
use crate::nonce::Nonce;
use crate::store::{SharedStore, Store, StoreError};

/// Errors from starting or running the tunnel server.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("invalid server configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind tunnel listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("tunnel server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("tunnel server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Request-scoped failures. Each one becomes an HTTP response and leaves the
/// server untouched.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid Nonce")]
    InvalidNonce,

    #[error("Unable to save data: {0}")]
    Parse(serde_json::Error),

    #[error("Unable to save data: {0}")]
    Store(#[from] StoreError),

    #[error("Unable to save data: {0}")]
    BodyRead(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::InvalidNonce => StatusCode::FORBIDDEN,
            RequestError::Parse(_) | RequestError::Store(_) | RequestError::BodyRead(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RequestError::Timeout => StatusCode::REQUEST_TIMEOUT,
            RequestError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Shared state accessible to the request handler.
pub struct TunnelState {
    pub nonce: Nonce,
    pub store: SharedStore,
    pub request_timeout: Duration,
}

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
struct ShutdownSignal;

/// Build the axum router. Every path goes through the nonce check, so the
/// whole API is a single fallback handler.
pub fn router(state: Arc<TunnelState>) -> axum::Router {
    axum::Router::new()
        .fallback(handle_request)
        .with_state(state)
}

/// A tunnel that has generated its nonce and owns its store but is not yet
/// accepting connections.
pub struct TunnelServer {
    state: Arc<TunnelState>,
    bind_ip: IpAddr,
}

impl TunnelServer {
    /// Create a server with an empty store.
    pub fn new(config: &ServerConfig) -> Result<Self, TunnelError> {
        Self::with_data(Map::new(), config)
    }

    /// Create a server whose store starts out holding `data`.
    pub fn with_data(data: Map<String, Value>, config: &ServerConfig) -> Result<Self, TunnelError> {
        let bind_ip = config.bind_ip()?;
        let store = SharedStore::new(Store::with_data(data, config.immutable));
        Ok(Self {
            state: Arc::new(TunnelState {
                nonce: Nonce::generate(),
                store,
                request_timeout: config.request_timeout(),
            }),
            bind_ip,
        })
    }

    /// The store this server will serve.
    pub fn store(&self) -> &SharedStore {
        &self.state.store
    }

    /// Bind an OS-assigned port and start serving in a background task.
    pub async fn start(self) -> Result<RunningTunnel, TunnelError> {
        let listener = TcpListener::bind(SocketAddr::new(self.bind_ip, 0))
            .await
            .map_err(TunnelError::Bind)?;
        let addr = listener.local_addr().map_err(TunnelError::Bind)?;
        let url = Zeroizing::new(format!("http://{addr}/{}/", self.state.nonce.as_str()));

        info!(
            %addr,
            immutable = self.state.store.is_immutable(),
            "Tunnel server listening"
        );

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let app = router(Arc::clone(&self.state));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    debug!("Tunnel server shutting down");
                })
                .await
        });

        Ok(RunningTunnel {
            url,
            addr,
            store: self.state.store.clone(),
            shutdown_tx,
            handle,
            grace: self.state.request_timeout,
        })
    }
}

/// A listening tunnel. Consumed by [`RunningTunnel::stop`].
pub struct RunningTunnel {
    url: Zeroizing<String>,
    addr: SocketAddr,
    store: SharedStore,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    handle: JoinHandle<std::io::Result<()>>,
    grace: Duration,
}

impl RunningTunnel {
    /// Base URL including the nonce, e.g. `http://127.0.0.1:40123/<nonce>/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The live store behind this tunnel.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Close the listening socket and wait for in-flight requests to finish.
    ///
    /// Connections still open after the request timeout (typically a client
    /// that never finished sending its request) are abandoned.
    pub async fn stop(mut self) -> Result<(), TunnelError> {
        let _ = self.shutdown_tx.send(ShutdownSignal);
        match tokio::time::timeout(self.grace, &mut self.handle).await {
            Ok(joined) => joined?.map_err(TunnelError::Serve)?,
            Err(_) => {
                warn!(
                    addr = %self.addr,
                    grace_ms = self.grace.as_millis() as u64,
                    "Connections still open after shutdown grace period, abandoning them"
                );
                self.handle.abort();
            }
        }
        info!(addr = %self.addr, "Tunnel server stopped");
        Ok(())
    }
}

// ── Request handling ────────────────────────────────────────────────────

async fn handle_request(
    State(state): State<Arc<TunnelState>>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Response {
    let mut segments = uri.path().split('/').skip(1);
    let presented = segments.next().unwrap_or_default();
    let field = segments.next().unwrap_or_default();

    if !state.nonce.matches(presented) {
        warn!(%method, "Rejected request with invalid nonce");
        return RequestError::InvalidNonce.into_response();
    }

    let result = match method {
        Method::GET => Ok(handle_get(&state, field)),
        Method::POST => handle_post(&state, field, body).await,
        other => Err(RequestError::MethodNotAllowed(other)),
    };

    result.unwrap_or_else(|err| {
        debug!(field, status = %err.status(), error = %err, "Request failed");
        err.into_response()
    })
}

fn handle_get(state: &TunnelState, field: &str) -> Response {
    let value = state.store.get(field);
    debug!(field, found = value.is_some(), "Read value");
    Json(GetResponse {
        key: field.to_string(),
        value,
    })
    .into_response()
}

async fn handle_post(state: &TunnelState, field: &str, body: Body) -> Result<Response, RequestError> {
    let bytes = tokio::time::timeout(state.request_timeout, axum::body::to_bytes(body, usize::MAX))
        .await
        .map_err(|_| RequestError::Timeout)?
        .map_err(|e| RequestError::BodyRead(e.to_string()))?;

    let parsed: Value = serde_json::from_slice(&bytes).map_err(RequestError::Parse)?;
    let request = SetRequest::from_body(parsed);
    state.store.set(field, request.value)?;
    debug!(field, bytes = bytes.len(), "Stored value");
    Ok(StatusCode::OK.into_response())
}
