//! Tunnel client — one HTTP request per operation, no retries.
//!
//! The base URL normally comes from `VARIABLE_TUNNEL_URL`, which the parent
//! process exports after starting a tunnel. Fields are resolved relative to
//! it, so the base must keep its trailing slash.

use std::fmt;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::types::{GetResponse, SetRequest};

/// Environment variable a tunnel's URL is published in.
pub const TUNNEL_URL_ENV: &str = "VARIABLE_TUNNEL_URL";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// The operation a [`ClientError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Set,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Get => "get",
            Operation::Set => "set",
        })
    }
}

/// A failed get or set, qualified by the field it was for.
#[derive(Debug, thiserror::Error)]
#[error("Unable to {op} value of \"{field}\" - {cause}")]
pub struct ClientError {
    pub op: Operation,
    pub field: String,
    #[source]
    pub cause: ClientFailure,
}

/// Why a tunnel request failed.
#[derive(Debug, thiserror::Error)]
pub enum ClientFailure {
    #[error("no tunnel URL configured (set VARIABLE_TUNNEL_URL or pass --server)")]
    NoServer,

    #[error("invalid tunnel URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Network(reqwest::Error),

    #[error("{status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("response did not contain a value")]
    MissingValue,

    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl ClientFailure {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientFailure::Timeout
        } else {
            ClientFailure::Network(err)
        }
    }
}

/// Client for a running tunnel.
#[derive(Debug, Clone)]
pub struct TunnelClient {
    base_url: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl TunnelClient {
    /// Create a client for the tunnel at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_base(Some(base_url.into()))
    }

    /// Create a client from `VARIABLE_TUNNEL_URL`. A missing variable is
    /// reported on the first request.
    pub fn from_env() -> Self {
        Self::with_base(std::env::var(TUNNEL_URL_ENV).ok())
    }

    /// Use `base_url` when given, otherwise fall back to the environment.
    pub fn from_url_or_env(base_url: Option<String>) -> Self {
        match base_url {
            Some(url) => Self::new(url),
            None => Self::from_env(),
        }
    }

    fn with_base(base_url: Option<String>) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the value stored at `field`.
    pub async fn get(&self, field: &str) -> Result<Value, ClientError> {
        self.try_get(field).await.map_err(|cause| ClientError {
            op: Operation::Get,
            field: field.to_string(),
            cause,
        })
    }

    /// Store `value` at `field`.
    pub async fn set(&self, field: &str, value: Value) -> Result<(), ClientError> {
        self.try_set(field, value).await.map_err(|cause| ClientError {
            op: Operation::Set,
            field: field.to_string(),
            cause,
        })
    }

    async fn try_get(&self, field: &str) -> Result<Value, ClientFailure> {
        let url = self.field_url(field)?;
        debug!(field, "Tunnel get");

        let resp = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(ClientFailure::from_reqwest)?;
        let resp = check_status(resp).await?;

        let body: GetResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                ClientFailure::Timeout
            } else {
                ClientFailure::Decode(e.to_string())
            }
        })?;
        body.value.ok_or(ClientFailure::MissingValue)
    }

    async fn try_set(&self, field: &str, value: Value) -> Result<(), ClientFailure> {
        let url = self.field_url(field)?;
        debug!(field, "Tunnel set");

        let request = SetRequest {
            key: Some(field.to_string()),
            value,
        };
        let resp = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(ClientFailure::from_reqwest)?;
        check_status(resp).await?;
        Ok(())
    }

    fn field_url(&self, field: &str) -> Result<Url, ClientFailure> {
        let base = self.base_url.as_deref().ok_or(ClientFailure::NoServer)?;
        Url::parse(base)
            .and_then(|base| base.join(field))
            .map_err(|e| ClientFailure::InvalidUrl(e.to_string()))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientFailure> {
    let status = resp.status();
    if status == StatusCode::OK {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientFailure::Status { status, body })
}
