//! Running-tunnel fixture.
//!
//! [`TestTunnel`] starts a real server on an ephemeral loopback port with the
//! given initial data and hands out URLs and clients pointed at it.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use vartunnel_config::AppConfig;
use vartunnel_core::{RunningTunnel, SharedStore, TunnelClient, TunnelServer};

/// Upper bound on [`TestTunnel::stop`].
pub const STOP_DEADLINE: Duration = Duration::from_secs(10);

/// A started tunnel for tests. Call [`TestTunnel::stop`] to shut it down
/// cleanly; otherwise it lives until the test runtime ends.
pub struct TestTunnel {
    running: RunningTunnel,
    config: AppConfig,
}

impl TestTunnel {
    /// Start a mutable tunnel holding `data`, which must be a JSON object.
    pub async fn start(data: Value) -> Self {
        Self::start_with(data, AppConfig::default()).await
    }

    /// Start a tunnel holding `data` with the given configuration.
    pub async fn start_with(data: Value, config: AppConfig) -> Self {
        let Value::Object(map) = data else {
            panic!("tunnel test data must be a JSON object");
        };
        let server =
            TunnelServer::with_data(map, &config.server).expect("invalid test server config");
        let running = server.start().await.expect("failed to start test tunnel");
        debug!(addr = %running.addr(), immutable = config.server.immutable, "Test tunnel started");
        Self { running, config }
    }

    /// Base URL with the real nonce.
    pub fn url(&self) -> &str {
        self.running.url()
    }

    /// Path component of the base URL, `/{nonce}/`.
    pub fn base_path(&self) -> String {
        let authority = format!("http://{}", self.running.addr());
        self.url()[authority.len()..].to_string()
    }

    /// Base URL for the same server with a different nonce.
    pub fn url_with_nonce(&self, nonce: &str) -> String {
        format!("http://{}/{nonce}/", self.running.addr())
    }

    /// A client for this tunnel using the configured client timeout.
    pub fn client(&self) -> TunnelClient {
        TunnelClient::new(self.url()).with_timeout(self.config.client.timeout())
    }

    pub fn store(&self) -> &SharedStore {
        self.running.store()
    }

    pub fn port(&self) -> u16 {
        self.running.addr().port()
    }

    /// Stop the tunnel, failing the test if shutdown takes longer than
    /// [`STOP_DEADLINE`].
    pub async fn stop(self) {
        let addr = self.running.addr();
        tokio::time::timeout(STOP_DEADLINE, self.running.stop())
            .await
            .expect("test tunnel did not stop in time")
            .expect("failed to stop test tunnel");
        debug!(%addr, "Test tunnel stopped");
    }
}
