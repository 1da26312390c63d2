//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use vartunnel_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .immutable(true)
///     .request_timeout_ms(100)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn bind_addr(mut self, addr: &str) -> Self {
        self.config.server.bind_addr = addr.to_string();
        self
    }

    pub fn immutable(mut self, immutable: bool) -> Self {
        self.config.server.immutable = immutable;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.server.request_timeout_ms = ms;
        self
    }

    pub fn client_timeout_ms(mut self, ms: u64) -> Self {
        self.config.client.timeout_ms = ms;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
