#![deny(unsafe_code)]

//! Shared test utilities for the vartunnel workspace.
//!
//! Provides reusable fixtures, config builders, and tracing helpers so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! vartunnel-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod tracing_setup;
pub mod tunnel;

pub use config::TestConfigBuilder;
pub use tracing_setup::init_test_tracing;
pub use tunnel::TestTunnel;
