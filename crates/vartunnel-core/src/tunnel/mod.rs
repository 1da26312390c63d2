//! Tunnel transport — nonce-gated HTTP/JSON over loopback TCP.
//!
//! The server owns a [`SharedStore`](crate::store::SharedStore) and answers
//! two requests, both addressed below the secret base URL:
//!
//! ```text
//! GET  /{nonce}/{dotted.path}                       → 200 {"key": ..., "value": ...}
//! POST /{nonce}/{dotted.path}  {"key": .., "value": ..} → 200 (empty)
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     127.0.0.1:{port}      ┌──────────────┐
//! │ TunnelClient │──────────────────────────▶│ TunnelServer │
//! │ (child proc) │  HTTP/1.1 + JSON          │   (axum)     │
//! └──────────────┘                           └──────┬───────┘
//!                                                   │
//!                                            ┌──────▼───────┐
//!                                            │ SharedStore  │
//!                                            └──────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{ClientError, ClientFailure, Operation, TUNNEL_URL_ENV, TunnelClient};
pub use server::{RequestError, RunningTunnel, TunnelError, TunnelServer};
pub use types::*;
