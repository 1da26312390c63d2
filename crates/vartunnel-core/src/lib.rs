#![deny(unsafe_code)]

//! vartunnel core: an ephemeral, nonce-gated variable store served over HTTP.
//!
//! A parent process starts a [`TunnelServer`], receives the secret base URL
//! from [`TunnelServer::start`], and hands it to its children (usually via
//! `VARIABLE_TUNNEL_URL`). Children read and write dot-notation paths in the
//! shared [`Store`] through a [`TunnelClient`]. Nothing is persisted; the data
//! lives exactly as long as the listener.

/// Input coercion for values typed on a command line.
pub mod format;
/// Tree nodes backing the store.
pub mod node;
/// Per-server secret embedded in the tunnel URL.
pub mod nonce;
/// Dot-notation key/value store with optional immutability.
pub mod store;
/// HTTP endpoint, wire types, and client.
pub mod tunnel;

pub use format::{FormatError, ValueFormat};
pub use node::Node;
pub use nonce::Nonce;
pub use serde_json::Value;
pub use store::{SharedStore, Store, StoreError};
pub use tunnel::{
    ClientError, ClientFailure, RequestError, RunningTunnel, TUNNEL_URL_ENV, TunnelClient,
    TunnelError, TunnelServer,
};
