//! # taosocks
//!
//! A local proxy client that decides per host whether to connect directly or
//! through a TLS tunnel server, and learns from failed direct connections.
//!
//! ## Crates
//!
//! - [`taosocks_core`] - Defaults, error labels and stream adapters
//! - [`taosocks_proto`] - Tunnel messages, codec and upgrade handshake
//! - [`taosocks_transport`] - TLS tunnel connector
//! - [`taosocks_rules`] - Host classification and rule files
//! - [`taosocks_config`] - Configuration loading and validation
//! - [`taosocks_client`] - Relayers, front ends and the accept loop

pub use taosocks_client as client;
pub use taosocks_config as config;
pub use taosocks_core as core;
pub use taosocks_proto as proto;
pub use taosocks_rules as rules;
pub use taosocks_transport as transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use taosocks_client::{
        CancellationToken, ClientError, HandshakeReply, RelayError, Relayer, SmartRelayer, run,
    };
    pub use taosocks_config::{ClientConfig, load_config, validate_config};
    pub use taosocks_rules::{Classification, HostClassifier, HostFilter};
}
