//! Tunnel transport for taosocks.
//!
//! [`TunnelConnector`] dials the tunnel server, completes the TLS handshake
//! and the HTTP upgrade exchange, and hands back a stream positioned at the
//! first tunnel message.
//!
//! - [`tls`]: rustls client configuration and socket options.
//! - [`tunnel`]: the connector itself.

pub mod error;
pub mod tls;
pub mod tunnel;

pub use error::TransportError;
pub use tls::{apply_tcp_options, build_tls_config, resolve_sni};
pub use tunnel::{TunnelConnector, TunnelStream};
