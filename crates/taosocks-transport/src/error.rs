//! Error types for the transport crate.

use taosocks_proto::ParseError;
use thiserror::Error;

/// Errors that can occur while establishing a tunnel.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("tunnel handshake timed out")]
    Timeout,

    #[error("upgrade refused: {status} {reason}")]
    UpgradeRejected { status: u16, reason: String },

    #[error("malformed upgrade response: {0}")]
    MalformedResponse(ParseError),

    #[error("server closed connection during upgrade")]
    Closed,
}
