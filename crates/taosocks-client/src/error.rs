//! Client error types.

use std::fmt;
use std::io;

use taosocks_core::errors;
use taosocks_proto::CodecError;
use taosocks_transport::TransportError;

/// Errors that can occur in the client outside a single relay.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("rules error: {0}")]
    Rules(#[from] taosocks_rules::RulesError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("SOCKS5 error: {0}")]
    Socks5(Socks5Error),

    #[error("SOCKS4 error: {0}")]
    Socks4(Socks4Error),

    #[error("HTTP proxy error: {0}")]
    Http(String),

    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
}

/// Classified outcome of a failed relay attempt.
///
/// Fallback and learning decisions branch on the variant, never on the
/// error message.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A static rule rejects the host.
    #[error("host rejected by rule")]
    Rejected,

    /// TLS, upgrade request or upgrade response failed. Says nothing about
    /// the target host.
    #[error("cannot dial remote server: {0}")]
    CannotDialRemoteServer(#[source] TransportError),

    /// The tunnel server answered the open request with a negative ack.
    #[error("remote proxy server cannot connect to the specified host")]
    RemoteCannotConnectHost,

    /// Direct TCP dial failed; the error is passed through unchanged.
    #[error("dial: {0}")]
    Dial(#[source] io::Error),

    /// Tunnel message exchange failed after the upgrade.
    #[error("tunnel protocol: {0}")]
    Protocol(#[from] CodecError),

    /// The front end's pre-relay reply failed.
    #[error("handshake reply: {0}")]
    HandshakeReply(#[source] io::Error),

    /// Every applicable relayer failed.
    #[error("no relayer can relay {host}: {cause}")]
    NoRelayer {
        host: String,
        #[source]
        cause: Box<RelayError>,
    },
}

impl RelayError {
    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected => errors::ERROR_REJECTED,
            Self::CannotDialRemoteServer(_) => errors::ERROR_REMOTE_DIAL,
            Self::RemoteCannotConnectHost => errors::ERROR_REMOTE_TARGET,
            Self::Dial(_) => errors::ERROR_DIRECT_DIAL,
            Self::Protocol(_) => errors::ERROR_PROTOCOL,
            Self::HandshakeReply(_) => errors::ERROR_REPLY,
            Self::NoRelayer { .. } => errors::ERROR_UNREACHABLE,
        }
    }

    /// The innermost classified failure.
    pub fn root_cause(&self) -> &RelayError {
        match self {
            Self::NoRelayer { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// SOCKS5 protocol errors.
#[derive(Debug)]
pub enum Socks5Error {
    InvalidVersion(u8),
    NoAcceptableMethods,
    UnsupportedCommand(u8),
    UnsupportedAddressType(u8),
    InvalidDomain,
}

impl fmt::Display for Socks5Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion(v) => write!(f, "invalid SOCKS version: 0x{v:02x}"),
            Self::NoAcceptableMethods => write!(f, "no acceptable authentication methods"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: 0x{c:02x}"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported address type: 0x{a:02x}"),
            Self::InvalidDomain => write!(f, "domain is not valid utf-8"),
        }
    }
}

impl std::error::Error for Socks5Error {}

impl From<Socks5Error> for ClientError {
    fn from(e: Socks5Error) -> Self {
        Self::Socks5(e)
    }
}

/// SOCKS4/4a protocol errors.
#[derive(Debug)]
pub enum Socks4Error {
    InvalidVersion(u8),
    UnsupportedCommand(u8),
    FieldTooLong,
    InvalidDomain,
    Truncated,
}

impl fmt::Display for Socks4Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion(v) => write!(f, "invalid SOCKS version: 0x{v:02x}"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: 0x{c:02x}"),
            Self::FieldTooLong => write!(f, "user id or domain too long"),
            Self::InvalidDomain => write!(f, "domain is not valid utf-8"),
            Self::Truncated => write!(f, "request truncated"),
        }
    }
}

impl std::error::Error for Socks4Error {}

impl From<Socks4Error> for ClientError {
    fn from(e: Socks4Error) -> Self {
        Self::Socks4(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels() {
        assert_eq!(RelayError::Rejected.kind(), "rejected");
        assert_eq!(RelayError::RemoteCannotConnectHost.kind(), "remote_target");
        assert_eq!(
            RelayError::CannotDialRemoteServer(TransportError::Timeout).kind(),
            "remote_dial"
        );
        assert_eq!(
            RelayError::Dial(io::Error::from(io::ErrorKind::ConnectionRefused)).kind(),
            "direct_dial"
        );
    }

    #[test]
    fn root_cause_unwraps_no_relayer() {
        let err = RelayError::NoRelayer {
            host: "example.com:443".into(),
            cause: Box::new(RelayError::RemoteCannotConnectHost),
        };
        assert_eq!(err.kind(), "unreachable");
        assert!(matches!(
            err.root_cause(),
            RelayError::RemoteCannotConnectHost
        ));
    }
}
