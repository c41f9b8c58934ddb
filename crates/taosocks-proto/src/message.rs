//! Messages exchanged after the upgrade handshake.
//!
//! The client sends exactly one [`OpenMessage`], the server answers with
//! exactly one [`OpenAckMessage`], then both sides stream
//! [`RelayMessage`]s until either closes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Asks the server to connect to `addr` (`host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMessage {
    pub addr: String,
}

/// Server verdict on an [`OpenMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAckMessage {
    pub status: bool,
}

/// One chunk of the relayed byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub data: Bytes,
}

/// Every record on the wire carries its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelMessage {
    Open(OpenMessage),
    OpenAck(OpenAckMessage),
    Relay(RelayMessage),
}

impl TunnelMessage {
    /// Short name used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::OpenAck(_) => "open_ack",
            Self::Relay(_) => "relay",
        }
    }
}

impl From<OpenMessage> for TunnelMessage {
    fn from(msg: OpenMessage) -> Self {
        Self::Open(msg)
    }
}

impl From<OpenAckMessage> for TunnelMessage {
    fn from(msg: OpenAckMessage) -> Self {
        Self::OpenAck(msg)
    }
}

impl From<RelayMessage> for TunnelMessage {
    fn from(msg: RelayMessage) -> Self {
        Self::Relay(msg)
    }
}

impl OpenMessage {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl RelayMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}
