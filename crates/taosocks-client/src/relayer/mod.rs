//! Relayers move bytes between a client stream and its target.
//!
//! A [`Relayer`] is chosen once per attempt: [`Relayer::Local`] dials the
//! target directly, [`Relayer::Remote`] goes through the tunnel server.
//! Both follow the same lifecycle:
//!
//! 1. [`Relayer::begin`] connects and completes any handshake. On failure
//!    the client stream stays inside the relayer and can be taken back with
//!    [`Relayer::take_client`].
//! 2. The front end may write protocol replies with [`Relayer::to_local`] /
//!    [`Relayer::to_remote`].
//! 3. [`Relayer::relay`] copies both ways and returns a [`RelayResult`]
//!    once every socket it owned is released.

mod copy;
mod local;
mod remote;
mod smart;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use taosocks_config::TcpConfig;
use taosocks_transport::TunnelConnector;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

pub use local::LocalRelayer;
pub use remote::RemoteRelayer;
pub use smart::{HandshakeReply, SmartRelayer, split_host_port};

use crate::error::RelayError;
use copy::CopyOutcome;

/// Any byte stream a front end can hand to a relayer.
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> ClientStream for T {}

/// Which way a relayer reaches the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayerKind {
    Local,
    Remote,
}

impl RelayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "direct",
            Self::Remote => "proxy",
        }
    }
}

impl fmt::Display for RelayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one relay: bytes moved each way and the error, if any, that
/// ended each direction.
#[derive(Debug, Default)]
pub struct RelayResult {
    /// Client to target.
    pub tx: u64,
    /// Target to client.
    pub rx: u64,
    pub tx_error: Option<io::Error>,
    pub rx_error: Option<io::Error>,
}

impl RelayResult {
    fn from_outcomes(tx: CopyOutcome, rx: CopyOutcome) -> Self {
        Self {
            tx: tx.bytes,
            rx: rx.bytes,
            tx_error: tx.error,
            rx_error: rx.error,
        }
    }

    fn not_started() -> Self {
        Self {
            tx_error: Some(not_connected()),
            rx_error: Some(not_connected()),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.tx_error.is_none() && self.rx_error.is_none()
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "relayer has not begun")
}

/// A direct or tunneled relayer for one client connection.
pub enum Relayer<S> {
    Local(LocalRelayer<S>),
    Remote(RemoteRelayer<S>),
}

impl<S> fmt::Debug for Relayer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Relayer").field(&self.kind()).finish()
    }
}

impl<S: ClientStream> Relayer<S> {
    /// Relayer that dials targets directly.
    pub fn local(dial_timeout: Duration, tcp_config: TcpConfig) -> Self {
        Self::Local(LocalRelayer::new(dial_timeout, tcp_config))
    }

    /// Relayer that reaches targets through the tunnel server.
    pub fn remote(connector: Arc<TunnelConnector>) -> Self {
        Self::Remote(RemoteRelayer::new(connector))
    }

    /// Connect to `addr` (`host:port`) on behalf of `src`.
    pub async fn begin(&mut self, addr: &str, src: S) -> Result<(), RelayError> {
        match self {
            Self::Local(r) => r.begin(addr, src).await,
            Self::Remote(r) => r.begin(addr, src).await,
        }
    }

    /// Write `data` to the client.
    pub async fn to_local(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Local(r) => r.to_local(data).await,
            Self::Remote(r) => r.to_local(data).await,
        }
    }

    /// Write `data` towards the target.
    pub async fn to_remote(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Local(r) => r.to_remote(data).await,
            Self::Remote(r) => r.to_remote(data).await,
        }
    }

    /// Take the client stream back, typically after a failed `begin`.
    pub fn take_client(&mut self) -> Option<S> {
        match self {
            Self::Local(r) => r.take_client(),
            Self::Remote(r) => r.take_client(),
        }
    }

    /// Drop every stream the relayer holds.
    pub fn close(&mut self) {
        match self {
            Self::Local(r) => r.close(),
            Self::Remote(r) => r.close(),
        }
    }

    /// Copy until both directions end, then release both streams.
    pub async fn relay(self, addr: &str) -> RelayResult {
        let route = self.kind();
        info!(target = %addr, route = route.as_str(), "relay start");

        let result = match self {
            Self::Local(r) => r.relay().await,
            Self::Remote(r) => r.relay().await,
        };

        debug!(
            target = %addr,
            route = route.as_str(),
            tx = result.tx,
            rx = result.rx,
            tx_error = ?result.tx_error,
            rx_error = ?result.rx_error,
            "relay end"
        );
        result
    }
}

impl<S> Relayer<S> {
    pub fn kind(&self) -> RelayerKind {
        match self {
            Self::Local(_) => RelayerKind::Local,
            Self::Remote(_) => RelayerKind::Remote,
        }
    }
}
