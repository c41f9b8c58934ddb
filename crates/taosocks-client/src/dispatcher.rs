//! Routes an accepted connection to the matching front-end decoder.

use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ClientError;
use crate::http::handle_http_conn;
use crate::relayer::SmartRelayer;
use crate::socks4::{SOCKS4_VERSION, handle_socks4_conn};
use crate::socks5::handle_socks5_conn;
use crate::socks5::handshake::SOCKS5_VERSION;

/// Front-end protocol spoken by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEnd {
    Socks4,
    Socks5,
    Http,
}

impl FrontEnd {
    /// Pick the protocol from the first byte the client sent.
    pub fn detect(first: u8) -> Self {
        match first {
            SOCKS4_VERSION => Self::Socks4,
            SOCKS5_VERSION => Self::Socks5,
            _ => Self::Http,
        }
    }
}

/// Serve one client connection to completion.
pub async fn handle_conn(stream: TcpStream, relayer: Arc<SmartRelayer>) {
    if let Err(e) = dispatch(stream, &relayer).await {
        debug!(error = %e, "connection error");
    }
}

async fn dispatch(stream: TcpStream, relayer: &SmartRelayer) -> Result<(), ClientError> {
    let mut first = [0u8; 1];
    if stream.peek(&mut first).await? == 0 {
        return Ok(());
    }

    match FrontEnd::detect(first[0]) {
        FrontEnd::Socks4 => handle_socks4_conn(stream, relayer).await,
        FrontEnd::Socks5 => handle_socks5_conn(stream, relayer).await,
        FrontEnd::Http => handle_http_conn(stream, relayer).await,
    }
}
