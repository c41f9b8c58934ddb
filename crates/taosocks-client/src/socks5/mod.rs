//! SOCKS5 front end (no authentication, CONNECT only).

pub mod handshake;

use std::io;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ClientError, RelayError, Socks5Error};
use crate::relayer::{ClientStream, HandshakeReply, Relayer, SmartRelayer};
use handshake::{
    CMD_CONNECT, REPLY_ADDRESS_TYPE_NOT_SUPPORTED, REPLY_COMMAND_NOT_SUPPORTED,
    REPLY_CONNECTION_NOT_ALLOWED, REPLY_GENERAL_FAILURE, REPLY_HOST_UNREACHABLE, REPLY_SUCCEEDED,
    send_reply_unspecified, unspecified_reply,
};

/// Handle a single SOCKS5 client connection.
pub async fn handle_socks5_conn(
    mut stream: TcpStream,
    relayer: &SmartRelayer,
) -> Result<(), ClientError> {
    handshake::negotiate_method(&mut stream).await?;

    let request = match handshake::read_request(&mut stream).await {
        Ok(req) => req,
        Err(Socks5Error::UnsupportedAddressType(atyp)) => {
            let _ = send_reply_unspecified(&mut stream, REPLY_ADDRESS_TYPE_NOT_SUPPORTED).await;
            return Err(Socks5Error::UnsupportedAddressType(atyp).into());
        }
        Err(e) => {
            let _ = send_reply_unspecified(&mut stream, REPLY_GENERAL_FAILURE).await;
            return Err(e.into());
        }
    };

    if request.command != CMD_CONNECT {
        let _ = send_reply_unspecified(&mut stream, REPLY_COMMAND_NOT_SUPPORTED).await;
        return Err(Socks5Error::UnsupportedCommand(request.command).into());
    }

    let target = request.target();
    debug!(target = %target, "CONNECT");

    relayer.relay(&target, stream, &mut Socks5Reply).await?;
    Ok(())
}

/// Success reply once the relayer is connected, failure reply otherwise.
pub struct Socks5Reply;

#[async_trait]
impl<S: ClientStream> HandshakeReply<S> for Socks5Reply {
    async fn before_relay(&mut self, relayer: &mut Relayer<S>) -> io::Result<()> {
        relayer.to_local(&unspecified_reply(REPLY_SUCCEEDED)).await
    }

    async fn on_failure(&mut self, client: &mut S, error: &RelayError) {
        let _ = send_reply_unspecified(client, reply_code_for(error)).await;
    }
}

fn reply_code_for(error: &RelayError) -> u8 {
    match error.root_cause() {
        RelayError::Rejected => REPLY_CONNECTION_NOT_ALLOWED,
        _ => REPLY_HOST_UNREACHABLE,
    }
}
