//! SOCKS4 / SOCKS4a front end (CONNECT only).

use std::io;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ClientError, RelayError, Socks4Error};
use crate::relayer::{ClientStream, HandshakeReply, Relayer, SmartRelayer};

pub const SOCKS4_VERSION: u8 = 0x04;
pub const CMD_CONNECT: u8 = 0x01;

pub const REPLY_GRANTED: u8 = 0x5A;
pub const REPLY_REJECTED: u8 = 0x5B;

/// Upper bound for the user id and the SOCKS4a domain.
const MAX_FIELD_LEN: usize = 255;

/// Parsed SOCKS4 request. `domain` is set for SOCKS4a.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    pub command: u8,
    pub port: u16,
    pub ip: Ipv4Addr,
    pub user_id: Vec<u8>,
    pub domain: Option<String>,
}

impl Socks4Request {
    pub fn target(&self) -> String {
        match &self.domain {
            Some(name) => format!("{name}:{}", self.port),
            None => format!("{}:{}", self.ip, self.port),
        }
    }
}

/// Read a SOCKS4 or SOCKS4a request.
pub async fn read_request<S>(stream: &mut S) -> Result<Socks4Request, Socks4Error>
where
    S: AsyncRead + Unpin,
{
    // VN CD DSTPORT(2) DSTIP(4)
    let mut header = [0u8; 8];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|_| Socks4Error::Truncated)?;

    if header[0] != SOCKS4_VERSION {
        return Err(Socks4Error::InvalidVersion(header[0]));
    }
    let command = header[1];
    if command != CMD_CONNECT {
        return Err(Socks4Error::UnsupportedCommand(command));
    }

    let port = u16::from_be_bytes([header[2], header[3]]);
    let ip = Ipv4Addr::new(header[4], header[5], header[6], header[7]);
    let user_id = read_null_terminated(stream).await?;

    // 0.0.0.x with x != 0 marks SOCKS4a: the domain follows the user id.
    let octets = ip.octets();
    let domain = if octets[..3] == [0, 0, 0] && octets[3] != 0 {
        let raw = read_null_terminated(stream).await?;
        Some(String::from_utf8(raw).map_err(|_| Socks4Error::InvalidDomain)?)
    } else {
        None
    };

    Ok(Socks4Request {
        command,
        port,
        ip,
        user_id,
        domain,
    })
}

async fn read_null_terminated<S>(stream: &mut S) -> Result<Vec<u8>, Socks4Error>
where
    S: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    loop {
        let b = stream.read_u8().await.map_err(|_| Socks4Error::Truncated)?;
        if b == 0 {
            return Ok(out);
        }
        if out.len() == MAX_FIELD_LEN {
            return Err(Socks4Error::FieldTooLong);
        }
        out.push(b);
    }
}

/// `00 CD 00 00 00 00 00 00`.
pub fn encode_reply(code: u8) -> [u8; 8] {
    [0x00, code, 0, 0, 0, 0, 0, 0]
}

async fn send_reply<S>(stream: &mut S, code: u8) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode_reply(code)).await?;
    stream.flush().await
}

/// Handle a single SOCKS4/4a client connection.
pub async fn handle_socks4_conn(
    mut stream: TcpStream,
    relayer: &SmartRelayer,
) -> Result<(), ClientError> {
    let request = match read_request(&mut stream).await {
        Ok(req) => req,
        Err(e) => {
            let _ = send_reply(&mut stream, REPLY_REJECTED).await;
            return Err(e.into());
        }
    };

    let target = request.target();
    debug!(target = %target, "SOCKS4 CONNECT");

    relayer.relay(&target, stream, &mut Socks4Reply).await?;
    Ok(())
}

pub struct Socks4Reply;

#[async_trait]
impl<S: ClientStream> HandshakeReply<S> for Socks4Reply {
    async fn before_relay(&mut self, relayer: &mut Relayer<S>) -> io::Result<()> {
        relayer.to_local(&encode_reply(REPLY_GRANTED)).await
    }

    async fn on_failure(&mut self, client: &mut S, _error: &RelayError) {
        let _ = send_reply(client, REPLY_REJECTED).await;
    }
}
