//! HTTP proxy front end.
//!
//! `CONNECT host:port` becomes a raw tunnel after a `200` reply. Any other
//! method must carry an absolute-form URI; its head is rewritten to
//! origin-form and sent ahead of the relayed body.

use std::fmt::Write as _;
use std::io;

use async_trait::async_trait;
use bytes::BytesMut;
use taosocks_core::MAX_HTTP_HEADER_BYTES;
use taosocks_core::io::PrefixedStream;
use taosocks_proto::ParseResult;
use taosocks_proto::http::{RequestHead, parse_request_head};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ClientError, RelayError};
use crate::relayer::{ClientStream, HandshakeReply, Relayer, SmartRelayer, split_host_port};

pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";
const BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
const BAD_GATEWAY: &[u8] =
    b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Handle a single HTTP proxy client connection.
pub async fn handle_http_conn(
    mut stream: TcpStream,
    relayer: &SmartRelayer,
) -> Result<(), ClientError> {
    let mut buf = BytesMut::with_capacity(4096);
    let head = loop {
        match parse_request_head(&buf, MAX_HTTP_HEADER_BYTES) {
            ParseResult::Complete(head) => break head,
            ParseResult::Incomplete(_) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    return Err(ClientError::Http(
                        "connection closed before request head".into(),
                    ));
                }
            }
            ParseResult::Invalid(e) => {
                let _ = stream.write_all(BAD_REQUEST).await;
                return Err(ClientError::Http(e.to_string()));
            }
        }
    };

    let leftover = buf.split_off(head.header_len).freeze();
    let client = PrefixedStream::new(leftover, stream);

    if head.method.eq_ignore_ascii_case("CONNECT") {
        let target = with_default_port(&head.target, 443);
        debug!(target = %target, "HTTP CONNECT");
        relayer.relay(&target, client, &mut HttpReply::Connect).await?;
        return Ok(());
    }

    let Some(uri) = parse_absolute_uri(&head.target) else {
        let (_, mut stream) = client.into_parts();
        let _ = stream.write_all(BAD_REQUEST).await;
        return Err(ClientError::Http(format!(
            "not an absolute http uri: {}",
            head.target
        )));
    };

    let target = with_default_port(uri.authority, 80);
    debug!(target = %target, method = %head.method, "HTTP forward");
    let rewritten = rewrite_request_head(&head, &uri);
    relayer
        .relay(&target, client, &mut HttpReply::Forward(rewritten))
        .await?;
    Ok(())
}

/// Pre-relay action for an HTTP proxy request.
pub enum HttpReply {
    /// Tell the client the tunnel is up.
    Connect,
    /// Send the rewritten request head to the origin.
    Forward(Vec<u8>),
}

#[async_trait]
impl<S: ClientStream> HandshakeReply<S> for HttpReply {
    async fn before_relay(&mut self, relayer: &mut Relayer<S>) -> io::Result<()> {
        match self {
            Self::Connect => relayer.to_local(CONNECTION_ESTABLISHED).await,
            Self::Forward(head) => relayer.to_remote(head).await,
        }
    }

    async fn on_failure(&mut self, client: &mut S, error: &RelayError) {
        let response = match error.root_cause() {
            RelayError::Rejected => FORBIDDEN,
            _ => BAD_GATEWAY,
        };
        let _ = client.write_all(response).await;
        let _ = client.flush().await;
    }
}

/// Parts of an `http://` absolute-form request target.
#[derive(Debug, PartialEq, Eq)]
pub struct AbsoluteUri<'a> {
    /// `host[:port]`, user info stripped.
    pub authority: &'a str,
    /// Origin-form target: path plus query, at least `/`.
    pub path: String,
}

pub fn parse_absolute_uri(target: &str) -> Option<AbsoluteUri<'_>> {
    let (scheme, rest) = target.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") {
        return None;
    }

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if authority.is_empty() {
        return None;
    }

    let tail = &rest[end..];
    let tail = tail.split_once('#').map_or(tail, |(before, _)| before);
    let path = if tail.starts_with('/') {
        tail.to_string()
    } else {
        format!("/{tail}")
    };
    Some(AbsoluteUri { authority, path })
}

/// Append `:port` when `authority` has none.
pub fn with_default_port(authority: &str, port: u16) -> String {
    if split_host_port(authority).1 != 0 {
        authority.to_string()
    } else if authority.contains(':') && !authority.starts_with('[') {
        format!("[{authority}]:{port}")
    } else {
        format!("{authority}:{port}")
    }
}

/// Rebuild `head` in origin-form.
///
/// `Proxy-*` headers are dropped and the connection is marked
/// `Connection: close`, so every proxied request gets its own connection.
pub fn rewrite_request_head(head: &RequestHead, uri: &AbsoluteUri<'_>) -> Vec<u8> {
    let mut out = String::with_capacity(head.header_len);
    let _ = write!(out, "{} {} {}\r\n", head.method, uri.path, head.version);

    let mut has_host = false;
    for (name, value) in &head.headers {
        let is_proxy = name
            .get(..6)
            .is_some_and(|p| p.eq_ignore_ascii_case("proxy-"));
        if is_proxy || name.eq_ignore_ascii_case("connection") {
            continue;
        }
        has_host |= name.eq_ignore_ascii_case("host");
        let _ = write!(out, "{name}: {value}\r\n");
    }
    if !has_host {
        let _ = write!(out, "Host: {}\r\n", uri.authority);
    }
    out.push_str("Connection: close\r\n\r\n");
    out.into_bytes()
}
