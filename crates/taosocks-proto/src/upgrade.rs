//! Upgrade handshake that turns a TLS connection into a tunnel.
//!
//! ```text
//! GET <path> HTTP/1.1
//! Host: <server>
//! Connection: upgrade
//! Upgrade: taosocks/20200610
//! Authorization: taosocks <key>
//! ```
//!
//! Any status other than `101` means the tunnel was refused.

use bytes::{BufMut, BytesMut};
use taosocks_core::{AUTH_SCHEME, MAX_HTTP_HEADER_BYTES, PROTOCOL_VERSION};

use crate::ParseResult;
use crate::http::parse_response_head;

pub const STATUS_SWITCHING_PROTOCOLS: u16 = 101;

/// Fields of the upgrade request.
#[derive(Debug, Clone, Copy)]
pub struct UpgradeRequest<'a> {
    pub path: &'a str,
    /// `Host` header value, the configured server address.
    pub host: &'a str,
    pub key: &'a str,
}

/// Outcome of the upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResponse {
    pub status: u16,
    pub reason: String,
    /// Bytes consumed by the response head. Anything after belongs to the
    /// message stream.
    pub header_len: usize,
}

impl UpgradeResponse {
    pub fn is_accepted(&self) -> bool {
        self.status == STATUS_SWITCHING_PROTOCOLS
    }
}

/// Writes the upgrade request head to `buf`.
pub fn write_upgrade_request(buf: &mut BytesMut, req: &UpgradeRequest<'_>) {
    buf.reserve(128 + req.path.len() + req.host.len() + req.key.len());
    buf.put_slice(b"GET ");
    buf.put_slice(req.path.as_bytes());
    buf.put_slice(b" HTTP/1.1\r\nHost: ");
    buf.put_slice(req.host.as_bytes());
    buf.put_slice(b"\r\nConnection: upgrade\r\nUpgrade: ");
    buf.put_slice(PROTOCOL_VERSION.as_bytes());
    buf.put_slice(b"\r\nAuthorization: ");
    buf.put_slice(AUTH_SCHEME.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(req.key.as_bytes());
    buf.put_slice(b"\r\n\r\n");
}

/// Parses the server's answer to the upgrade request.
#[inline]
pub fn parse_upgrade_response(buf: &[u8]) -> ParseResult<UpgradeResponse> {
    match parse_response_head(buf, MAX_HTTP_HEADER_BYTES) {
        ParseResult::Complete(head) => ParseResult::Complete(UpgradeResponse {
            status: head.status,
            reason: head.reason,
            header_len: head.header_len,
        }),
        ParseResult::Incomplete(n) => ParseResult::Incomplete(n),
        ParseResult::Invalid(e) => ParseResult::Invalid(e),
    }
}
