//! Tunnel wire protocol.
//!
//! Two layers live here:
//! - the HTTP/1.1 upgrade exchange that turns a TLS connection into a tunnel
//!   ([`upgrade`]), plus the header-block helpers it shares with the HTTP
//!   proxy front end ([`http`]);
//! - the message stream spoken after the upgrade ([`message`], [`codec`]).
//!
//! Parsers are incremental and report how many bytes they need, in the
//! [`ParseResult`] style.

pub mod codec;
pub mod error;
pub mod http;
pub mod message;
pub mod upgrade;

pub use codec::TunnelCodec;
pub use error::{CodecError, ParseError};
pub use message::{OpenAckMessage, OpenMessage, RelayMessage, TunnelMessage};
pub use upgrade::{UpgradeRequest, UpgradeResponse, parse_upgrade_response, write_upgrade_request};

/// Parse result for incremental parsing.
///
/// - `Complete(T)` - parsing succeeded, contains the parsed value.
/// - `Incomplete(n)` - buffer too small; `n` is the **minimum total bytes** needed.
///   For header blocks whose length is not known up front this is
///   `buf.len() + 1`.
/// - `Invalid(e)` - protocol violation, the connection should be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Complete(T),
    Incomplete(usize),
    Invalid(ParseError),
}
