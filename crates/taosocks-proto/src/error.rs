//! Protocol error types.

use std::io;

use thiserror::Error;

/// Header-level parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Header block is not valid UTF-8.
    InvalidUtf8,
    /// Status or request line is malformed.
    InvalidStartLine,
    /// Status code is not a three-digit number.
    InvalidStatus,
    /// A header line has no `:` separator.
    InvalidHeader,
    /// Header block exceeds the configured maximum.
    HeaderTooLarge,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::InvalidUtf8 => "header is not valid utf-8",
            Self::InvalidStartLine => "malformed start line",
            Self::InvalidStatus => "malformed status code",
            Self::InvalidHeader => "malformed header line",
            Self::HeaderTooLarge => "header block too large",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ParseError {}

/// Errors from the tunnel message codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("encode: {0}")]
    Encode(bincode::Error),
    #[error("decode: {0}")]
    Decode(bincode::Error),
    #[error("unexpected message: expected {expected}, got {found}")]
    UnexpectedMessage {
        expected: &'static str,
        found: &'static str,
    },
    #[error("tunnel closed before {0}")]
    Closed(&'static str),
}
