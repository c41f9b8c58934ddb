//! Error kind labels for logging.
//!
//! These constants provide consistent error classification across all crates.

/// Host rejected by a rule.
pub const ERROR_REJECTED: &str = "rejected";
/// TLS, upgrade request or upgrade response to the tunnel server failed.
pub const ERROR_REMOTE_DIAL: &str = "remote_dial";
/// Tunnel server could not reach the target.
pub const ERROR_REMOTE_TARGET: &str = "remote_target";
/// Direct TCP dial failed.
pub const ERROR_DIRECT_DIAL: &str = "direct_dial";
/// Tunnel message encoding/decoding error.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Front-end reply callback failed.
pub const ERROR_REPLY: &str = "reply";
/// No relayer could reach the target.
pub const ERROR_UNREACHABLE: &str = "unreachable";
