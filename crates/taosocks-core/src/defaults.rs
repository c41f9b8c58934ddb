//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Listener / Server Defaults
// ============================================================================

/// Default local SOCKS/HTTP listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:1080";
/// Default remote tunnel server address.
pub const DEFAULT_SERVER: &str = "127.0.0.1:1081";
/// Default upgrade request path.
pub const DEFAULT_UPGRADE_PATH: &str = "/";

// ============================================================================
// Rule File Defaults
// ============================================================================

/// Default static rule file.
pub const DEFAULT_RULES_PATH: &str = "config/rules.txt";
/// Default learned rule file.
pub const DEFAULT_AUTO_RULES_PATH: &str = "config/auto-rules.yml";

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Connect timeout for direct dials, in seconds.
pub const DEFAULT_DIRECT_DIAL_TIMEOUT_SECS: u64 = 10;
/// Default TLS handshake timeout in seconds.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Read buffer size for relay loops. One `RelayMessage` never carries more.
pub const READ_BUF_SIZE: usize = 16 * 1024;
/// Upper bound for a single encoded tunnel message.
pub const MAX_MESSAGE_BYTES: usize = READ_BUF_SIZE + 1024;
/// Maximum bytes accepted for an HTTP header block (upgrade response and
/// HTTP proxy requests).
pub const MAX_HTTP_HEADER_BYTES: usize = 16 * 1024;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive interval in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 300;

// ============================================================================
// Protocol Constants
// ============================================================================

/// Value of the `Upgrade` header sent to the tunnel server.
pub const PROTOCOL_VERSION: &str = "taosocks/20200610";
/// Authorization scheme used in the upgrade request.
pub const AUTH_SCHEME: &str = "taosocks";
