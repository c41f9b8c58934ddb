//! Configuration type definitions for the client, TLS, TCP and logging.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Top-level client configuration. Every field has a default, so an empty
/// file (or no file at all) yields a usable config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Local SOCKS4/SOCKS5/HTTP listen address.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Remote tunnel server address (`host:port`).
    #[serde(default = "default_server")]
    pub server: String,
    /// Skip verification of the tunnel server certificate.
    #[serde(default)]
    pub insecure: bool,
    /// Shared key sent in the `Authorization` header.
    #[serde(default)]
    pub key: String,
    /// Request path of the upgrade request.
    #[serde(default = "default_path")]
    pub path: String,
    /// Static rule file (`TYPE,VALUE,ACTION` per line).
    #[serde(default = "default_rules_path")]
    pub rules_path: String,
    /// Learned rule file, rewritten on shutdown.
    #[serde(default = "default_auto_rules_path")]
    pub auto_rules_path: String,
    /// Connect timeout for direct dials.
    #[serde(default = "default_direct_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    #[serde(default)]
    pub tls: TlsSettings,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            server: default_server(),
            insecure: false,
            key: String::new(),
            path: default_path(),
            rules_path: default_rules_path(),
            auto_rules_path: default_auto_rules_path(),
            dial_timeout_secs: default_direct_dial_timeout_secs(),
            tls: TlsSettings::default(),
            tcp: TcpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// TLS settings for the tunnel connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsSettings {
    /// TLS SNI hostname. Defaults to the host portion of `server`.
    #[serde(default)]
    pub sni: Option<String>,
    /// Custom CA certificate path (PEM). Web PKI roots are used otherwise.
    #[serde(default)]
    pub ca: Option<String>,
    /// Budget for TCP connect, TLS handshake and the upgrade exchange.
    #[serde(default = "default_tls_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            sni: None,
            ca: None,
            handshake_timeout_secs: default_tls_handshake_timeout_secs(),
        }
    }
}

/// TCP socket options applied to outbound connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) for lower latency.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"taosocks_rules": "debug", "rustls": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
