//! CLI override definitions and application logic.

use clap::Parser;

use crate::ClientConfig;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override local listen address, e.g. 127.0.0.1:1080
    #[arg(long)]
    pub listen: Option<String>,
    /// Override tunnel server address, e.g. proxy.example.com:443
    #[arg(long)]
    pub server: Option<String>,
    /// Skip tunnel server certificate verification
    #[arg(long)]
    pub insecure: bool,
    /// Override the shared key
    #[arg(long, env = "TAOSOCKS_KEY", hide_env_values = true)]
    pub key: Option<String>,
    /// Override upgrade request path
    #[arg(long)]
    pub path: Option<String>,
    /// Override static rule file
    #[arg(long = "rules")]
    pub rules_path: Option<String>,
    /// Override learned rule file
    #[arg(long = "auto-rules")]
    pub auto_rules_path: Option<String>,
    /// Override TLS SNI hostname
    #[arg(long)]
    pub sni: Option<String>,
    /// Override direct dial timeout (seconds)
    #[arg(long)]
    pub dial_timeout_secs: Option<u64>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Disable TCP_NODELAY (enable Nagle's algorithm)
    #[arg(long)]
    pub tcp_no_delay: Option<bool>,
    /// TCP Keep-Alive interval in seconds (0 = disabled)
    #[arg(long)]
    pub tcp_keepalive_secs: Option<u64>,
}

pub fn apply_overrides(config: &mut ClientConfig, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.listen = v.clone();
    }
    if let Some(v) = &overrides.server {
        config.server = v.clone();
    }
    // Flag only turns verification off; it never re-enables it.
    if overrides.insecure {
        config.insecure = true;
    }
    if let Some(v) = &overrides.key {
        config.key = v.clone();
    }
    if let Some(v) = &overrides.path {
        config.path = v.clone();
    }
    if let Some(v) = &overrides.rules_path {
        config.rules_path = v.clone();
    }
    if let Some(v) = &overrides.auto_rules_path {
        config.auto_rules_path = v.clone();
    }
    if let Some(v) = &overrides.sni {
        config.tls.sni = Some(v.clone());
    }
    if let Some(v) = overrides.dial_timeout_secs {
        config.dial_timeout_secs = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    // TCP socket options
    if let Some(v) = overrides.tcp_no_delay {
        config.tcp.no_delay = v;
    }
    if let Some(v) = overrides.tcp_keepalive_secs {
        config.tcp.keepalive_secs = v;
    }
}
