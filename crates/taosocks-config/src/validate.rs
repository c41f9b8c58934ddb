//! Configuration validation logic.

use std::net::SocketAddr;

use crate::ClientConfig;
use crate::loader::ConfigError;

pub fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.listen.trim().is_empty() {
        return Err(ConfigError::Validation("listen is empty".into()));
    }
    if config.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "listen must be ip:port, got {:?}",
            config.listen
        )));
    }
    if config.server.trim().is_empty() {
        return Err(ConfigError::Validation("server is empty".into()));
    }
    if !has_port(&config.server) {
        return Err(ConfigError::Validation(format!(
            "server must be host:port, got {:?}",
            config.server
        )));
    }
    if !config.path.starts_with('/') {
        return Err(ConfigError::Validation("path must start with '/'".into()));
    }
    if config.path.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation("path must not contain whitespace".into()));
    }
    if config.key.contains(['\r', '\n']) {
        return Err(ConfigError::Validation("key must be a single line".into()));
    }
    if config.rules_path.trim().is_empty() {
        return Err(ConfigError::Validation("rules_path is empty".into()));
    }
    if config.auto_rules_path.trim().is_empty() {
        return Err(ConfigError::Validation("auto_rules_path is empty".into()));
    }
    if config.dial_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "dial_timeout_secs must be > 0".into(),
        ));
    }
    if config.tls.handshake_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "tls.handshake_timeout_secs must be > 0".into(),
        ));
    }
    if let Some(format) = &config.logging.format
        && !matches!(format.as_str(), "json" | "pretty" | "compact")
    {
        return Err(ConfigError::Validation(
            "logging.format must be one of: json, pretty, compact".into(),
        ));
    }
    Ok(())
}

fn has_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
