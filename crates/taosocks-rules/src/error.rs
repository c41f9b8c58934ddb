//! Error types for rule loading and persistence.

use thiserror::Error;

/// Errors that can occur while loading or saving rules.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("malformed rule: {0}")]
    Malformed(String),

    #[error("invalid rule type: {0}")]
    InvalidRuleType(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
