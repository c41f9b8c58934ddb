//! Core types and constants shared across taosocks crates.
//!
//! This crate provides:
//! - Default configuration values and protocol constants
//! - Error kind labels for structured logging
//! - Stream adapters shared by the transport and the front-end decoders

pub mod defaults;
pub mod errors;
pub mod io;

// Re-export commonly used items at crate root
pub use defaults::*;
pub use errors::*;

/// Project name.
pub const PROJECT_NAME: &str = "taosocks";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
