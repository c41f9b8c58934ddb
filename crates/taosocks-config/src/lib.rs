//! Client configuration: types, file loading, CLI overrides and validation.

mod defaults;

pub mod cli;
pub mod loader;
pub mod types;
pub mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config, load_or_default};
pub use types::*;
pub use validate::validate_config;
