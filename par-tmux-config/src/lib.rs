//! Configuration system for the par-tmux control mode client.
//!
//! This crate provides configuration loading, saving, validation and
//! default values for the tmux control mode client. It includes:
//!
//! - [`TmuxConfig`]: timing constants, queue bounds and log level
//! - [`ConfigError`]: typed failures for I/O, YAML parsing and validation
//! - [`defaults`]: `#[serde(default = ...)]` value functions

pub mod config;
pub mod defaults;
pub mod error;
mod types;

pub use config::TmuxConfig;
pub use error::ConfigError;
pub use types::LogLevel;
