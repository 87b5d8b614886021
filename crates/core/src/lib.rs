//! Shared types for Quietwatch
//!
//! This crate provides:
//! - Ready results and the watch event stream
//! - Watch configuration (TOML-backed, validated)
//! - The error type shared by the watcher and the CLI

pub mod config;
pub mod error;
pub mod event;

// Re-exports
pub use config::WatchConfig;
pub use error::{Error, Result};
pub use event::{ReadyResult, WatchEvent};
