//! Shared utilities for keystone crates
//!
//! - [`logging`]: hierarchical component loggers emitting `tracing` events
//! - [`error`]: error cause-chain formatting

pub mod error;
pub mod logging;

pub use error::format_error;
pub use logging::{LogLevel, LogOptions, Logger, Tags, Timer};
