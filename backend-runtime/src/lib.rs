//! # Backend Runtime
//!
//! Ambient runtime support shared by graphvault crates.
//!
//! ## Modules
//!
//! - `logging`: structured logging built on `tracing` with pretty, JSON and
//!   compact output formats and sensitive-value redaction
//! - `options`: parsing for the string→string configuration surface (byte
//!   sizes, durations, counts)

pub mod error;
pub mod logging;
pub mod options;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
