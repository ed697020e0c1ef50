//! # node-bridge-core
//!
//! Core types shared by the embedded Node.js bridge.
//!
//! This crate provides the pieces that do not touch process-wide state:
//! - Argument marshaling into a contiguous, NUL-terminated argv buffer
//! - Standard stream descriptors and their log priorities
//! - The platform log sink abstraction
//! - Bridge configuration

pub mod args;
pub mod config;
pub mod error;
pub mod log;
pub mod stream;

pub use args::{ArgumentVector, RawArgv};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use log::{ConsoleSink, LogSink, MemorySink, Priority, Record, platform_sink};
pub use stream::StdStream;

/// Source tag attached to every record the bridge writes to the platform log
pub const DEFAULT_TAG: &str = "SEEKERCLAW-NODE";
