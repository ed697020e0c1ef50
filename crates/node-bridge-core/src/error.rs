//! Error types for the bridge

use crate::stream::StdStream;
use std::collections::TryReserveError;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Argument buffer could not be allocated
    #[error("Failed to allocate {bytes} bytes for the argument buffer")]
    Allocation {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    /// Argument contains a NUL byte and cannot be passed as a C string
    #[error("Argument {index} contains an interior NUL byte")]
    InteriorNul { index: usize },

    /// Combined argument size does not fit in memory
    #[error("Arguments too large for a single argument buffer")]
    ArgumentsTooLarge,

    /// Argument count does not fit a C `int`
    #[error("Too many arguments: {0}")]
    TooManyArguments(usize),

    /// Redirecting a standard stream failed
    #[error("Failed to redirect {stream}: {source}")]
    Redirect {
        stream: StdStream,
        #[source]
        source: std::io::Error,
    },

    /// Standard streams are already redirected in this process
    #[error("Standard streams are already redirected")]
    AlreadyRedirected,

    /// The embedded runtime was already started in this process
    #[error("Embedded runtime already started (single-start limitation)")]
    AlreadyStarted,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JNI call failed
    #[error("JNI error: {0}")]
    Jni(String),

    /// Embedded runtime could not be invoked
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Generic I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
