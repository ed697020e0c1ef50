//! Bridge configuration

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Read buffer size of each stream reader
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Configuration for the bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Source tag for every platform log record
    pub tag: String,
    /// Bytes read from a capture pipe per record
    pub chunk_size: usize,
    /// Capture stdout into the platform log
    pub redirect_stdout: bool,
    /// Capture stderr into the platform log
    pub redirect_stderr: bool,
    /// Log `argv[i] = ...` before starting the runtime
    pub log_arguments: bool,
    /// `EnvFilter` directive for the bridge's own diagnostics
    pub log_filter: String,
    /// How long an explicit redirection shutdown waits for readers to drain
    pub shutdown_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tag: crate::DEFAULT_TAG.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            redirect_stdout: true,
            redirect_stderr: true,
            log_arguments: true,
            log_filter: "info".into(),
            shutdown_timeout_ms: 500,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BridgeError::Config("chunk_size must be greater than zero".into()));
        }
        if self.tag.is_empty() {
            return Err(BridgeError::Config("tag must not be empty".into()));
        }
        if self.tag.as_bytes().contains(&0) {
            return Err(BridgeError::Config("tag must not contain NUL bytes".into()));
        }
        Ok(())
    }

    /// Whether any stream is to be captured
    pub fn redirects_any(&self) -> bool {
        self.redirect_stdout || self.redirect_stderr
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
