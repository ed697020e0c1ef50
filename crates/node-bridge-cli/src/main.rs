//! node-bridge: host harness for the embedded runtime bridge
//!
//! Runs the same marshal / redirect / log / start sequence as the JNI entry
//! point, with a child process standing in for node::Start. Captured output
//! is written to the original stderr in logcat brief format.

mod runtime;

use anyhow::Result;
use clap::Parser;
use node_bridge::{NodeBridge, logging};
use node_bridge_core::{BridgeConfig, platform_sink};
use runtime::CommandRuntime;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "node-bridge", version, about = "Run a program through the node bridge")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source tag for log records
    #[arg(long)]
    tag: Option<String>,

    /// Read buffer size per captured record
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Leave stdout/stderr alone
    #[arg(long)]
    no_redirect: bool,

    /// Do not log the argv dump
    #[arg(long)]
    quiet_args: bool,

    /// Program and arguments, passed through as argv
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    argv: Vec<String>,
}

impl Args {
    fn bridge_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)?,
            None => BridgeConfig::default(),
        };
        if let Some(tag) = &self.tag {
            config.tag = tag.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if self.no_redirect {
            config.redirect_stdout = false;
            config.redirect_stderr = false;
        }
        if self.quiet_args {
            config.log_arguments = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.bridge_config()?;

    // Created before redirection so it keeps the terminal's stderr
    let sink = platform_sink()?;
    logging::init(&config, sink.clone())?;

    info!("node-bridge host harness starting");

    let mut bridge = NodeBridge::new(config, sink, CommandRuntime);
    let code = bridge.start_with_arguments(&args.argv)?;

    if let Some(redirection) = bridge.take_redirection() {
        for (stream, exit) in redirection.shutdown() {
            debug!("{} reader stopped: {:?}", stream, exit);
        }
    }

    info!("node-bridge host harness exiting with code {}", code);
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_passes_through_after_separator() {
        let args = Args::try_parse_from(["node-bridge", "--no-redirect", "--", "node", "--version"])
            .unwrap();
        assert_eq!(args.argv, vec!["node", "--version"]);

        let config = args.bridge_config().unwrap();
        assert!(!config.redirects_any());
        assert!(config.log_arguments);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "node-bridge",
            "--tag",
            "HOST-NODE",
            "--chunk-size",
            "512",
            "--quiet-args",
            "node",
            "main.js",
        ])
        .unwrap();

        let config = args.bridge_config().unwrap();
        assert_eq!(config.tag, "HOST-NODE");
        assert_eq!(config.chunk_size, 512);
        assert!(!config.log_arguments);
        assert!(config.redirect_stdout);
        assert_eq!(args.argv, vec!["node", "main.js"]);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args::try_parse_from(["node-bridge", "--chunk-size", "0", "node"]).unwrap();
        assert!(args.bridge_config().is_err());
    }

    #[test]
    fn test_program_is_required() {
        assert!(Args::try_parse_from(["node-bridge"]).is_err());
    }
}
