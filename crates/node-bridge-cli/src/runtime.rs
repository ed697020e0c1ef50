//! Child-process stand-in for the embedded runtime

use node_bridge::EmbeddedRuntime;
use node_bridge_core::{ArgumentVector, BridgeError, Result};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use tracing::debug;

/// Runs `argv[0]` with the remaining arguments as a child process.
///
/// The child inherits fds 1/2, so when they are redirected its output lands
/// in the platform log just like the embedded runtime's would.
#[derive(Debug, Default)]
pub struct CommandRuntime;

impl EmbeddedRuntime for CommandRuntime {
    /// Same name as the real entry point, so harness logs read like device logs
    fn entry_name(&self) -> &str {
        "node::Start"
    }

    fn start(&mut self, argv: &mut ArgumentVector) -> Result<i32> {
        let mut args = argv.iter();
        let program = args
            .next()
            .ok_or_else(|| BridgeError::Runtime("No program to run".into()))?;

        debug!("Spawning {}", program);
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| BridgeError::Runtime(format!("Failed to spawn {}: {}", program, e)))?;

        Ok(exit_code(status))
    }
}

/// Shell convention: signal termination reports `128 + signal`
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}
