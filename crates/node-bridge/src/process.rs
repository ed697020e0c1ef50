//! Process-wide single start
//!
//! Node.js can only be started once per process. The state lives in atomics
//! so the JNI layer can query it from any thread.

use crate::bridge::NodeBridge;
use crate::runtime::EmbeddedRuntime;
use node_bridge_core::{BridgeConfig, BridgeError, LogSink, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use tracing::info;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const EXITED: u8 = 2;

static STATE: AtomicU8 = AtomicU8::new(IDLE);
static EXIT_CODE: AtomicI32 = AtomicI32::new(0);

/// Lifecycle of the embedded runtime in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Not started yet
    Idle,
    /// Start function has not returned
    Running,
    /// Start function returned (or failed with code -1)
    Exited(i32),
}

pub fn status() -> ProcessStatus {
    match STATE.load(Ordering::SeqCst) {
        IDLE => ProcessStatus::Idle,
        RUNNING => ProcessStatus::Running,
        _ => ProcessStatus::Exited(EXIT_CODE.load(Ordering::SeqCst)),
    }
}

pub fn is_alive() -> bool {
    status() == ProcessStatus::Running
}

/// Start the runtime unless it was already started in this process
///
/// The stream redirection is kept for the rest of the process after the
/// runtime returns, so output from late-exiting threads is still captured.
/// Any failure counts as the one start: the process must be restarted to try
/// again.
pub fn run_once<R, S>(
    config: BridgeConfig,
    sink: Arc<dyn LogSink>,
    runtime: R,
    arguments: &[S],
) -> Result<i32>
where
    R: EmbeddedRuntime,
    S: AsRef<str>,
{
    if STATE
        .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(BridgeError::AlreadyStarted);
    }

    let mut bridge = NodeBridge::new(config, sink, runtime);
    let result = bridge.start_with_arguments(arguments);
    if let Some(redirection) = bridge.take_redirection() {
        redirection.detach();
    }

    let code = *result.as_ref().unwrap_or(&-1);
    EXIT_CODE.store(code, Ordering::SeqCst);
    STATE.store(EXITED, Ordering::SeqCst);
    info!("Embedded runtime finished with code {}", code);

    result
}
