//! Bridge between an Android app and an embedded Node.js runtime
//!
//! This crate provides:
//! - `NodeBridge`: marshal arguments, redirect stdio, log, start the runtime
//! - `EmbeddedRuntime` trait and the libnode-backed `NodeRuntime`
//! - Process-wide single-start guard and status
//! - JNI exports for `com.seekerclaw.app.service.NodeBridge`
//! - tracing subscriber that writes into the platform log

pub mod bridge;
pub mod jni_bindings;
pub mod logging;
pub mod process;
pub mod runtime;

pub use bridge::NodeBridge;
pub use process::{ProcessStatus, run_once};
pub use runtime::{EmbeddedRuntime, UnlinkedRuntime, default_runtime};

#[cfg(feature = "libnode")]
pub use runtime::NodeRuntime;
