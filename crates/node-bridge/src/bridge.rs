//! Bridge entry point orchestration

use crate::runtime::EmbeddedRuntime;
use node_bridge_core::{ArgumentVector, BridgeConfig, LogSink, Priority, Result};
use node_bridge_redirect::{Redirection, StreamRedirector};
use std::sync::Arc;
use tracing::{debug, warn};

/// Starts an embedded runtime with its standard streams routed to a log sink
pub struct NodeBridge<R> {
    /// Bridge configuration
    config: BridgeConfig,
    /// Platform log
    sink: Arc<dyn LogSink>,
    /// Runtime to start
    runtime: R,
    /// Active stdout/stderr capture, once started
    redirection: Option<Redirection>,
}

impl<R: EmbeddedRuntime> NodeBridge<R> {
    pub fn new(config: BridgeConfig, sink: Arc<dyn LogSink>, runtime: R) -> Self {
        Self {
            config,
            sink,
            runtime,
            redirection: None,
        }
    }

    /// Run the runtime with `arguments` and return its exit code
    ///
    /// In order: marshal the arguments, redirect stdout/stderr, log each
    /// argument, log and call the runtime's start function (blocking), log
    /// the exit code. A marshaling failure returns before the runtime is
    /// touched. A redirection failure is logged and the run continues without
    /// capture.
    pub fn start_with_arguments<S: AsRef<str>>(&mut self, arguments: &[S]) -> Result<i32> {
        let mut argv = ArgumentVector::marshal(arguments)?;
        debug!(
            "Marshaled {} arguments into {} bytes",
            argv.len(),
            argv.byte_len()
        );

        if self.config.redirects_any() && self.redirection.is_none() {
            match StreamRedirector::new(&self.config, self.sink.clone()).start() {
                Ok(redirection) => self.redirection = Some(redirection),
                Err(e) => {
                    warn!("Stream redirection unavailable: {}", e);
                    self.log(
                        Priority::Error,
                        "Couldn't start redirecting stdout and stderr to logcat.",
                    );
                }
            }
        }

        if self.config.log_arguments {
            for (index, arg) in argv.iter().enumerate() {
                self.log(Priority::Info, &format!("argv[{}] = {}", index, arg));
            }
        }

        let entry = self.runtime.entry_name().to_string();
        self.log(Priority::Info, &format!("Calling {}()...", entry));

        let code = self.runtime.start(&mut argv)?;

        self.log(
            Priority::Info,
            &format!("{}() returned with code: {}", entry, code),
        );
        Ok(code)
    }

    /// Active redirection, if any
    pub fn redirection(&self) -> Option<&Redirection> {
        self.redirection.as_ref()
    }

    /// Take ownership of the redirection, e.g. to detach it for the process lifetime
    pub fn take_redirection(&mut self) -> Option<Redirection> {
        self.redirection.take()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    fn log(&self, priority: Priority, message: &str) {
        self.sink.write(priority, &self.config.tag, message.as_bytes());
    }
}
