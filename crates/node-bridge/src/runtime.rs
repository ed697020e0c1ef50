//! Embedded runtime seam

use node_bridge_core::{ArgumentVector, BridgeError, Result};

/// A runtime with a single blocking `(argc, argv) -> exit code` entry point
pub trait EmbeddedRuntime {
    /// Name of the start function, as it appears in the bridge's log lines
    fn entry_name(&self) -> &str;

    /// Run to completion and return the exit code
    fn start(&mut self, argv: &mut ArgumentVector) -> Result<i32>;
}

impl<R: EmbeddedRuntime + ?Sized> EmbeddedRuntime for Box<R> {
    fn entry_name(&self) -> &str {
        (**self).entry_name()
    }

    fn start(&mut self, argv: &mut ArgumentVector) -> Result<i32> {
        (**self).start(argv)
    }
}

#[cfg(feature = "libnode")]
mod ffi {
    use std::ffi::{c_char, c_int};

    #[link(name = "node")]
    unsafe extern "C" {
        /// `int node::Start(int argc, char** argv)`
        #[link_name = "_ZN4node5StartEiPPc"]
        pub fn node_start(argc: c_int, argv: *mut *mut c_char) -> c_int;
    }
}

/// nodejs-mobile, linked from `libnode.so`
#[cfg(feature = "libnode")]
#[derive(Debug, Default)]
pub struct NodeRuntime;

#[cfg(feature = "libnode")]
impl EmbeddedRuntime for NodeRuntime {
    fn entry_name(&self) -> &str {
        "node::Start"
    }

    fn start(&mut self, argv: &mut ArgumentVector) -> Result<i32> {
        let mut raw = argv.as_raw();
        // SAFETY: argv has argc valid NUL-terminated entries followed by NULL,
        // all backed by the mutably borrowed argument buffer
        Ok(unsafe { ffi::node_start(raw.argc(), raw.argv()) })
    }
}

/// Stand-in used when the crate is built without libnode
#[derive(Debug, Default)]
pub struct UnlinkedRuntime;

impl EmbeddedRuntime for UnlinkedRuntime {
    fn entry_name(&self) -> &str {
        "node::Start"
    }

    fn start(&mut self, _argv: &mut ArgumentVector) -> Result<i32> {
        Err(BridgeError::Runtime(
            "node-bridge was built without the `libnode` feature".into(),
        ))
    }
}

/// Runtime for this build
pub fn default_runtime() -> Box<dyn EmbeddedRuntime + Send> {
    #[cfg(feature = "libnode")]
    {
        Box::new(NodeRuntime)
    }

    #[cfg(not(feature = "libnode"))]
    {
        Box::new(UnlinkedRuntime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlinked_runtime_reports_error() {
        let mut argv = ArgumentVector::marshal(&["node"]).unwrap();
        let err = UnlinkedRuntime.start(&mut argv).unwrap_err();
        assert!(matches!(err, BridgeError::Runtime(_)));
    }

    #[test]
    fn test_boxed_runtime_delegates() {
        let runtime = default_runtime();
        assert_eq!(runtime.entry_name(), "node::Start");
    }
}
