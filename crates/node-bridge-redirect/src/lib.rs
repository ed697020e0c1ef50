//! Standard stream redirection for the embedded runtime
//!
//! This crate provides:
//! - Background reader task that drains a capture pipe into a log sink
//! - Process-wide stdout/stderr redirection with a double-start guard
//! - Explicit shutdown that restores the original descriptors

pub mod reader;
pub mod redirector;

pub use reader::{ReaderExit, reader_task, strip_trailing_newline};
pub use redirector::{Redirection, StreamRedirector, is_redirected};
