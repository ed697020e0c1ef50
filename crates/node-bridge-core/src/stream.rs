//! Standard stream descriptors

use crate::log::Priority;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::fd::RawFd;

/// A standard output stream that can be captured
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StdStream {
    Stdout,
    Stderr,
}

impl StdStream {
    /// Both streams, in redirection order
    pub const ALL: [StdStream; 2] = [StdStream::Stdout, StdStream::Stderr];

    /// File descriptor number of the stream
    pub fn fd(&self) -> RawFd {
        match self {
            StdStream::Stdout => libc::STDOUT_FILENO,
            StdStream::Stderr => libc::STDERR_FILENO,
        }
    }

    /// Priority used for records captured from this stream
    pub fn priority(&self) -> Priority {
        match self {
            StdStream::Stdout => Priority::Info,
            StdStream::Stderr => Priority::Error,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StdStream::Stdout => "stdout",
            StdStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
