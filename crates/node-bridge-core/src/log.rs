//! Platform log sinks
//!
//! Everything the bridge forwards (captured stdout/stderr chunks, the argv
//! dump, runtime start/exit lines) ends up in a [`LogSink`]. On Android the
//! sink is logcat; on other hosts it is the process's original stderr.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{FromRawFd, OwnedFd};
use std::sync::{Arc, Mutex};

/// Log priority, numbered like Android's `android_LogPriority`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Debug = 3,
    Info = 4,
    Warn = 5,
    Error = 6,
}

impl Priority {
    /// Single-letter form used by logcat's brief format
    pub fn letter(&self) -> char {
        match self {
            Priority::Debug => 'D',
            Priority::Info => 'I',
            Priority::Warn => 'W',
            Priority::Error => 'E',
        }
    }
}

/// Destination for log records
///
/// Messages are raw bytes: captured stream output is not guaranteed to be
/// UTF-8, and a chunk boundary may split a multi-byte character.
pub trait LogSink: Send + Sync {
    /// Write a single record
    fn write(&self, priority: Priority, tag: &str, message: &[u8]);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write(&self, priority: Priority, tag: &str, message: &[u8]) {
        (**self).write(priority, tag, message)
    }
}

/// Sink for the current platform: logcat on Android, original stderr elsewhere.
///
/// Must be created before the standard streams are redirected, otherwise the
/// console sink would write into its own capture pipe.
pub fn platform_sink() -> io::Result<Arc<dyn LogSink>> {
    #[cfg(target_os = "android")]
    {
        Ok(Arc::new(AndroidLogSink))
    }

    #[cfg(not(target_os = "android"))]
    {
        Ok(Arc::new(ConsoleSink::new()?))
    }
}

#[cfg(target_os = "android")]
mod ffi {
    use std::ffi::{c_char, c_int};

    #[link(name = "log")]
    unsafe extern "C" {
        pub fn __android_log_write(prio: c_int, tag: *const c_char, text: *const c_char) -> c_int;
    }
}

/// Writes records to logcat via `__android_log_write`
#[cfg(target_os = "android")]
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidLogSink;

#[cfg(target_os = "android")]
impl LogSink for AndroidLogSink {
    fn write(&self, priority: Priority, tag: &str, message: &[u8]) {
        let tag = c_string_lossy(tag.as_bytes());
        let text = c_string_lossy(message);
        // SAFETY: both pointers are valid NUL-terminated strings for the duration of the call
        unsafe {
            ffi::__android_log_write(priority as std::ffi::c_int, tag.as_ptr(), text.as_ptr());
        }
    }
}

/// Truncate at the first NUL, the way a C reader of the same buffer would see it
#[cfg(target_os = "android")]
fn c_string_lossy(bytes: &[u8]) -> std::ffi::CString {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::ffi::CString::new(&bytes[..end]).unwrap_or_default()
}

/// Writes records in logcat brief format (`I/TAG: message`) to a private
/// duplicate of the process's stderr
#[derive(Debug)]
pub struct ConsoleSink {
    file: File,
}

impl ConsoleSink {
    /// Duplicate the current stderr descriptor
    pub fn new() -> io::Result<Self> {
        // SAFETY: F_DUPFD_CLOEXEC on a valid descriptor returns a new descriptor we own
        let fd = unsafe { libc::fcntl(libc::STDERR_FILENO, libc::F_DUPFD_CLOEXEC, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: fd was just returned by fcntl and is not owned elsewhere
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self {
            file: File::from(owned),
        })
    }

    /// Write to an arbitrary file instead of stderr
    pub fn with_file(file: File) -> Self {
        Self { file }
    }
}

impl LogSink for ConsoleSink {
    fn write(&self, priority: Priority, tag: &str, message: &[u8]) {
        let mut line = Vec::with_capacity(tag.len() + message.len() + 4);
        line.push(priority.letter() as u8);
        line.push(b'/');
        line.extend_from_slice(tag.as_bytes());
        line.extend_from_slice(b": ");
        line.extend_from_slice(message);
        line.push(b'\n');
        // Nowhere left to report a failure to the log itself
        let _ = (&self.file).write_all(&line);
    }
}

/// A captured record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub priority: Priority,
    pub tag: String,
    pub message: Vec<u8>,
}

impl Record {
    /// Message as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }
}

/// In-memory sink that keeps every record, in write order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records written so far
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Messages of all records with the given priority
    pub fn messages(&self, priority: Priority) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.priority == priority)
            .map(|r| r.text().into_owned())
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn write(&self, priority: Priority, tag: &str, message: &[u8]) {
        self.lock().push(Record {
            priority,
            tag: tag.to_string(),
            message: message.to_vec(),
        });
    }
}
