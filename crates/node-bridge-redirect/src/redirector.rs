//! Process-wide stdout/stderr redirection
//!
//! Each redirected stream gets a pipe whose write end replaces the stream's
//! descriptor and whose read end is drained by a [`reader_task`] on a small
//! dedicated runtime. The original descriptor is kept aside so an explicit
//! shutdown can put it back.

use crate::reader::{ReaderExit, reader_task};
use node_bridge_core::{BridgeConfig, BridgeError, LogSink, Priority, Result, StdStream};
use std::io::{self, ErrorKind, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::unix::pipe;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Set while a [`Redirection`] owns the standard descriptors
static REDIRECTED: AtomicBool = AtomicBool::new(false);

/// Grace period for readers when a [`Redirection`] is dropped
const DROP_TIMEOUT: Duration = Duration::from_millis(100);

/// Whether stdout/stderr are currently redirected by this crate
pub fn is_redirected() -> bool {
    REDIRECTED.load(Ordering::SeqCst)
}

/// Builder for a process-wide redirection
pub struct StreamRedirector {
    streams: Vec<StdStream>,
    tag: Arc<str>,
    chunk_size: usize,
    shutdown_timeout: Duration,
    sink: Arc<dyn LogSink>,
}

impl StreamRedirector {
    /// Redirect the streams enabled in `config` into `sink`
    pub fn new(config: &BridgeConfig, sink: Arc<dyn LogSink>) -> Self {
        let streams = StdStream::ALL
            .into_iter()
            .filter(|stream| match stream {
                StdStream::Stdout => config.redirect_stdout,
                StdStream::Stderr => config.redirect_stderr,
            })
            .collect();

        Self {
            streams,
            tag: config.tag.as_str().into(),
            chunk_size: config.chunk_size,
            shutdown_timeout: config.shutdown_timeout(),
            sink,
        }
    }

    /// Replace the descriptors and start one reader per stream
    ///
    /// Fails only if redirection is already active or the reader runtime
    /// cannot be built. A stream whose pipe cannot be set up is reported to
    /// the sink at error priority and left as it was.
    pub fn start(self) -> Result<Redirection> {
        if REDIRECTED.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyRedirected);
        }

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("node-stdio")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                REDIRECTED.store(false, Ordering::SeqCst);
                return Err(BridgeError::Io(e));
            }
        };

        unbuffer_stdio();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut active = Vec::with_capacity(self.streams.len());

        for stream in self.streams {
            match redirect_stream(&runtime, stream)
                .map_err(|source| BridgeError::Redirect { stream, source })
            {
                Ok((receiver, saved)) => {
                    let handle = runtime.spawn(reader_task(
                        receiver,
                        stream,
                        self.tag.clone(),
                        self.chunk_size,
                        self.sink.clone(),
                        shutdown_rx.clone(),
                    ));
                    info!("Redirecting {} to the platform log", stream);
                    active.push(ActiveStream {
                        stream,
                        saved,
                        handle,
                    });
                }
                Err(e) => report_failed_stream(&*self.sink, &self.tag, stream, &e),
            }
        }

        Ok(Redirection {
            runtime: Some(runtime),
            shutdown_tx,
            active,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

struct ActiveStream {
    stream: StdStream,
    /// Duplicate of the descriptor the pipe replaced
    saved: OwnedFd,
    handle: JoinHandle<ReaderExit>,
}

/// Active redirection of the standard streams
///
/// Dropping it restores the original descriptors. Use [`Redirection::detach`]
/// to keep the redirection for the rest of the process.
///
/// Shutting down blocks on the reader runtime, so neither `shutdown` nor a
/// drop may happen inside an async context.
pub struct Redirection {
    runtime: Option<Runtime>,
    shutdown_tx: watch::Sender<bool>,
    active: Vec<ActiveStream>,
    shutdown_timeout: Duration,
}

impl Redirection {
    /// Streams whose output is being captured
    pub fn streams(&self) -> Vec<StdStream> {
        self.active.iter().map(|a| a.stream).collect()
    }

    pub fn is_active(&self, stream: StdStream) -> bool {
        self.active.iter().any(|a| a.stream == stream)
    }

    /// Restore the original descriptors and wait for the readers
    ///
    /// Readers first drain whatever is still buffered in their pipe. Any
    /// reader still running after the configured timeout is signalled to stop.
    pub fn shutdown(mut self) -> Vec<(StdStream, ReaderExit)> {
        let timeout = self.shutdown_timeout;
        self.stop(timeout)
    }

    /// Keep the redirection for the remainder of the process
    pub fn detach(self) {
        debug!("Redirection detached for the process lifetime");
        std::mem::forget(self);
    }

    fn stop(&mut self, timeout: Duration) -> Vec<(StdStream, ReaderExit)> {
        let Some(runtime) = self.runtime.take() else {
            return Vec::new();
        };

        flush_stdio();
        for active in &self.active {
            // SAFETY: both descriptors are valid; dup2 atomically replaces the target
            if unsafe { libc::dup2(active.saved.as_raw_fd(), active.stream.fd()) } < 0 {
                warn!(
                    "Failed to restore {}: {}",
                    active.stream,
                    io::Error::last_os_error()
                );
            }
        }

        let active = std::mem::take(&mut self.active);
        let shutdown_tx = self.shutdown_tx.clone();
        let exits = runtime.block_on(async move {
            let deadline = tokio::time::Instant::now() + timeout;
            let mut exits = Vec::with_capacity(active.len());
            for ActiveStream { stream, saved, mut handle } in active {
                drop(saved);
                let exit = match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(joined) => joined.unwrap_or(ReaderExit::Failed(ErrorKind::Other)),
                    Err(_) => {
                        debug!("{} reader still running after {:?}, signalling", stream, timeout);
                        let _ = shutdown_tx.send(true);
                        handle.await.unwrap_or(ReaderExit::Failed(ErrorKind::Other))
                    }
                };
                exits.push((stream, exit));
            }
            exits
        });

        runtime.shutdown_timeout(DROP_TIMEOUT);
        REDIRECTED.store(false, Ordering::SeqCst);
        info!("Standard stream redirection stopped");
        exits
    }
}

impl Drop for Redirection {
    fn drop(&mut self) {
        self.stop(DROP_TIMEOUT);
    }
}

/// The stream keeps writing to its original descriptor
fn report_failed_stream(sink: &dyn LogSink, tag: &str, stream: StdStream, error: &BridgeError) {
    warn!("{}", error);
    let message = format!("Couldn't start redirecting {} to logcat.", stream);
    sink.write(Priority::Error, tag, message.as_bytes());
}

/// Set up the pipe for one stream and swap it in
///
/// Returns the registered read end and a duplicate of the replaced descriptor.
/// Nothing is changed in the process if an error is returned.
fn redirect_stream(runtime: &Runtime, stream: StdStream) -> io::Result<(pipe::Receiver, OwnedFd)> {
    let (read_end, write_end) = create_pipe()?;

    let receiver = {
        let _guard = runtime.enter();
        pipe::Receiver::from_owned_fd(read_end)?
    };

    let saved = dup_cloexec(stream.fd())?;

    // SAFETY: both descriptors are valid; dup2 atomically replaces the target
    if unsafe { libc::dup2(write_end.as_raw_fd(), stream.fd()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    debug!(
        "{} now writes to pipe (read fd {})",
        stream,
        receiver.as_raw_fd()
    );

    Ok((receiver, saved))
}

/// Pipe with both ends close-on-exec; `dup2` clears the flag on the copy
fn create_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [RawFd; 2] = [-1; 2];

    #[cfg(any(target_os = "linux", target_os = "android"))]
    // SAFETY: fds has room for both descriptors
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    // SAFETY: fds has room for both descriptors
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };

    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe returned two fresh descriptors owned by nobody else
    let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    for fd in [&read_end, &write_end] {
        // SAFETY: fd is a valid descriptor
        if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok((read_end, write_end))
}

fn dup_cloexec(fd: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: F_DUPFD_CLOEXEC on a valid descriptor returns a new descriptor we own
    let copy = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) };
    if copy < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: copy was just returned by fcntl
    Ok(unsafe { OwnedFd::from_raw_fd(copy) })
}

fn flush_stdio() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    // SAFETY: fflush(NULL) flushes every open C output stream
    unsafe {
        libc::fflush(std::ptr::null_mut());
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod c_stdio {
    unsafe extern "C" {
        pub static mut stdout: *mut libc::FILE;
        pub static mut stderr: *mut libc::FILE;
    }
}

/// Flush pending output and make C stdio unbuffered, so native writes reach
/// the pipes as they happen instead of at exit
fn unbuffer_stdio() {
    flush_stdio();

    #[cfg(any(target_os = "linux", target_os = "android"))]
    // SAFETY: stdout/stderr are the libc-provided standard FILE streams
    unsafe {
        libc::setvbuf(c_stdio::stdout, std::ptr::null_mut(), libc::_IONBF, 0);
        libc::setvbuf(c_stdio::stderr, std::ptr::null_mut(), libc::_IONBF, 0);
    }
}
