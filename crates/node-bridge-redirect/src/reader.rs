//! Background reader that drains one capture pipe into the log sink

use node_bridge_core::{LogSink, StdStream};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tracing::debug;

/// Why a reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Every write end of the pipe was closed
    Closed,
    /// A read failed with a non-retryable error
    Failed(ErrorKind),
    /// Shutdown was signalled
    Shutdown,
}

/// Drop exactly one trailing `\n`, if present
pub fn strip_trailing_newline(chunk: &[u8]) -> &[u8] {
    chunk.strip_suffix(b"\n").unwrap_or(chunk)
}

/// Background reader task for one captured stream
///
/// Each successful read becomes exactly one record: at most `chunk_size`
/// bytes, one trailing newline stripped, embedded newlines kept. Records use
/// the stream's priority (stdout: info, stderr: error).
///
/// # Arguments
/// - `reader`: Read end of the capture pipe
/// - `stream`: Stream being captured, selects the record priority
/// - `tag`: Source tag for every record
/// - `chunk_size`: Read buffer size
/// - `sink`: Destination for records
/// - `shutdown`: Stops the reader when set to `true` or when the sender is dropped
pub async fn reader_task<R>(
    mut reader: R,
    stream: StdStream,
    tag: Arc<str>,
    chunk_size: usize,
    sink: Arc<dyn LogSink>,
    mut shutdown: watch::Receiver<bool>,
) -> ReaderExit
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let priority = stream.priority();

    let exit = loop {
        if *shutdown.borrow_and_update() {
            break ReaderExit::Shutdown;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break ReaderExit::Shutdown;
                }
            }

            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => break ReaderExit::Closed,
                    Ok(n) => sink.write(priority, &tag, strip_trailing_newline(&buf[..n])),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => break ReaderExit::Failed(e.kind()),
                }
            }
        }
    };

    debug!("{} reader exiting: {:?}", stream, exit);
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_bridge_core::{MemorySink, Priority};
    use std::io;
    use tokio_test::io::Builder;

    const TAG: &str = "SEEKERCLAW-NODE";

    async fn drain<R: AsyncRead + Unpin>(
        reader: R,
        stream: StdStream,
        chunk_size: usize,
    ) -> (ReaderExit, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let exit = reader_task(reader, stream, TAG.into(), chunk_size, sink.clone(), shutdown_rx).await;
        (exit, sink)
    }

    #[test]
    fn test_strip_trailing_newline() {
        assert_eq!(strip_trailing_newline(b"hello\n"), b"hello");
        assert_eq!(strip_trailing_newline(b"hello"), b"hello");
        assert_eq!(strip_trailing_newline(b"a\n\n"), b"a\n");
        assert_eq!(strip_trailing_newline(b"\n"), b"");
        assert_eq!(strip_trailing_newline(b""), b"");
    }

    #[tokio::test]
    async fn test_single_line_becomes_one_record() {
        let mock = Builder::new().read(b"hello\n").build();
        let (exit, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(exit, ReaderExit::Closed);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].priority, Priority::Info);
        assert_eq!(records[0].tag, TAG);
        assert_eq!(records[0].message, b"hello");
    }

    #[tokio::test]
    async fn test_multi_line_write_is_not_split() {
        let mock = Builder::new().read(b"line1\nline2\n").build();
        let (_, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(sink.messages(Priority::Info), vec!["line1\nline2"]);
    }

    #[tokio::test]
    async fn test_closed_before_first_write_emits_nothing() {
        let mock = Builder::new().build();
        let (exit, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(exit, ReaderExit::Closed);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_lone_newline_is_empty_record() {
        let mock = Builder::new().read(b"\n").build();
        let (_, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(sink.messages(Priority::Info), vec![""]);
    }

    #[tokio::test]
    async fn test_stderr_uses_error_priority() {
        let mock = Builder::new().read(b"TypeError: x is undefined\n").build();
        let (_, sink) = drain(mock, StdStream::Stderr, 2048).await;

        assert!(sink.messages(Priority::Info).is_empty());
        assert_eq!(sink.messages(Priority::Error), vec!["TypeError: x is undefined"]);
    }

    #[tokio::test]
    async fn test_oversized_write_spans_records() {
        let mock = Builder::new().read(b"abcdefgh\n").build();
        let (_, sink) = drain(mock, StdStream::Stdout, 4).await;

        assert_eq!(sink.messages(Priority::Info), vec!["abcd", "efgh", ""]);
    }

    #[tokio::test]
    async fn test_reads_are_records_in_order() {
        let mock = Builder::new().read(b"one\n").read(b"two").read(b"three\n").build();
        let (_, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(sink.messages(Priority::Info), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_read_error_stops_silently() {
        let mock = Builder::new()
            .read(b"before\n")
            .read_error(io::Error::new(ErrorKind::BrokenPipe, "gone"))
            .build();
        let (exit, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(exit, ReaderExit::Failed(ErrorKind::BrokenPipe));
        assert_eq!(sink.messages(Priority::Info), vec!["before"]);
    }

    #[tokio::test]
    async fn test_interrupted_read_is_retried() {
        let mock = Builder::new()
            .read_error(io::Error::new(ErrorKind::Interrupted, "signal"))
            .read(b"after\n")
            .build();
        let (exit, sink) = drain(mock, StdStream::Stdout, 2048).await;

        assert_eq!(exit, ReaderExit::Closed);
        assert_eq!(sink.messages(Priority::Info), vec!["after"]);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_idle_reader() {
        // Writer half stays open, so the reader would otherwise wait forever
        let (_writer, reader) = tokio::io::duplex(64);
        let sink = Arc::new(MemorySink::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(reader_task(
            reader,
            StdStream::Stdout,
            TAG.into(),
            2048,
            sink.clone(),
            shutdown_rx,
        ));
        shutdown_tx.send(true).unwrap();

        assert_eq!(task.await.unwrap(), ReaderExit::Shutdown);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_real_pipe_closed_without_writes() {
        use std::os::fd::{FromRawFd, OwnedFd};
        use tokio::net::unix::pipe;

        let mut fds = [0; 2];
        // SAFETY: fds has room for both descriptors
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: both descriptors were just created and are owned here
        let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        let receiver = pipe::Receiver::from_owned_fd(read_end).unwrap();
        drop(write_end);

        let (exit, sink) = drain(receiver, StdStream::Stdout, 2048).await;
        assert_eq!(exit, ReaderExit::Closed);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_real_pipe_forwards_writes() {
        use std::io::Write;
        use std::os::fd::{FromRawFd, OwnedFd};
        use tokio::net::unix::pipe;

        let mut fds = [0; 2];
        // SAFETY: fds has room for both descriptors
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: both descriptors were just created and are owned here
        let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        let receiver = pipe::Receiver::from_owned_fd(read_end).unwrap();
        let mut writer = std::fs::File::from(write_end);
        writer.write_all(b"hello\n").unwrap();
        drop(writer);

        let (exit, sink) = drain(receiver, StdStream::Stdout, 2048).await;
        assert_eq!(exit, ReaderExit::Closed);
        assert_eq!(sink.messages(Priority::Info), vec!["hello"]);
    }
}
