//! Redirects the real stdout/stderr of the test process.
//!
//! Kept as the only test in this binary: while it runs, fds 1 and 2 belong to
//! the capture pipes.

use node_bridge_core::{BridgeConfig, BridgeError, MemorySink, Priority, Record};
use node_bridge_redirect::{ReaderExit, StreamRedirector, is_redirected};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn write_fd(fd: i32, data: &[u8]) {
    // SAFETY: data is a valid buffer of data.len() bytes
    let written = unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) };
    assert_eq!(written, data.len() as isize);
}

fn wait_for(sink: &MemorySink, what: &str, pred: impl Fn(&[Record]) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if pred(&sink.records()) {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

fn count(records: &[Record], priority: Priority, text: &str) -> usize {
    records
        .iter()
        .filter(|r| r.priority == priority && r.text() == text)
        .count()
}

#[test]
fn test_stdout_and_stderr_reach_the_sink() {
    let sink = Arc::new(MemorySink::new());
    let config = BridgeConfig {
        shutdown_timeout_ms: 2000,
        ..Default::default()
    };

    let redirection = StreamRedirector::new(&config, sink.clone())
        .start()
        .expect("redirection starts");
    assert!(is_redirected());
    assert!(redirection.is_active(node_bridge_core::StdStream::Stdout));
    assert!(redirection.is_active(node_bridge_core::StdStream::Stderr));

    let second = StreamRedirector::new(&config, sink.clone()).start();
    assert!(matches!(second, Err(BridgeError::AlreadyRedirected)));

    write_fd(1, b"redirect-test hello\n");
    wait_for(&sink, "hello", |r| count(r, Priority::Info, "redirect-test hello") > 0);

    // Written in one call, so read back as one chunk
    write_fd(1, b"redirect-test line1\nredirect-test line2\n");
    wait_for(&sink, "multi-line", |r| {
        count(r, Priority::Info, "redirect-test line1\nredirect-test line2") > 0
    });

    write_fd(2, b"redirect-test oops\n");
    wait_for(&sink, "stderr", |r| count(r, Priority::Error, "redirect-test oops") > 0);

    let exits = redirection.shutdown();
    assert!(!is_redirected());
    assert_eq!(exits.len(), 2);
    for (stream, exit) in exits {
        assert_eq!(exit, ReaderExit::Closed, "{stream} reader");
    }

    let records = sink.records();
    assert_eq!(count(&records, Priority::Info, "redirect-test hello"), 1);
    assert_eq!(
        count(&records, Priority::Info, "redirect-test line1\nredirect-test line2"),
        1
    );
    assert_eq!(count(&records, Priority::Error, "redirect-test oops"), 1);
    assert!(records.iter().all(|r| r.tag == "SEEKERCLAW-NODE"));

    // A new redirection may start once the previous one is gone
    let again = StreamRedirector::new(&config, sink.clone()).start().expect("restart");
    drop(again);
    assert!(!is_redirected());
}
