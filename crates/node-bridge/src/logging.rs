//! tracing subscriber for the bridge's own diagnostics
//!
//! Events are formatted by `tracing-subscriber` and handed to the platform
//! [`LogSink`], one record per event. They never go through fds 1/2, which
//! may be feeding the capture pipes.

use node_bridge_core::{BridgeConfig, BridgeError, LogSink, Priority, Result};
use node_bridge_redirect::strip_trailing_newline;
use std::io;
use std::sync::Arc;
use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Install the global subscriber
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init(config: &BridgeConfig, sink: Arc<dyn LogSink>) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| BridgeError::Config(format!("Invalid log filter: {}", e)))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(MakeSinkWriter::new(sink, &config.tag))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BridgeError::Config(format!("Logging already initialized: {}", e)))
}

fn priority_for(level: &Level) -> Priority {
    match *level {
        Level::ERROR => Priority::Error,
        Level::WARN => Priority::Warn,
        Level::INFO => Priority::Info,
        _ => Priority::Debug,
    }
}

/// `MakeWriter` producing one sink record per formatted event
#[derive(Clone)]
pub struct MakeSinkWriter {
    sink: Arc<dyn LogSink>,
    tag: Arc<str>,
}

impl MakeSinkWriter {
    pub fn new(sink: Arc<dyn LogSink>, tag: &str) -> Self {
        Self {
            sink,
            tag: tag.into(),
        }
    }
}

impl<'a> MakeWriter<'a> for MakeSinkWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter::new(self.sink.clone(), self.tag.clone(), Priority::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SinkWriter::new(self.sink.clone(), self.tag.clone(), priority_for(meta.level()))
    }
}

/// Buffers one formatted event and writes it to the sink when dropped
pub struct SinkWriter {
    sink: Arc<dyn LogSink>,
    tag: Arc<str>,
    priority: Priority,
    buf: Vec<u8>,
}

impl SinkWriter {
    fn new(sink: Arc<dyn LogSink>, tag: Arc<str>, priority: Priority) -> Self {
        Self {
            sink,
            tag,
            priority,
            buf: Vec::new(),
        }
    }
}

impl io::Write for SinkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            self.sink
                .write(self.priority, &self.tag, strip_trailing_newline(&self.buf));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_bridge_core::MemorySink;
    use std::io::Write;

    #[test]
    fn test_writer_emits_one_record_per_event() {
        let sink = Arc::new(MemorySink::new());
        let make = MakeSinkWriter::new(sink.clone(), "SEEKERCLAW-NODE");

        {
            let mut writer = make.make_writer();
            writer.write_all(b"first half ").unwrap();
            writer.write_all(b"second half\n").unwrap();
        }

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text(), "first half second half");
        assert_eq!(records[0].priority, Priority::Info);
    }

    #[test]
    fn test_empty_event_writes_nothing() {
        let sink = Arc::new(MemorySink::new());
        let make = MakeSinkWriter::new(sink.clone(), "SEEKERCLAW-NODE");
        drop(make.make_writer());
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(priority_for(&Level::ERROR), Priority::Error);
        assert_eq!(priority_for(&Level::WARN), Priority::Warn);
        assert_eq!(priority_for(&Level::INFO), Priority::Info);
        assert_eq!(priority_for(&Level::TRACE), Priority::Debug);
    }

    #[test]
    fn test_events_reach_sink_through_subscriber() {
        let sink = Arc::new(MemorySink::new());
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new("debug"))
            .with_ansi(false)
            .with_writer(MakeSinkWriter::new(sink.clone(), "SEEKERCLAW-NODE"))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("pipe setup degraded");
        });

        let warnings = sink.messages(Priority::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("pipe setup degraded"));
    }

    #[test]
    fn test_rejects_invalid_filter() {
        let config = BridgeConfig {
            log_filter: "node_bridge=loud".into(),
            ..Default::default()
        };
        let err = init(&config, Arc::new(MemorySink::new())).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
