//! Output sinks for the frame stream.
//!
//! The control loop writes through [`FrameSink`]. [`JsonLinesSink`] writes
//! one JSON object per line straight to a writer. [`ChannelSink`] hands lines
//! to a bounded channel so a slow or vanished consumer is detected by a send
//! timeout instead of blocking the loop forever.

use std::io::Write;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use tracing::debug;

use super::error::SinkError;
use super::frame::Record;

/// Ordered destination for control-loop records.
pub trait FrameSink {
    /// Writes one record. Records must reach the consumer in call order.
    fn emit(&mut self, record: &Record) -> Result<(), SinkError>;
}

/// Writes each record as a JSON line and flushes it.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn emit(&mut self, record: &Record) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Sends encoded lines over a bounded channel with a send timeout.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<String>,
    timeout: Duration,
}

impl ChannelSink {
    /// Creates a sink and the receiving end of its channel.
    pub fn bounded(capacity: usize, timeout: Duration) -> (Self, Receiver<String>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx, timeout }, rx)
    }

    /// Creates a sink drained by a background thread into `writer`.
    ///
    /// The thread ends when the sink is dropped or the writer fails; in the
    /// latter case further emits report [`SinkError::Disconnected`]. The join
    /// handle yields the number of lines written.
    pub fn spawn_writer<W>(
        writer: W,
        capacity: usize,
        timeout: Duration,
    ) -> (Self, thread::JoinHandle<std::io::Result<u64>>)
    where
        W: Write + Send + 'static,
    {
        let (sink, rx) = Self::bounded(capacity, timeout);
        let handle = thread::spawn(move || drain(rx, writer));
        (sink, handle)
    }
}

impl FrameSink for ChannelSink {
    fn emit(&mut self, record: &Record) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        self.tx
            .send_timeout(line, self.timeout)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => SinkError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                },
                SendTimeoutError::Disconnected(_) => SinkError::Disconnected,
            })
    }
}

fn drain<W: Write>(rx: Receiver<String>, mut writer: W) -> std::io::Result<u64> {
    let mut written = 0;
    for line in rx {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        written += 1;
    }
    debug!(written, "frame writer drained");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::frame::TerminalMarker;

    fn marker(t: u64) -> Record {
        Record::Terminal(TerminalMarker::new(t, "test"))
    }

    #[test]
    fn json_lines_one_record_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(&marker(1)).unwrap();
        sink.emit(&marker(2)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["simulationTime"], 2);
    }

    #[test]
    fn channel_preserves_order() {
        let (mut sink, rx) = ChannelSink::bounded(8, Duration::from_millis(50));
        for t in 0..5 {
            sink.emit(&marker(t)).unwrap();
        }
        drop(sink);
        let times: Vec<u64> = rx
            .iter()
            .map(|l| serde_json::from_str::<serde_json::Value>(&l).unwrap()["simulationTime"].as_u64().unwrap())
            .collect();
        assert_eq!(times, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stalled_consumer_times_out() {
        let (mut sink, _rx) = ChannelSink::bounded(1, Duration::from_millis(20));
        sink.emit(&marker(1)).unwrap();
        let err = sink.emit(&marker(2)).unwrap_err();
        assert!(matches!(err, SinkError::Timeout { timeout_ms: 20 }));
    }

    #[test]
    fn dropped_consumer_is_disconnected() {
        let (mut sink, rx) = ChannelSink::bounded(1, Duration::from_millis(20));
        drop(rx);
        assert!(matches!(
            sink.emit(&marker(1)),
            Err(SinkError::Disconnected)
        ));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failure_surfaces_as_disconnect() {
        let (mut sink, handle) =
            ChannelSink::spawn_writer(BrokenPipe, 1, Duration::from_millis(200));
        sink.emit(&marker(1)).unwrap();
        // The writer thread exits on its first failed write and drops the receiver.
        assert!(handle.join().unwrap().is_err());
        assert!(matches!(
            sink.emit(&marker(2)),
            Err(SinkError::Disconnected)
        ));
    }

    #[test]
    fn writer_thread_counts_lines() {
        let (mut sink, handle) =
            ChannelSink::spawn_writer(std::io::sink(), 4, Duration::from_millis(200));
        for t in 0..3 {
            sink.emit(&marker(t)).unwrap();
        }
        drop(sink);
        assert_eq!(handle.join().unwrap().unwrap(), 3);
    }
}
