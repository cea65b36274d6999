//! Per-run event channel.
//!
//! Every run gets its own sender, so overlapping runs never share a log
//! sink. Log lines are mirrored to `tracing`.

use std::sync::Mutex;

use tokio::sync::mpsc;

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiderEvent {
    /// Human-readable progress line.
    Log(String),
    /// Processing of an item began.
    ItemStarted {
        index: usize,
        total: usize,
        url: String,
    },
    /// Processing of an item ended (successfully or not).
    ItemFinished { index: usize, ok: bool },
    /// The run is over. Sent exactly once.
    Finished,
}

/// Receiver of diagnostic lines from the extraction code.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);

    /// Unexpected-input diagnostics; defaults to a plain log line.
    fn diagnostic(&self, message: &str) {
        self.log(message);
    }
}

/// Sending half of a run's event channel.
#[derive(Debug, Clone)]
pub struct EventLog {
    tx: mpsc::UnboundedSender<SpiderEvent>,
}

impl EventLog {
    pub fn new(tx: mpsc::UnboundedSender<SpiderEvent>) -> Self {
        Self { tx }
    }

    /// Create a log together with the receiver for its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SpiderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Log sink that discards everything except the `tracing` mirror.
    pub fn detached() -> Self {
        let (log, _rx) = Self::channel();
        log
    }

    pub fn emit(&self, event: SpiderEvent) {
        // The observer may have gone away; the run carries on regardless.
        let _ = self.tx.send(event);
    }

    pub fn finished(&self) {
        self.emit(SpiderEvent::Finished);
    }
}

impl LogSink for EventLog {
    fn log(&self, message: &str) {
        tracing::info!("{}", message);
        self.emit(SpiderEvent::Log(message.to_string()));
    }

    fn diagnostic(&self, message: &str) {
        tracing::warn!("{}", message);
        self.emit(SpiderEvent::Log(message.to_string()));
    }
}

/// Collects log lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}
