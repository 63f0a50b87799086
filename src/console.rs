//! One-way console notifications for the operator.
//!
//! Every message is also emitted as a `tracing` event, so the console is a
//! mirror of the log rather than a separate channel of truth.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Info(String),
    Warning(String),
    Error(String),
}

impl ConsoleEvent {
    pub fn message(&self) -> &str {
        match self {
            ConsoleEvent::Info(msg) | ConsoleEvent::Warning(msg) | ConsoleEvent::Error(msg) => msg,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleEvent::Error(_))
    }
}

impl std::fmt::Display for ConsoleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleEvent::Info(msg) => write!(f, "[INFO] {msg}"),
            ConsoleEvent::Warning(msg) => write!(f, "[WARN] {msg}"),
            ConsoleEvent::Error(msg) => write!(f, "[ERROR] {msg}"),
        }
    }
}

/// Cloneable handle to the console sink.
///
/// A silent console only logs. Send failures (receiver gone) are ignored.
#[derive(Debug, Clone, Default)]
pub struct Console {
    tx: Option<mpsc::UnboundedSender<ConsoleEvent>>,
}

impl Console {
    /// Create a console that forwards to `tx`.
    pub fn new(tx: mpsc::UnboundedSender<ConsoleEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a console and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConsoleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Console that only writes to the log.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn info(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!(target: "scancard", "{msg}");
        self.send(ConsoleEvent::Info(msg));
    }

    pub fn warn(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(target: "scancard", "{msg}");
        self.send(ConsoleEvent::Warning(msg));
    }

    pub fn error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        error!(target: "scancard", "{msg}");
        self.send(ConsoleEvent::Error(msg));
    }

    fn send(&self, event: ConsoleEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
