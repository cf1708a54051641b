use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use super::model::ScrapeResult;

/// Events flowing from a run to whoever started it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { message: String, fraction: f64 },
    Success { message: String },
    Warning { message: String },
    /// Terminal.
    Error { message: String },
    Data { message: String, result: ScrapeResult },
    /// Terminal.
    Complete { message: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Error { .. } | ProgressEvent::Complete { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Progress { message, .. }
            | ProgressEvent::Success { message }
            | ProgressEvent::Warning { message }
            | ProgressEvent::Error { message }
            | ProgressEvent::Data { message, .. }
            | ProgressEvent::Complete { message } => message,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Success { .. } => "success",
            ProgressEvent::Warning { .. } => "warning",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Data { .. } => "data",
            ProgressEvent::Complete { .. } => "complete",
        }
    }
}

/// Sending half of the event channel. Once a terminal event has gone out,
/// everything else is dropped.
#[derive(Debug)]
pub struct ProgressReporter {
    sender: UnboundedSender<ProgressEvent>,
    terminated: bool,
}

impl ProgressReporter {
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn emit(&mut self, event: ProgressEvent) {
        if self.terminated {
            trace!(kind = event.label(), "dropping event after terminal");
            return;
        }
        self.terminated = event.is_terminal();
        // Consumer may have gone away; the run still finishes and tears down.
        let _ = self.sender.send(event);
    }

    pub fn progress(&mut self, message: impl Into<String>, fraction: f64) {
        self.emit(ProgressEvent::Progress {
            message: message.into(),
            fraction: fraction.clamp(0.0, 1.0),
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.emit(ProgressEvent::Success {
            message: message.into(),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.emit(ProgressEvent::Warning {
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(ProgressEvent::Error {
            message: message.into(),
        });
    }

    pub fn data(&mut self, message: impl Into<String>, result: ScrapeResult) {
        self.emit(ProgressEvent::Data {
            message: message.into(),
            result,
        });
    }

    pub fn complete(&mut self, message: impl Into<String>) {
        self.emit(ProgressEvent::Complete {
            message: message.into(),
        });
    }
}
