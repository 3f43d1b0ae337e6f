//! Typed render notifications.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::job::EncodeMode;

/// Notifications published while a frame-sequence encode runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    /// An encoder attempt was launched.
    Started { mode: EncodeMode },

    /// Whole-percent progress, never decreasing within one encode.
    Progress { percent: u8 },

    /// The hardware attempt failed and a software attempt follows.
    FallingBackToCpu { reason: String },

    /// The output file was written.
    Finished { output: PathBuf },
}

/// Optional event sink. A closed receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<RenderEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<RenderEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that drops every event.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: RenderEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("Render event receiver dropped");
            }
        }
    }
}

impl From<UnboundedSender<RenderEvent>> for EventSink {
    fn from(tx: UnboundedSender<RenderEvent>) -> Self {
        Self::new(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&RenderEvent::Progress { percent: 42 }).unwrap();
        assert_eq!(json, r#"{"type":"progress","percent":42}"#);

        let json = serde_json::to_string(&RenderEvent::Started {
            mode: EncodeMode::Gpu,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"started","mode":"gpu"}"#);
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        EventSink::new(tx).emit(RenderEvent::Progress { percent: 1 });
    }
}
