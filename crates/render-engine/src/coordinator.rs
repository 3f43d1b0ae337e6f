//! Process-wide exclusivity between batch and streaming encodes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use notecast_common::config::EncodeConfig;
use notecast_common::error::{NotecastError, NotecastResult};
use notecast_process_core::ProcessRunner;

use crate::events::EventSink;
use crate::frames::{EncodeOutcome, FrameVideoEncoder};
use crate::job::EncodeJob;
use crate::stream::{FramePayload, StreamSession, StreamSpec, StreamingVideoEncoder};

const SLOT_IDLE: u8 = 0;
const SLOT_BATCH: u8 = 1;
const SLOT_STREAM: u8 = 2;

/// Kind of render occupying the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveRender {
    Batch,
    Stream,
}

impl ActiveRender {
    fn code(self) -> u8 {
        match self {
            ActiveRender::Batch => SLOT_BATCH,
            ActiveRender::Stream => SLOT_STREAM,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            SLOT_BATCH => Some(ActiveRender::Batch),
            SLOT_STREAM => Some(ActiveRender::Stream),
            _ => None,
        }
    }
}

/// Releases the render slot when dropped.
#[derive(Debug)]
struct SlotGuard {
    slot: Arc<AtomicU8>,
    kind: ActiveRender,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.store(SLOT_IDLE, Ordering::Release);
        tracing::debug!(kind = ?self.kind, "Render slot released");
    }
}

struct ActiveStream {
    session: StreamSession,
    _guard: SlotGuard,
}

/// Owns the single render slot and the current streaming session.
///
/// Starting either kind of render claims the slot with a compare-and-set;
/// a claim against an occupied slot is rejected, never queued. Frame
/// writes hold the session lock, so at most one write is in flight.
pub struct RenderCoordinator {
    slot: Arc<AtomicU8>,
    frames: FrameVideoEncoder,
    streaming: StreamingVideoEncoder,
    stream: Mutex<Option<ActiveStream>>,
}

impl RenderCoordinator {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: EncodeConfig) -> Self {
        Self {
            slot: Arc::new(AtomicU8::new(SLOT_IDLE)),
            frames: FrameVideoEncoder::new(Arc::clone(&runner), config.clone()),
            streaming: StreamingVideoEncoder::new(runner, config),
            stream: Mutex::new(None),
        }
    }

    /// Render currently holding the slot.
    pub fn active(&self) -> Option<ActiveRender> {
        ActiveRender::from_code(self.slot.load(Ordering::Acquire))
    }

    fn acquire(&self, kind: ActiveRender) -> NotecastResult<SlotGuard> {
        match self
            .slot
            .compare_exchange(SLOT_IDLE, kind.code(), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                tracing::debug!(?kind, "Render slot acquired");
                Ok(SlotGuard {
                    slot: Arc::clone(&self.slot),
                    kind,
                })
            }
            Err(current) => {
                let busy = ActiveRender::from_code(current)
                    .map(|k| format!("{k:?}").to_lowercase())
                    .unwrap_or_else(|| "another".to_string());
                Err(NotecastError::session_state(format!(
                    "a {busy} render is already in progress"
                )))
            }
        }
    }

    /// Run a frame-sequence encode while holding the slot.
    ///
    /// Invalid jobs are rejected before the slot is touched.
    pub async fn render_frames(
        &self,
        job: &EncodeJob,
        events: &EventSink,
    ) -> NotecastResult<EncodeOutcome> {
        job.validate()?;
        let _guard = self.acquire(ActiveRender::Batch)?;
        self.frames.encode(job, events).await
    }

    /// Start a streaming session. Fails if any render is active.
    pub async fn start_stream(&self, spec: StreamSpec) -> NotecastResult<()> {
        let guard = self.acquire(ActiveRender::Stream)?;
        let mut stream = self.stream.lock().await;
        let session = self.streaming.start(spec).await?;
        *stream = Some(ActiveStream {
            session,
            _guard: guard,
        });
        Ok(())
    }

    /// Write one frame to the active session.
    pub async fn push_frame(&self, frame: &FramePayload) -> NotecastResult<()> {
        let mut stream = self.stream.lock().await;
        let active = stream
            .as_mut()
            .ok_or_else(|| NotecastError::session_state("no streaming session is active"))?;
        active.session.push_frame(frame).await
    }

    /// Frames written to the active session so far.
    pub async fn frames_written(&self) -> Option<u64> {
        self.stream
            .lock()
            .await
            .as_ref()
            .map(|active| active.session.frames_written())
    }

    /// Finish the active session and release the slot.
    ///
    /// The slot stays claimed until the encoder has exited.
    pub async fn end_stream(&self) -> NotecastResult<PathBuf> {
        let active = self
            .stream
            .lock()
            .await
            .take()
            .ok_or_else(|| NotecastError::session_state("no streaming session is active"))?;
        let ActiveStream { session, _guard } = active;
        session.end().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecast_process_core::scripted::ScriptedRunner;

    fn stream_spec() -> StreamSpec {
        StreamSpec::new(640, 480, 30.0, "1000k", "/work/output.aac", "/work/live.mp4").unwrap()
    }

    #[tokio::test]
    async fn test_stream_is_rejected_while_batch_holds_slot() {
        let runner = ScriptedRunner::new();
        let coordinator = RenderCoordinator::new(Arc::new(runner.clone()), EncodeConfig::default());

        let batch = coordinator.acquire(ActiveRender::Batch).unwrap();
        let err = coordinator.start_stream(stream_spec()).await.unwrap_err();
        assert!(matches!(err, NotecastError::SessionState { .. }));
        assert!(err.to_string().contains("batch"), "{err}");
        assert_eq!(coordinator.active(), Some(ActiveRender::Batch));
        assert!(runner.invocations().is_empty());
        assert_eq!(coordinator.frames_written().await, None);

        drop(batch);
        assert_eq!(coordinator.active(), None);
        coordinator.start_stream(stream_spec()).await.unwrap();
        assert_eq!(coordinator.active(), Some(ActiveRender::Stream));
        coordinator.end_stream().await.unwrap();
        assert_eq!(coordinator.active(), None);
    }

    #[test]
    fn test_second_claim_is_rejected_until_release() {
        let coordinator =
            RenderCoordinator::new(Arc::new(ScriptedRunner::new()), EncodeConfig::default());
        let first = coordinator.acquire(ActiveRender::Stream).unwrap();
        assert!(coordinator.acquire(ActiveRender::Batch).is_err());
        drop(first);
        assert!(coordinator.acquire(ActiveRender::Batch).is_ok());
    }
}
