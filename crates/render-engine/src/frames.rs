//! Frame-sequence encoding with a single hardware-to-software fallback.

use std::path::PathBuf;
use std::sync::Arc;

use notecast_common::config::EncodeConfig;
use notecast_common::error::{NotecastError, NotecastResult};
use notecast_process_core::{LineAction, ProcessRunner};

use crate::events::{EventSink, RenderEvent};
use crate::hardware::HardwareFailure;
use crate::job::{EncodeJob, EncodeMode, EncodeState};
use crate::progress::ProgressTracker;

/// Result of a successful frame-sequence encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutcome {
    pub output: PathBuf,

    /// Variant that produced the output.
    pub mode: EncodeMode,

    /// Whether the hardware attempt failed first.
    pub fell_back: bool,
}

/// How one attempt ended.
enum AttemptEnd {
    Completed,
    /// Stopped because the hardware encoder reported it cannot run.
    Incompatible(HardwareFailure),
}

/// Muxes a numbered frame sequence with the finished audio track.
pub struct FrameVideoEncoder {
    runner: Arc<dyn ProcessRunner>,
    config: EncodeConfig,
}

impl FrameVideoEncoder {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: EncodeConfig) -> Self {
        Self { runner, config }
    }

    /// Encode `job`, trying the hardware variant first.
    ///
    /// A hardware-incompatibility phrase stops the hardware attempt at
    /// once; that or any process failure in hardware mode leads to exactly
    /// one software attempt. A software failure is returned as is.
    pub async fn encode(&self, job: &EncodeJob, events: &EventSink) -> NotecastResult<EncodeOutcome> {
        job.validate()?;

        let mut tracker = ProgressTracker::new();
        let mut state = EncodeState::Idle.launch()?;
        let mut fell_back = false;

        loop {
            let mode = state.mode().ok_or_else(|| {
                NotecastError::session_state(format!("no encoder variant for {state:?}"))
            })?;
            events.emit(RenderEvent::Started { mode });

            let result = self.attempt(job, mode, &mut tracker, events).await;
            let (failure, error) = match result {
                Ok(AttemptEnd::Completed) => (None, None),
                Ok(AttemptEnd::Incompatible(failure)) => (Some(failure.to_string()), None),
                Err(err) if err.is_process_failure() => (Some(err.to_string()), Some(err)),
                Err(err) => return Err(err),
            };

            state = state.attempt_finished(failure.is_none())?;
            match state {
                EncodeState::Succeeded => break,
                EncodeState::FallingBackToCpu => {
                    let reason = failure.unwrap_or_default();
                    tracing::warn!(reason = %reason, "Hardware encode failed, retrying with software encoder");
                    events.emit(RenderEvent::FallingBackToCpu { reason });
                    fell_back = true;
                    state = state.launch()?;
                }
                EncodeState::Failed => {
                    let err = error.unwrap_or_else(|| {
                        NotecastError::session_state("software encode stopped without an exit status")
                    });
                    tracing::error!(error = %err, "Software encode failed");
                    return Err(err);
                }
                other => {
                    return Err(NotecastError::session_state(format!(
                        "encode ended in unexpected state {other:?}"
                    )))
                }
            }
        }

        if let Some(percent) = tracker.complete() {
            events.emit(RenderEvent::Progress { percent });
        }
        let mode = if fell_back { EncodeMode::Cpu } else { EncodeMode::Gpu };
        tracing::info!(output = %job.output.display(), %mode, fell_back, "Video encode complete");
        events.emit(RenderEvent::Finished {
            output: job.output.clone(),
        });

        Ok(EncodeOutcome {
            output: job.output.clone(),
            mode,
            fell_back,
        })
    }

    async fn attempt(
        &self,
        job: &EncodeJob,
        mode: EncodeMode,
        tracker: &mut ProgressTracker,
        events: &EventSink,
    ) -> NotecastResult<AttemptEnd> {
        let args = job.args(mode, &self.config);
        tracing::info!(
            %mode,
            frame_rate = job.frame_rate,
            bitrate_kbps = job.bitrate_kbps,
            output = %job.output.display(),
            "Starting video encode"
        );

        let mut detected = None;
        let mut observer = |line: &str| {
            if let Some(percent) = tracker.observe(line) {
                tracing::debug!(percent, "Encode progress");
                events.emit(RenderEvent::Progress { percent });
            }
            if mode == EncodeMode::Gpu {
                if let Some(failure) = HardwareFailure::classify(line) {
                    detected = Some(failure);
                    return LineAction::Terminate;
                }
            }
            LineAction::Continue
        };
        let output = self.runner.run(&args, &mut observer).await?;

        match detected {
            Some(failure) if output.terminated_early => Ok(AttemptEnd::Incompatible(failure)),
            _ => Ok(AttemptEnd::Completed),
        }
    }
}
