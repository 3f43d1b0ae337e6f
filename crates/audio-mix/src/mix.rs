//! Batched mixing of hit sounds over the main track.
//!
//! The encoder's filter graph degrades badly with hundreds of inputs, so
//! events are mixed in fixed-size batches. Each batch takes the previous
//! batch's output as its base track; batch `n` writes `intermediate_n.wav`.
//! Mixing uses `normalize=0`, so chaining batches sums exactly the same
//! signals a single pass would.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notecast_chart_model::{HitEvent, VolumeTable};
use notecast_common::config::{MixConfig, WorkspaceLayout};
use notecast_common::error::{NotecastError, NotecastResult};
use notecast_process_core::ProcessRunner;

use crate::path_arg;
use crate::transcode::Transcoder;
use crate::volume::VolumeNormalizer;

/// Inputs to one mixing job.
#[derive(Debug, Clone)]
pub struct MixRequest {
    pub events: Vec<HitEvent>,
    pub volumes: VolumeTable,
}

/// Outcome of a completed mixing job.
#[derive(Debug, Clone, PartialEq)]
pub struct MixReport {
    /// Compressed mixed track.
    pub output: PathBuf,
    pub events: usize,
    pub batches: usize,
    pub adjusted_clips: usize,
}

/// Build the filter graph for one batch.
///
/// Input 0 is the base track; input `k + 1` is the clip of `events[k]`.
///
/// ```text
/// [1:a]adelay=0|0[d0];[2:a]adelay=500|500[d1];[0:a][d0][d1]amix=inputs=3:duration=longest:normalize=0
/// ```
pub fn build_filter_graph(events: &[HitEvent]) -> String {
    let mut parts: Vec<String> = events
        .iter()
        .enumerate()
        .map(|(k, event)| {
            let delay = event.delay_ms();
            format!("[{}:a]adelay={delay}|{delay}[d{k}]", k + 1)
        })
        .collect();

    let labels: String = (0..events.len()).map(|k| format!("[d{k}]")).collect();
    parts.push(format!(
        "[0:a]{labels}amix=inputs={}:duration=longest:normalize=0",
        events.len() + 1
    ));
    parts.join(";")
}

/// Mixes hit events into the main track and produces the compressed result.
pub struct AudioMixEngine {
    runner: Arc<dyn ProcessRunner>,
    layout: WorkspaceLayout,
    config: MixConfig,
}

impl AudioMixEngine {
    pub fn new(runner: Arc<dyn ProcessRunner>, layout: WorkspaceLayout, config: MixConfig) -> Self {
        Self {
            runner,
            layout,
            config,
        }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Split events into consecutive batches, preserving order.
    pub fn plan_batches<'a>(&self, events: &'a [HitEvent]) -> Vec<&'a [HitEvent]> {
        events.chunks(self.config.batch_size.max(1)).collect()
    }

    /// Arguments for one batch: base track, one input per event, PCM output.
    pub fn batch_args(&self, base: &Path, events: &[HitEvent], output: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(events.len() * 2 + 8);
        args.push("-i".to_string());
        args.push(path_arg(base));
        for event in events {
            args.push("-i".to_string());
            args.push(path_arg(&self.layout.path(&event.clip_id)));
        }
        args.push("-filter_complex".to_string());
        args.push(build_filter_graph(events));
        args.push("-c:a".to_string());
        args.push(self.config.pcm_codec.clone());
        args.push("-y".to_string());
        args.push(path_arg(output));
        args
    }

    /// Run the whole mixing job.
    ///
    /// Steps, each gated on the previous one succeeding:
    /// 1. check the main track and every referenced clip exist
    /// 2. scale configured clips by their slot volume (concurrently)
    /// 3. mix batches in order, chaining outputs
    /// 4. transcode the last output to the mixed track
    ///
    /// Intermediate files are removed afterwards whether or not the job
    /// succeeded.
    pub async fn mix(&self, request: &MixRequest) -> NotecastResult<MixReport> {
        let result = self.mix_inner(request).await;
        match self.clean_intermediates() {
            Ok(removed) if removed > 0 => {
                tracing::debug!(removed, "Removed intermediate mix files");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed to remove intermediate mix files");
            }
        }
        result
    }

    async fn mix_inner(&self, request: &MixRequest) -> NotecastResult<MixReport> {
        let main_track = self.layout.main_track_path();
        if !main_track.is_file() {
            return Err(NotecastError::filesystem(&main_track, "main track not found"));
        }
        self.check_clips(&request.events)?;

        tracing::info!(
            events = request.events.len(),
            batch_size = self.config.batch_size,
            dir = %self.layout.dir.display(),
            "Starting audio mix"
        );

        let normalizer = Arc::new(VolumeNormalizer::new(
            Arc::clone(&self.runner),
            &self.config.pcm_codec,
        ));
        let adjustments =
            VolumeNormalizer::plan(&self.layout, &self.config.clip_slots, &request.volumes);
        let adjusted_clips = normalizer.adjust_all(adjustments).await?;

        let batches = self.plan_batches(&request.events);
        let mut last_output = main_track;
        for (index, batch) in batches.iter().enumerate() {
            let output = self.layout.intermediate_path(index);
            tracing::info!(
                batch = index + 1,
                total = batches.len(),
                events = batch.len(),
                "Mixing batch"
            );
            let args = self.batch_args(&last_output, batch, &output);
            self.runner.run_quiet(&args).await?;
            if !output.is_file() {
                return Err(NotecastError::filesystem(
                    &output,
                    "encoder reported success but wrote no output",
                ));
            }
            last_output = output;
        }

        let mixed = self.layout.mixed_track_path();
        Transcoder::from_config(Arc::clone(&self.runner), &self.config)
            .transcode(&last_output, &mixed)
            .await?;

        tracing::info!(output = %mixed.display(), batches = batches.len(), "Audio mix complete");
        Ok(MixReport {
            output: mixed,
            events: request.events.len(),
            batches: batches.len(),
            adjusted_clips,
        })
    }

    /// Every clip an event references must be present before mixing starts.
    fn check_clips(&self, events: &[HitEvent]) -> NotecastResult<()> {
        let missing: BTreeSet<&str> = events
            .iter()
            .map(|e| e.clip_id.as_str())
            .filter(|clip| !self.layout.path(clip).is_file())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            let names: Vec<&str> = missing.into_iter().collect();
            Err(NotecastError::validation(format!(
                "hit events reference missing clips: {}",
                names.join(", ")
            )))
        }
    }

    /// Delete every intermediate batch file in the workspace.
    pub fn clean_intermediates(&self) -> NotecastResult<usize> {
        let entries = match std::fs::read_dir(&self.layout.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(NotecastError::filesystem(&self.layout.dir, err)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if !self.layout.is_intermediate(&name.to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            std::fs::remove_file(&path).map_err(|e| NotecastError::filesystem(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }
}
