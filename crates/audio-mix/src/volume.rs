//! Loudness pre-scaling of the named hit-sound clips.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use notecast_chart_model::VolumeTable;
use notecast_common::config::{ClipSlot, WorkspaceLayout};
use notecast_common::error::{NotecastError, NotecastResult};
use notecast_process_core::ProcessRunner;

use crate::path_arg;

/// One clip whose samples get scaled in place.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeAdjustment {
    /// Canonical clip path, overwritten on success.
    pub path: PathBuf,

    /// Linear gain factor.
    pub gain: f64,
}

impl VolumeAdjustment {
    /// Sibling file the encoder writes before it replaces the clip.
    pub fn temp_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{stem}_adjusted.wav"))
    }
}

/// Scales clip loudness through the encoder, replacing files atomically.
pub struct VolumeNormalizer {
    runner: Arc<dyn ProcessRunner>,
    pcm_codec: String,
}

impl VolumeNormalizer {
    pub fn new(runner: Arc<dyn ProcessRunner>, pcm_codec: impl Into<String>) -> Self {
        Self {
            runner,
            pcm_codec: pcm_codec.into(),
        }
    }

    /// Adjustments for every configured clip present in the workspace.
    ///
    /// Clips missing on disk are skipped; hit events that reference them
    /// are rejected separately before mixing starts.
    pub fn plan(
        layout: &WorkspaceLayout,
        clip_slots: &[ClipSlot],
        volumes: &VolumeTable,
    ) -> Vec<VolumeAdjustment> {
        clip_slots
            .iter()
            .filter_map(|clip| {
                let path = layout.path(&clip.file_name);
                if !path.is_file() {
                    tracing::debug!(clip = %clip.file_name, "Clip not present, skipping volume adjustment");
                    return None;
                }
                let gain = volumes.gain(clip.slot)?;
                Some(VolumeAdjustment { path, gain })
            })
            .collect()
    }

    pub fn adjustment_args(&self, input: &Path, output: &Path, gain: f64) -> Vec<String> {
        vec![
            "-i".to_string(),
            path_arg(input),
            "-filter:a".to_string(),
            format!("volume={gain}"),
            "-c:a".to_string(),
            self.pcm_codec.clone(),
            "-f".to_string(),
            "wav".to_string(),
            "-y".to_string(),
            path_arg(output),
        ]
    }

    /// Scale one clip: encode to a temp file, then rename it over the clip.
    ///
    /// The canonical path is never written partially; on any failure the
    /// temp file is removed and the original clip is left untouched.
    pub async fn adjust(&self, adjustment: &VolumeAdjustment) -> NotecastResult<()> {
        let temp = adjustment.temp_path();
        let args = self.adjustment_args(&adjustment.path, &temp, adjustment.gain);
        tracing::debug!(clip = %adjustment.path.display(), gain = adjustment.gain, "Adjusting clip volume");

        if let Err(err) = self.runner.run_quiet(&args).await {
            remove_if_present(&temp);
            tracing::error!(clip = %adjustment.path.display(), error = %err, "Volume adjustment failed");
            return Err(err);
        }

        if let Err(err) = std::fs::rename(&temp, &adjustment.path) {
            remove_if_present(&temp);
            return Err(NotecastError::filesystem(&adjustment.path, err));
        }

        tracing::info!(
            clip = %adjustment.path.display(),
            percent = adjustment.gain * 100.0,
            "Clip volume adjusted"
        );
        Ok(())
    }

    /// Run all adjustments concurrently and wait for every one to settle.
    ///
    /// Returns the first failure only after all in-flight adjustments have
    /// finished, so no encoder is still writing when the caller proceeds.
    pub async fn adjust_all(self: &Arc<Self>, adjustments: Vec<VolumeAdjustment>) -> NotecastResult<usize> {
        let count = adjustments.len();
        let mut tasks = JoinSet::new();
        for adjustment in adjustments {
            let normalizer = Arc::clone(self);
            tasks.spawn(async move { normalizer.adjust(&adjustment).await });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| NotecastError::Other(e.into()));
            if let Err(err) = result.and_then(|r| r) {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }
}

fn remove_if_present(path: &Path) {
    if path.exists() {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecast_process_core::scripted::ScriptedRunner;

    #[test]
    fn test_temp_path_sits_next_to_clip() {
        let adjustment = VolumeAdjustment {
            path: PathBuf::from("/work/a40.wav"),
            gain: 0.8,
        };
        assert_eq!(
            adjustment.temp_path(),
            PathBuf::from("/work/a40_adjusted.wav")
        );
    }

    #[test]
    fn test_adjustment_args() {
        let normalizer = VolumeNormalizer::new(Arc::new(ScriptedRunner::new()), "pcm_s16le");
        let args = normalizer.adjustment_args(
            Path::new("/work/a0.wav"),
            Path::new("/work/a0_adjusted.wav"),
            0.5,
        );
        assert_eq!(
            args,
            [
                "-i",
                "/work/a0.wav",
                "-filter:a",
                "volume=0.5",
                "-c:a",
                "pcm_s16le",
                "-f",
                "wav",
                "-y",
                "/work/a0_adjusted.wav"
            ]
        );
    }

    #[test]
    fn test_plan_skips_missing_clips_and_shares_slots() {
        let dir = std::env::temp_dir().join(format!("notecast_volume_plan_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a40.wav"), b"").unwrap();
        std::fs::write(dir.join("a41.wav"), b"").unwrap();

        let layout = WorkspaceLayout::in_dir(&dir);
        let slots = notecast_common::config::MixConfig::default().clip_slots;
        let volumes = notecast_chart_model::parse_volume_list("100,100,100,100,40,100", 6).unwrap();
        let plan = VolumeNormalizer::plan(&layout, &slots, &volumes);

        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|a| (a.gain - 0.4).abs() < 1e-12));
        std::fs::remove_dir_all(&dir).ok();
    }
}
