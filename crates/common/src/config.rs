//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NotecastError, NotecastResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// External encoder settings.
    pub encoder: EncoderConfig,

    /// File naming inside the render workspace.
    pub workspace: WorkspaceLayout,

    /// Hit-sound mixing parameters.
    pub mix: MixConfig,

    /// Video encode parameters.
    pub encode: EncodeConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// External encoder binary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Explicit path to the ffmpeg binary. `None` resolves automatically.
    pub binary: Option<PathBuf>,

    /// How many trailing diagnostic lines to keep for error reports.
    pub diagnostic_tail_lines: usize,
}

/// Fixed file names used inside the externally managed workspace directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceLayout {
    /// The workspace directory itself.
    pub dir: PathBuf,

    /// Main music track the hit sounds are mixed onto.
    pub main_track: String,

    /// Final compressed mix consumed by the video encoders.
    pub mixed_track: String,

    /// Batch-mode video output.
    pub video_output: String,

    /// Printf-style pattern of the numbered frame images.
    pub frame_pattern: String,

    /// Name prefix of transient per-batch mix files.
    pub intermediate_prefix: String,
}

/// One hit-sound file bound to a gain slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSlot {
    /// File name inside the workspace.
    pub file_name: String,

    /// Index into the volume list.
    pub slot: usize,
}

/// Hit-sound mixing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Maximum hit events per filter-graph invocation.
    pub batch_size: usize,

    /// Number of gain percentages expected in a volume list.
    pub slot_count: usize,

    /// Hit-sound files that get their loudness pre-scaled.
    pub clip_slots: Vec<ClipSlot>,

    /// Codec of the uncompressed intermediate mixes.
    pub pcm_codec: String,

    /// Codec of the final compressed mix.
    pub audio_codec: String,

    /// Bitrate of the final compressed mix.
    pub audio_bitrate: String,
}

/// Video encode parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Hardware encoder tried first in batch mode.
    pub gpu_codec: String,

    /// Software encoder used for fallback and streaming.
    pub cpu_codec: String,

    /// Value passed to `-hwaccel` on the GPU attempt.
    pub hwaccel: String,

    /// Output pixel format.
    pub pixel_format: String,

    /// x264 preset used by the streaming encoder.
    pub stream_preset: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "notecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: None,
            diagnostic_tail_lines: 20,
        }
    }
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("notecast"),
            main_track: "audio.mp3".to_string(),
            mixed_track: "output.aac".to_string(),
            video_output: "output.mp4".to_string(),
            frame_pattern: "f%d.png".to_string(),
            intermediate_prefix: "intermediate_".to_string(),
        }
    }
}

impl Default for MixConfig {
    fn default() -> Self {
        let slot = |file_name: &str, slot: usize| ClipSlot {
            file_name: file_name.to_string(),
            slot,
        };
        Self {
            batch_size: 100,
            slot_count: 6,
            clip_slots: vec![
                slot("a0.wav", 0),
                slot("a1.wav", 1),
                slot("a2.wav", 2),
                slot("a3.wav", 3),
                slot("a40.wav", 4),
                slot("a41.wav", 4),
                slot("a5.wav", 5),
            ],
            pcm_codec: "pcm_s16le".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            gpu_codec: "h264_nvenc".to_string(),
            cpu_codec: "libx264".to_string(),
            hwaccel: "auto".to_string(),
            pixel_format: "yuv420p".to_string(),
            stream_preset: "fast".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl WorkspaceLayout {
    /// Layout rooted at `dir` with default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn main_track_path(&self) -> PathBuf {
        self.path(&self.main_track)
    }

    pub fn mixed_track_path(&self) -> PathBuf {
        self.path(&self.mixed_track)
    }

    pub fn video_output_path(&self) -> PathBuf {
        self.path(&self.video_output)
    }

    pub fn frame_pattern_path(&self) -> PathBuf {
        self.path(&self.frame_pattern)
    }

    /// Path of the uncompressed output of mix batch `index`.
    pub fn intermediate_path(&self, index: usize) -> PathBuf {
        self.path(&format!("{}{index}.wav", self.intermediate_prefix))
    }

    /// Whether a file name follows the intermediate batch naming scheme.
    pub fn is_intermediate(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.intermediate_prefix) && file_name.ends_with(".wav")
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> NotecastResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the mixing and encoding stages cannot honor.
    pub fn validate(&self) -> NotecastResult<()> {
        if self.mix.batch_size == 0 {
            return Err(NotecastError::config("mix.batch_size must be at least 1"));
        }
        if self.mix.slot_count == 0 {
            return Err(NotecastError::config("mix.slot_count must be at least 1"));
        }
        if let Some(bad) = self
            .mix
            .clip_slots
            .iter()
            .find(|c| c.slot >= self.mix.slot_count)
        {
            return Err(NotecastError::config(format!(
                "clip slot {} for {} is out of range (slot_count = {})",
                bad.slot, bad.file_name, self.mix.slot_count
            )));
        }
        if self.workspace.intermediate_prefix.is_empty() {
            return Err(NotecastError::config(
                "workspace.intermediate_prefix must not be empty",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("notecast").join("config.json")
}
