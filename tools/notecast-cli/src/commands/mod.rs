pub mod check;
pub mod mix;
pub mod render;
pub mod stream;

use std::path::PathBuf;
use std::sync::Arc;

use notecast_common::config::{AppConfig, WorkspaceLayout};
use notecast_process_core::{FfmpegRunner, ProcessRunner};

/// Loaded configuration plus the encoder it points at.
pub struct Context {
    pub config: AppConfig,
    pub ffmpeg: FfmpegRunner,
}

impl Context {
    pub fn new(config: AppConfig) -> Self {
        let ffmpeg = FfmpegRunner::from_config(&config.encoder);
        tracing::debug!(binary = %ffmpeg.binary().display(), "Encoder resolved");
        Self { config, ffmpeg }
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::new(self.ffmpeg.clone())
    }

    /// Configured layout, optionally rooted at another directory.
    pub fn layout(&self, workspace: Option<PathBuf>) -> WorkspaceLayout {
        let mut layout = self.config.workspace.clone();
        if let Some(dir) = workspace {
            layout.dir = dir;
        }
        layout
    }
}
