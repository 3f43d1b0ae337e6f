//! Final compression of the mixed track.

use std::path::Path;
use std::sync::Arc;

use notecast_common::config::MixConfig;
use notecast_common::error::NotecastResult;
use notecast_process_core::ProcessRunner;

use crate::path_arg;

/// Encodes an uncompressed mix into the delivery codec, dropping any video.
pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    codec: String,
    bitrate: String,
}

impl Transcoder {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        codec: impl Into<String>,
        bitrate: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            codec: codec.into(),
            bitrate: bitrate.into(),
        }
    }

    pub fn from_config(runner: Arc<dyn ProcessRunner>, config: &MixConfig) -> Self {
        Self::new(runner, &config.audio_codec, &config.audio_bitrate)
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            path_arg(input),
            "-c:a".to_string(),
            self.codec.clone(),
            "-b:a".to_string(),
            self.bitrate.clone(),
            "-vn".to_string(),
            "-y".to_string(),
            path_arg(output),
        ]
    }

    pub async fn transcode(&self, input: &Path, output: &Path) -> NotecastResult<()> {
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            codec = %self.codec,
            bitrate = %self.bitrate,
            "Transcoding mixed audio"
        );
        self.runner.run_quiet(&self.args(input, output)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecast_process_core::scripted::ScriptedRunner;

    #[test]
    fn test_default_args() {
        let transcoder =
            Transcoder::from_config(Arc::new(ScriptedRunner::new()), &MixConfig::default());
        let args = transcoder.args(Path::new("mix.wav"), Path::new("output.aac"));
        assert_eq!(
            args,
            ["-i", "mix.wav", "-c:a", "aac", "-b:a", "192k", "-vn", "-y", "output.aac"]
        );
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let runner = ScriptedRunner::new();
        runner.push(
            notecast_process_core::scripted::ScriptedRun::exit_code(1)
                .with_lines(["Unknown encoder 'aac'"]),
        );
        let transcoder = Transcoder::new(Arc::new(runner.clone()), "aac", "192k");
        let err = transcoder
            .transcode(Path::new("mix.wav"), Path::new("out.aac"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown encoder"));
        assert_eq!(runner.invocations().len(), 1);
    }
}
