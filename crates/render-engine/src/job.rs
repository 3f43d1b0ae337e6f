//! Frame-sequence encode jobs: validation, argument vectors, and state.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use notecast_common::config::{EncodeConfig, WorkspaceLayout};
use notecast_common::error::{NotecastError, NotecastResult};

/// Filter that rounds both output dimensions down to even values.
pub const EVEN_SCALE_FILTER: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Which encoder variant an attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMode {
    Gpu,
    Cpu,
}

impl fmt::Display for EncodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeMode::Gpu => f.write_str("gpu"),
            EncodeMode::Cpu => f.write_str("cpu"),
        }
    }
}

/// Lifecycle of one frame-sequence encode.
///
/// ```text
/// Idle → GpuRunning → Succeeded
///                   → FallingBackToCpu → CpuRunning → Succeeded | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    Idle,
    GpuRunning,
    FallingBackToCpu,
    CpuRunning,
    Succeeded,
    Failed,
}

impl EncodeState {
    /// State after an attempt launches.
    pub fn launch(self) -> NotecastResult<Self> {
        match self {
            EncodeState::Idle => Ok(EncodeState::GpuRunning),
            EncodeState::FallingBackToCpu => Ok(EncodeState::CpuRunning),
            other => Err(NotecastError::session_state(format!(
                "cannot launch an encode attempt from {other:?}"
            ))),
        }
    }

    /// State after the running attempt ends.
    pub fn attempt_finished(self, succeeded: bool) -> NotecastResult<Self> {
        match (self, succeeded) {
            (EncodeState::GpuRunning | EncodeState::CpuRunning, true) => Ok(EncodeState::Succeeded),
            (EncodeState::GpuRunning, false) => Ok(EncodeState::FallingBackToCpu),
            (EncodeState::CpuRunning, false) => Ok(EncodeState::Failed),
            (other, _) => Err(NotecastError::session_state(format!(
                "no encode attempt is running in {other:?}"
            ))),
        }
    }

    pub fn mode(self) -> Option<EncodeMode> {
        match self {
            EncodeState::GpuRunning => Some(EncodeMode::Gpu),
            EncodeState::CpuRunning => Some(EncodeMode::Cpu),
            _ => None,
        }
    }
}

/// Reject frame rates that are not finite and positive.
pub fn validate_frame_rate(frame_rate: f64) -> NotecastResult<f64> {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        Ok(frame_rate)
    } else {
        Err(NotecastError::validation(format!(
            "frame rate must be greater than 0, got {frame_rate}"
        )))
    }
}

/// Parse a bitrate in kilobits: a positive integer with an optional `k`.
pub fn parse_bitrate_kbps(raw: &str) -> NotecastResult<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_suffix('k')
        .or_else(|| trimmed.strip_suffix('K'))
        .unwrap_or(trimmed);
    match digits.parse::<u32>() {
        Ok(kbps) if kbps > 0 => Ok(kbps),
        _ => Err(NotecastError::validation(format!(
            "bitrate must be a positive integer optionally followed by 'k', got '{raw}'"
        ))),
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A validated frame-sequence encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    /// `printf`-style pattern of the numbered frame images.
    pub frame_pattern: PathBuf,

    /// Finished audio track muxed into the output.
    pub audio_track: PathBuf,

    pub output: PathBuf,

    pub frame_rate: f64,

    pub bitrate_kbps: u32,
}

impl EncodeJob {
    /// Validate parameters and take paths from the workspace layout.
    pub fn from_layout(layout: &WorkspaceLayout, frame_rate: f64, bitrate: &str) -> NotecastResult<Self> {
        Ok(Self {
            frame_pattern: layout.frame_pattern_path(),
            audio_track: layout.mixed_track_path(),
            output: layout.video_output_path(),
            frame_rate: validate_frame_rate(frame_rate)?,
            bitrate_kbps: parse_bitrate_kbps(bitrate)?,
        })
    }

    /// Re-check parameters of a job built by hand.
    pub fn validate(&self) -> NotecastResult<()> {
        validate_frame_rate(self.frame_rate)?;
        if self.bitrate_kbps == 0 {
            return Err(NotecastError::validation("bitrate must be greater than 0"));
        }
        Ok(())
    }

    /// Argument vector for one attempt.
    ///
    /// Both variants share every argument except the hardware hint and the
    /// codec. The output path is always last and always overwritten.
    pub fn args(&self, mode: EncodeMode, config: &EncodeConfig) -> Vec<String> {
        let mut args = Vec::with_capacity(24);
        if mode == EncodeMode::Gpu {
            args.push("-hwaccel".to_string());
            args.push(config.hwaccel.clone());
        }
        args.extend([
            "-framerate".to_string(),
            self.frame_rate.to_string(),
            "-i".to_string(),
            path_arg(&self.frame_pattern),
            "-i".to_string(),
            path_arg(&self.audio_track),
            "-c:v".to_string(),
            match mode {
                EncodeMode::Gpu => config.gpu_codec.clone(),
                EncodeMode::Cpu => config.cpu_codec.clone(),
            },
            "-vf".to_string(),
            EVEN_SCALE_FILTER.to_string(),
            "-pix_fmt".to_string(),
            config.pixel_format.clone(),
            "-b:v".to_string(),
            format!("{}k", self.bitrate_kbps),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-y".to_string(),
            path_arg(&self.output),
        ]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn job() -> EncodeJob {
        EncodeJob::from_layout(&WorkspaceLayout::in_dir("/work"), 60.0, "2500k").unwrap()
    }

    #[test]
    fn test_bitrate_parsing() {
        assert_eq!(parse_bitrate_kbps("2500k").unwrap(), 2500);
        assert_eq!(parse_bitrate_kbps("2500K").unwrap(), 2500);
        assert_eq!(parse_bitrate_kbps(" 800 ").unwrap(), 800);
        for bad in ["0", "0k", "-5k", "k", "", "2.5k", "25m", "abc"] {
            assert!(
                matches!(parse_bitrate_kbps(bad), Err(NotecastError::Validation { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_frame_rate_validation() {
        assert!(validate_frame_rate(29.97).is_ok());
        assert!(validate_frame_rate(0.0).is_err());
        assert!(validate_frame_rate(-30.0).is_err());
        assert!(validate_frame_rate(f64::NAN).is_err());
        assert!(validate_frame_rate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_gpu_and_cpu_args_differ_only_in_hint_and_codec() {
        let config = EncodeConfig::default();
        let gpu = job().args(EncodeMode::Gpu, &config);
        let cpu = job().args(EncodeMode::Cpu, &config);

        assert_eq!(&gpu[..2], ["-hwaccel", "auto"]);
        let gpu_rest: Vec<&String> = gpu[2..].iter().collect();
        let cpu_all: Vec<&String> = cpu.iter().collect();
        assert_eq!(gpu_rest.len(), cpu_all.len());

        let differing: Vec<(&String, &String)> = gpu_rest
            .into_iter()
            .zip(cpu_all)
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(differing.len(), 1);
        assert_eq!(differing[0].0, "h264_nvenc");
        assert_eq!(differing[0].1, "libx264");
    }

    #[test]
    fn test_cpu_args_layout() {
        let args = job().args(EncodeMode::Cpu, &EncodeConfig::default());
        assert_eq!(
            args,
            [
                "-framerate",
                "60",
                "-i",
                "/work/f%d.png",
                "-i",
                "/work/output.aac",
                "-c:v",
                "libx264",
                "-vf",
                EVEN_SCALE_FILTER,
                "-pix_fmt",
                "yuv420p",
                "-b:v",
                "2500k",
                "-progress",
                "pipe:1",
                "-y",
                "/work/output.mp4"
            ]
        );
    }

    #[test]
    fn test_state_machine_paths() {
        let gpu = EncodeState::Idle.launch().unwrap();
        assert_eq!(gpu.mode(), Some(EncodeMode::Gpu));
        assert_eq!(gpu.attempt_finished(true).unwrap(), EncodeState::Succeeded);

        let fallback = gpu.attempt_finished(false).unwrap();
        assert_eq!(fallback, EncodeState::FallingBackToCpu);
        let cpu = fallback.launch().unwrap();
        assert_eq!(cpu.mode(), Some(EncodeMode::Cpu));
        assert_eq!(cpu.attempt_finished(false).unwrap(), EncodeState::Failed);

        // A CPU failure never leads to another attempt.
        assert!(EncodeState::Failed.launch().is_err());
        assert!(EncodeState::Succeeded.launch().is_err());
        assert!(EncodeState::Idle.attempt_finished(true).is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_jobs_always_force_even_dimensions(
            fps in 0.001f64..1000.0,
            kbps in 1u32..1_000_000,
            gpu in any::<bool>(),
        ) {
            let job = EncodeJob::from_layout(
                &WorkspaceLayout::in_dir("/w"),
                fps,
                &format!("{kbps}k"),
            ).unwrap();
            let mode = if gpu { EncodeMode::Gpu } else { EncodeMode::Cpu };
            let args = job.args(mode, &EncodeConfig::default());
            let vf = args.iter().position(|a| a == "-vf").unwrap();
            prop_assert_eq!(args[vf + 1].as_str(), EVEN_SCALE_FILTER);
            prop_assert_eq!(args.last().unwrap().as_str(), "/w/output.mp4");
        }
    }
}
