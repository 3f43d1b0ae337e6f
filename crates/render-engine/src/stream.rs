//! Streaming encode: frames are piped into a running encoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};

use notecast_common::config::EncodeConfig;
use notecast_common::error::{NotecastError, NotecastResult};
use notecast_process_core::{PipedProcess, ProcessRunner};

use crate::job::{parse_bitrate_kbps, path_arg, validate_frame_rate};

/// Round a dimension down to the nearest even value.
pub fn even_floor(value: u32) -> u32 {
    value & !1
}

/// One encoded image (PNG, JPEG, ...) ready for the encoder's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePayload {
    bytes: Vec<u8>,
}

impl FramePayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decode a `data:image/png;base64,...` URL or a bare base64 string.
    pub fn from_data_url(url: &str) -> NotecastResult<Self> {
        let url = url.trim();
        let payload = match url.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    NotecastError::validation("data URL is missing the ',' separator")
                })?;
                if !header.ends_with(";base64") {
                    return Err(NotecastError::validation(format!(
                        "data URL is not base64 encoded: '{header}'"
                    )));
                }
                data
            }
            None => url,
        };

        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| NotecastError::validation(format!("invalid base64 frame data: {e}")))?;
        if bytes.is_empty() {
            return Err(NotecastError::validation("frame data is empty"));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for FramePayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

/// Validated parameters of a streaming session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub bitrate_kbps: u32,
    /// Previously finalized audio track.
    pub audio_track: PathBuf,
    pub output: PathBuf,
}

impl StreamSpec {
    pub fn new(
        width: u32,
        height: u32,
        frame_rate: f64,
        bitrate: &str,
        audio_track: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> NotecastResult<Self> {
        if even_floor(width) == 0 || even_floor(height) == 0 {
            return Err(NotecastError::validation(format!(
                "frame size must be at least 2x2, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            frame_rate: validate_frame_rate(frame_rate)?,
            bitrate_kbps: parse_bitrate_kbps(bitrate)?,
            audio_track: audio_track.into(),
            output: output.into(),
        })
    }

    /// Output size after rounding both dimensions down to even values.
    pub fn output_dimensions(&self) -> (u32, u32) {
        (even_floor(self.width), even_floor(self.height))
    }

    pub fn args(&self, config: &EncodeConfig) -> Vec<String> {
        let (width, height) = self.output_dimensions();
        vec![
            "-i".to_string(),
            path_arg(&self.audio_track),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-r".to_string(),
            self.frame_rate.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-c:v".to_string(),
            config.cpu_codec.clone(),
            "-preset".to_string(),
            config.stream_preset.clone(),
            "-vf".to_string(),
            format!("scale={width}:{height}"),
            "-pix_fmt".to_string(),
            config.pixel_format.clone(),
            "-b:v".to_string(),
            format!("{}k", self.bitrate_kbps),
            "-y".to_string(),
            path_arg(&self.output),
        ]
    }
}

/// Launches streaming encoder processes.
pub struct StreamingVideoEncoder {
    runner: Arc<dyn ProcessRunner>,
    config: EncodeConfig,
}

impl StreamingVideoEncoder {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: EncodeConfig) -> Self {
        Self { runner, config }
    }

    /// Spawn the encoder. Returns as soon as the process is launched.
    pub async fn start(&self, spec: StreamSpec) -> NotecastResult<StreamSession> {
        let args = spec.args(&self.config);
        let process = self.runner.spawn_piped(&args).await?;
        let (width, height) = spec.output_dimensions();
        tracing::info!(
            pid = ?process.id(),
            width,
            height,
            frame_rate = spec.frame_rate,
            output = %spec.output.display(),
            "Streaming encoder started"
        );
        Ok(StreamSession {
            spec,
            process,
            frames_written: 0,
            bytes_written: 0,
        })
    }
}

/// A running streaming encode.
pub struct StreamSession {
    spec: StreamSpec,
    process: Box<dyn PipedProcess>,
    frames_written: u64,
    bytes_written: u64,
}

impl StreamSession {
    pub fn spec(&self) -> &StreamSpec {
        &self.spec
    }

    pub fn output(&self) -> &Path {
        &self.spec.output
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn input_closed(&self) -> bool {
        self.process.input_closed()
    }

    /// Write one frame. Waits while the encoder's input pipe is full.
    pub async fn push_frame(&mut self, frame: &FramePayload) -> NotecastResult<()> {
        if self.process.input_closed() {
            return Err(NotecastError::session_state(
                "encoder input is closed; end the session to collect its status",
            ));
        }
        if let Err(err) = self.process.write_all(frame.as_bytes()).await {
            tracing::warn!(frames_written = self.frames_written, error = %err, "Frame write failed");
            return Err(err);
        }
        self.frames_written += 1;
        self.bytes_written += frame.len() as u64;
        tracing::trace!(frame = self.frames_written, bytes = frame.len(), "Frame written");
        Ok(())
    }

    /// Close the input, wait for the encoder, and return the output path.
    pub async fn end(self) -> NotecastResult<PathBuf> {
        let frames = self.frames_written;
        let bytes = self.bytes_written;
        let output = self.spec.output;
        self.process.finish().await?;
        tracing::info!(frames, bytes, output = %output.display(), "Streaming encode complete");
        Ok(output)
    }
}
