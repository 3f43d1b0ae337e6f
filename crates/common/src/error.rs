//! Error types shared across notecast crates.

use std::path::{Path, PathBuf};

/// Top-level error type for notecast operations.
///
/// Spawn failures and nonzero exits share this one error type so every
/// encoder invocation has a single failure channel, but they remain
/// distinct variants for callers that need to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum NotecastError {
    /// Bad caller input (frame rate, bitrate, hit list, volume list).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The encoder binary could not be started.
    #[error("Failed to start {program}: {message}")]
    ProcessSpawn { program: String, message: String },

    /// The encoder ran but exited unsuccessfully.
    #[error("Encoder exited with {}: {excerpt}", describe_code(.code))]
    ProcessExit { code: Option<i32>, excerpt: String },

    /// Rename/delete failures during volume adjustment or cleanup.
    #[error("Filesystem error at {path}: {message}")]
    Filesystem { path: PathBuf, message: String },

    /// Operation invoked in the wrong render/session state.
    #[error("Session state error: {message}")]
    SessionState { message: String },

    /// Writing to the encoder's standard input failed.
    #[error("Encoder pipe error: {message}")]
    Pipe { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using NotecastError.
pub type NotecastResult<T> = Result<T, NotecastError>;

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl NotecastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn process_spawn(program: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            program: program.into(),
            message: msg.into(),
        }
    }

    pub fn process_exit(code: Option<i32>, excerpt: impl Into<String>) -> Self {
        Self::ProcessExit {
            code,
            excerpt: excerpt.into(),
        }
    }

    pub fn filesystem(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn session_state(msg: impl Into<String>) -> Self {
        Self::SessionState {
            message: msg.into(),
        }
    }

    pub fn pipe(msg: impl Into<String>) -> Self {
        Self::Pipe {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error came from the encoder process itself
    /// (spawn failure or unsuccessful exit).
    pub fn is_process_failure(&self) -> bool {
        matches!(self, Self::ProcessSpawn { .. } | Self::ProcessExit { .. })
    }
}
