//! Notecast Process Core
//!
//! Everything that touches the external encoder binary goes through the
//! [`ProcessRunner`] trait defined here:
//!
//! - `runner`: the trait, run outcomes, and diagnostic line observers
//! - `ffmpeg`: the real implementation on top of `tokio::process`
//! - `diagnostics`: line splitting and the bounded diagnostic tail
//! - `scripted` (feature `scripted`): replayable in-memory runner
//!
//! Arguments are always passed as an explicit vector; nothing is ever
//! interpreted by a shell.

pub mod diagnostics;
pub mod ffmpeg;
pub mod runner;
#[cfg(feature = "scripted")]
pub mod scripted;

pub use diagnostics::DiagnosticTail;
pub use ffmpeg::{resolve_encoder_binary, FfmpegRunner};
pub use runner::*;
