//! Notecast Audio Mix
//!
//! Builds the finished audio track a video encode is muxed against.
//!
//! ```text
//! a0.wav … a5.wav ── VolumeNormalizer (gain per slot, in place)
//!                          │
//! audio.mp3 ──┐            ▼
//!             ├── batch 0: adelay × ≤100 + amix ── intermediate_0.wav
//! hit events ─┘                                         │
//!                    batch 1: main = intermediate_0 ────┘── intermediate_1.wav
//!                                                              │
//!                                                   Transcoder (aac 192k)
//!                                                              ▼
//!                                                         output.aac
//! ```

pub mod mix;
pub mod transcode;
pub mod volume;

pub use mix::*;
pub use transcode::*;
pub use volume::*;

/// Render a path as an encoder argument.
pub(crate) fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}
