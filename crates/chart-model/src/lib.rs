//! Notecast Chart Model
//!
//! Data contracts shared by the mixing and encoding stages:
//! - **Hit events:** timed references to short clips, parsed from the flat
//!   `offset,clip,offset,clip,...` list a chart player produces
//! - **Volume tables:** per-slot gain percentages applied to the named
//!   hit-sound clips before mixing
//!
//! Offsets are seconds from the start of the main track.

pub mod hit;
pub mod volume;

pub use hit::*;
pub use volume::*;

/// Errors produced while parsing chart-side inputs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("Malformed hit list: {message}")]
    HitList { message: String },

    #[error("Malformed volume list: {message}")]
    VolumeList { message: String },
}
