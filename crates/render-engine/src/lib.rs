//! Notecast Render Engine
//!
//! Turns rendered chart frames plus the finished audio track into a video
//! file. Two modes share one exclusive slot:
//!
//! ```text
//! batch:   f1.png … fN.png ──┐
//!                            ├── GPU encode ──(hardware failure)──► CPU encode
//!          output.aac ───────┘        │                                 │
//!                                     └──────────► output.mp4 ◄─────────┘
//!
//! stream:  frame bytes ──► encoder stdin ──┐
//!          output.aac ─────────────────────┴──► output.mp4
//! ```
//!
//! Progress and fallback notices are published as [`RenderEvent`]s on a
//! channel the caller owns.

pub mod coordinator;
pub mod events;
pub mod frames;
pub mod hardware;
pub mod job;
pub mod progress;
pub mod stream;

pub use coordinator::*;
pub use events::*;
pub use frames::*;
pub use hardware::*;
pub use job::*;
pub use progress::*;
pub use stream::*;
