//! Hit events and the flat hit-list wire format.

use serde::{Deserialize, Serialize};

use crate::ChartError;

/// A short clip overlaid on the main track at a fixed offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    /// Seconds from the start of the main track. Always finite and `>= 0`.
    #[serde(rename = "offset")]
    pub offset_secs: f64,

    /// Bare file name of the clip inside the workspace directory.
    #[serde(rename = "clip")]
    pub clip_id: String,
}

impl HitEvent {
    pub fn new(offset_secs: f64, clip_id: impl Into<String>) -> Self {
        Self {
            offset_secs,
            clip_id: clip_id.into(),
        }
    }

    /// Delay applied to the clip, rounded to the nearest millisecond.
    pub fn delay_ms(&self) -> u64 {
        (self.offset_secs * 1000.0).round() as u64
    }
}

/// Parse a flat alternating `offset,clip,offset,clip,...` list.
///
/// Both `,` and `;` separate tokens and surrounding whitespace is ignored,
/// so `"0,a.wav;0.5,b.wav"` yields two events. A blank list yields none.
/// One trailing separator is tolerated; any other empty token is an error.
pub fn parse_hit_list(raw: &str) -> Result<Vec<HitEvent>, ChartError> {
    let raw = raw.trim();
    let raw = raw.strip_suffix([',', ';']).unwrap_or(raw);
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tokens: Vec<&str> = raw.split([',', ';']).map(str::trim).collect();

    if tokens.len() % 2 != 0 {
        return Err(ChartError::HitList {
            message: format!(
                "expected offset/clip pairs but found {} tokens",
                tokens.len()
            ),
        });
    }

    tokens
        .chunks_exact(2)
        .enumerate()
        .map(|(index, pair)| parse_pair(index, pair[0], pair[1]))
        .collect()
}

fn parse_pair(index: usize, offset: &str, clip: &str) -> Result<HitEvent, ChartError> {
    let offset_secs = offset.parse::<f64>().map_err(|_| ChartError::HitList {
        message: format!("event {index}: offset {offset:?} is not a number"),
    })?;
    if !offset_secs.is_finite() || offset_secs < 0.0 {
        return Err(ChartError::HitList {
            message: format!("event {index}: offset {offset} must be a finite value >= 0"),
        });
    }
    if !is_bare_file_name(clip) {
        return Err(ChartError::HitList {
            message: format!("event {index}: clip {clip:?} must be a plain file name"),
        });
    }
    Ok(HitEvent::new(offset_secs, clip))
}

/// Clip ids are joined onto the workspace directory, so anything that could
/// escape it is rejected.
fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}
