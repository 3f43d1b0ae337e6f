//! Per-slot gain table for the named hit-sound clips.

use crate::ChartError;

/// Gain percentages indexed by clip slot.
///
/// A table always holds exactly as many entries as the configured slot
/// count (six by default). The only ways to build one are
/// [`VolumeTable::new`], [`parse_volume_list`] and [`VolumeTable::unity`].
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTable {
    percentages: Vec<f64>,
}

impl VolumeTable {
    /// Build a table, validating the entry count and each percentage.
    pub fn new(percentages: Vec<f64>, slot_count: usize) -> Result<Self, ChartError> {
        if percentages.len() != slot_count {
            return Err(ChartError::VolumeList {
                message: format!(
                    "expected {slot_count} volume entries but found {}",
                    percentages.len()
                ),
            });
        }
        if let Some((slot, pct)) = percentages
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(ChartError::VolumeList {
                message: format!("slot {slot}: percentage {pct} must be a finite value >= 0"),
            });
        }
        Ok(Self { percentages })
    }

    /// Table with every slot at 100%.
    pub fn unity(slot_count: usize) -> Self {
        Self {
            percentages: vec![100.0; slot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.percentages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.percentages.is_empty()
    }

    /// Percentage configured for a slot.
    pub fn percentage(&self, slot: usize) -> Option<f64> {
        self.percentages.get(slot).copied()
    }

    /// Linear gain factor (`percentage / 100`) for a slot.
    pub fn gain(&self, slot: usize) -> Option<f64> {
        self.percentage(slot).map(|p| p / 100.0)
    }
}

/// Parse a comma-separated list of percentages such as `"50,80,80,80,80,80"`.
pub fn parse_volume_list(raw: &str, slot_count: usize) -> Result<VolumeTable, ChartError> {
    let percentages = raw
        .split(',')
        .map(str::trim)
        .enumerate()
        .map(|(slot, token)| {
            token.parse::<f64>().map_err(|_| ChartError::VolumeList {
                message: format!("slot {slot}: {token:?} is not a number"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    VolumeTable::new(percentages, slot_count)
}
