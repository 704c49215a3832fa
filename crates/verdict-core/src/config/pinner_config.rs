//! Pinner configuration.

use serde::{Deserialize, Serialize};

/// How non-critical events are ranked for retention.
///
/// Recency always counts; the weighting chooses the second signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionWeighting {
    /// Newer events survive, nothing else considered.
    #[default]
    Recency,
    /// Larger `|confidence_delta|` corrections are kept longer.
    Confidence,
    /// Within mixed pressure sweeps, higher severity is kept longer.
    Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PinnerConfig {
    /// Capacity of the medium tier. Default: 512.
    pub medium_capacity: Option<usize>,
    /// Capacity of the low tier. Default: 256.
    pub low_capacity: Option<usize>,
    /// Capacity of the info tier. Default: 128.
    pub info_capacity: Option<usize>,
    pub retention_weighting: Option<RetentionWeighting>,
}

impl PinnerConfig {
    pub fn effective_medium_capacity(&self) -> usize {
        self.medium_capacity.unwrap_or(512)
    }

    pub fn effective_low_capacity(&self) -> usize {
        self.low_capacity.unwrap_or(256)
    }

    pub fn effective_info_capacity(&self) -> usize {
        self.info_capacity.unwrap_or(128)
    }

    /// Hard ceiling on retained non-critical events.
    pub fn non_critical_ceiling(&self) -> usize {
        self.effective_medium_capacity()
            + self.effective_low_capacity()
            + self.effective_info_capacity()
    }

    pub fn effective_retention_weighting(&self) -> RetentionWeighting {
        self.retention_weighting.unwrap_or_default()
    }
}
