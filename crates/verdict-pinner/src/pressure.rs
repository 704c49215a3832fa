use serde::{Deserialize, Serialize};

/// How hard a sweep should trim the non-critical working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    /// Nothing to nominate.
    Nominal,
    /// A tenth of the evictable set.
    Moderate,
    /// A quarter.
    High,
    /// Half.
    Critical,
}

impl MemoryPressure {
    /// Share of evictable events to nominate.
    pub fn share(self) -> f64 {
        match self {
            MemoryPressure::Nominal => 0.0,
            MemoryPressure::Moderate => 0.10,
            MemoryPressure::High => 0.25,
            MemoryPressure::Critical => 0.50,
        }
    }

    /// Number of candidates to nominate out of `evictable`. Any non-nominal
    /// pressure nominates at least one when something is evictable.
    pub fn quota(self, evictable: usize) -> usize {
        if evictable == 0 || self == MemoryPressure::Nominal {
            return 0;
        }
        ((evictable as f64 * self.share()).ceil() as usize).clamp(1, evictable)
    }
}
