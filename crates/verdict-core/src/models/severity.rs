use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of the detection an operator corrected. Ordered from least to
/// most severe; drives pin priority and the tier an event is admitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Tiers whose events are never evicted.
    pub fn is_always_pinned(self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    /// Dense index, `Info == 0`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Numeric weight in `[0.2, 1.0]` used by severity-weighted retention.
    pub fn weight(self) -> f64 {
        (self.index() + 1) as f64 / Self::ALL.len() as f64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}
