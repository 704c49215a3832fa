//! Graceful degradation for the privacy engine.
//!
//! If a regex pattern fails to compile, it is skipped with a warning and the
//! remaining patterns still run.

/// Record of a pattern that failed to compile.
#[derive(Debug, Clone)]
pub struct PatternFailure {
    pub pattern_name: String,
    pub category: String,
}

/// Accumulates failures found during a health check.
#[derive(Debug, Default)]
pub struct DegradationTracker {
    failures: Vec<PatternFailure>,
}

impl DegradationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, pattern_name: &str, category: &str) {
        self.failures.push(PatternFailure {
            pattern_name: pattern_name.to_string(),
            category: category.to_string(),
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[PatternFailure] {
        &self.failures
    }
}
