//! Parameter schema and bounds.

use std::collections::BTreeMap;

use verdict_core::config::PolicyConfig;
use verdict_core::errors::PolicyError;
use verdict_core::models::PolicySnapshot;

/// The set of tunable dimensions and the bounds every adjustment obeys.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySchema {
    initial: BTreeMap<String, f64>,
    max_step: f64,
    min_value: f64,
    max_value: f64,
}

impl PolicySchema {
    pub fn from_config(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let schema = Self {
            initial: config.effective_parameters(),
            max_step: config.effective_max_step(),
            min_value: config.effective_min_value(),
            max_value: config.effective_max_value(),
        };
        if !(schema.max_step.is_finite() && schema.max_step > 0.0) {
            return Err(PolicyError::Schema(format!("max_step {} must be positive", schema.max_step)));
        }
        if !(schema.min_value.is_finite() && schema.max_value.is_finite())
            || schema.min_value > schema.max_value
        {
            return Err(PolicyError::Schema(format!(
                "range [{}, {}] is empty",
                schema.min_value, schema.max_value
            )));
        }
        if schema.initial.is_empty() {
            return Err(PolicyError::Schema("no parameters".to_string()));
        }
        if let Some((k, v)) = schema.initial.iter().find(|(_, v)| !schema.in_range(**v)) {
            return Err(PolicyError::Schema(format!(
                "initial {k} = {v} outside [{}, {}]",
                schema.min_value, schema.max_value
            )));
        }
        Ok(schema)
    }

    /// Version 0 with the initial parameter values.
    pub fn root_snapshot(&self) -> PolicySnapshot {
        PolicySnapshot::root(self.initial.clone())
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.initial.contains_key(dimension)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.initial.keys().map(String::as_str)
    }

    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn in_range(&self, value: f64) -> bool {
        value.is_finite() && (self.min_value..=self.max_value).contains(&value)
    }

    /// Fail unless `snapshot` has exactly this schema's keys, all in range.
    pub fn check(&self, snapshot: &PolicySnapshot) -> Result<(), PolicyError> {
        if !snapshot.parameter_map.keys().eq(self.initial.keys()) {
            return Err(PolicyError::Schema(format!(
                "v{} keys differ from schema",
                snapshot.version
            )));
        }
        match snapshot.parameter_map.iter().find(|(_, v)| !self.in_range(**v)) {
            Some((k, v)) => Err(PolicyError::Schema(format!(
                "v{} {k} = {v} out of range",
                snapshot.version
            ))),
            None => Ok(()),
        }
    }
}
