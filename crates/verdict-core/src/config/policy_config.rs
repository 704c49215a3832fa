//! Policy updater configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_POLICY_PARAMETERS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Largest change one recompute may apply to a parameter. Default: 0.05.
    pub max_step: Option<f64>,
    /// Lower clamp for every parameter. Default: 0.0.
    pub min_value: Option<f64>,
    /// Upper clamp for every parameter. Default: 1.0.
    pub max_value: Option<f64>,
    /// Parameter schema with initial values, keyed by detection dimension.
    /// Empty means the built-in dimensions.
    pub parameters: BTreeMap<String, f64>,
}

impl PolicyConfig {
    pub fn effective_max_step(&self) -> f64 {
        self.max_step.unwrap_or(0.05)
    }

    pub fn effective_min_value(&self) -> f64 {
        self.min_value.unwrap_or(0.0)
    }

    pub fn effective_max_value(&self) -> f64 {
        self.max_value.unwrap_or(1.0)
    }

    pub fn effective_parameters(&self) -> BTreeMap<String, f64> {
        if self.parameters.is_empty() {
            DEFAULT_POLICY_PARAMETERS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect()
        } else {
            self.parameters.clone()
        }
    }
}
