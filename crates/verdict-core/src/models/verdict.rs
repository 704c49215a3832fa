use std::fmt;

use serde::{Deserialize, Serialize};

/// The operator's correction of an automated verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorVerdict {
    /// The detection was right.
    Confirm,
    /// The detection fired on benign activity.
    FalsePositive,
    /// The classifier missed something the operator found.
    FalseNegative,
    /// The detection was right but under-rated; hand it up.
    Escalate,
}

impl fmt::Display for OperatorVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperatorVerdict::Confirm => "confirm",
            OperatorVerdict::FalsePositive => "false_positive",
            OperatorVerdict::FalseNegative => "false_negative",
            OperatorVerdict::Escalate => "escalate",
        };
        f.write_str(s)
    }
}
