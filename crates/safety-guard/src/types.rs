use crate::SafetyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest change a single command may request, in degrees.
///
/// Deserializes from either a bare number (applies to every joint) or a map keyed by
/// joint name. Joints absent from the map are not rate limited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SafetyLimit {
    Uniform(f64),
    PerJoint(BTreeMap<String, f64>),
}

impl SafetyLimit {
    pub fn max_delta(&self, joint: &str) -> Option<f64> {
        match self {
            SafetyLimit::Uniform(v) => Some(*v),
            SafetyLimit::PerJoint(map) => map.get(joint).copied(),
        }
    }

    pub fn validate(&self) -> Result<(), SafetyError> {
        let check = |scope: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SafetyError::InvalidLimit {
                    scope: scope.to_string(),
                    value,
                })
            }
        };
        match self {
            SafetyLimit::Uniform(v) => check("all joints", *v),
            SafetyLimit::PerJoint(map) => map.iter().try_for_each(|(joint, v)| check(joint.as_str(), *v)),
        }
    }
}

impl Default for SafetyLimit {
    fn default() -> Self {
        SafetyLimit::Uniform(30.0)
    }
}

/// A goal that was pulled back towards the present position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClampedGoal {
    pub joint: String,
    pub requested: f64,
    pub present: f64,
    pub applied: f64,
}
