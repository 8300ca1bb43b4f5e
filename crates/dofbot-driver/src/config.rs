use crate::bus::Timing;
use anyhow::Context;
use dofbot_protocol::{JointId, ServoSpec, JOINT_COUNT};
use safety_guard::{SafetyError, SafetyLimit};
use serde::{Deserialize, Serialize};
use serial_transport::{SerialSettings, DEFAULT_BAUD_RATE};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown joint '{0}'")]
    UnknownJoint(String),
    #[error("{joint} limit [{min}, {max}] outside servo range [{lo}, {hi}]")]
    LimitOutsideServoRange {
        joint: JointId,
        min: f64,
        max: f64,
        lo: f64,
        hi: f64,
    },
    #[error("{joint} limit min {min} is above max {max}")]
    InvertedLimit { joint: JointId, min: f64, max: f64 },
    #[error("home position for {joint} ({angle}) is outside its limits")]
    HomeOutOfLimits { joint: JointId, angle: f64 },
    #[error(transparent)]
    Safety(#[from] SafetyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    pub min: f64,
    pub max: f64,
}

impl JointLimit {
    pub fn clip(&self, angle: f64) -> f64 {
        angle.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub command_delay_ms: u64,
    pub settle_ms: u64,
    pub read_gap_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_delay_ms: 10,
            settle_ms: 200,
            read_gap_ms: 1,
        }
    }
}

impl From<TimingConfig> for Timing {
    fn from(t: TimingConfig) -> Self {
        Timing {
            command_delay: Duration::from_millis(t.command_delay_ms),
            settle: Duration::from_millis(t.settle_ms),
            read_gap: Duration::from_millis(t.read_gap_ms),
        }
    }
}

/// Arm configuration, usually loaded from YAML.
///
/// ```yaml
/// port: /dev/ttyUSB0
/// max_relative_target: 20
/// joint_limits:
///   joint_6: { min: 30, max: 180 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub disable_torque_on_disconnect: bool,
    /// Largest step allowed per action, in degrees. `null` disables the rate limit.
    pub max_relative_target: Option<SafetyLimit>,
    /// Keyed by `joint_N`; joints not listed use their full servo range.
    pub joint_limits: BTreeMap<String, JointLimit>,
    pub home_position: [f64; JOINT_COUNT],
    pub home_duration_ms: u16,
    pub action_duration_ms: u16,
    pub timing: TimingConfig,
    /// Observe only: torque stays off and actions are dropped.
    pub read_only: bool,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            port: "/dev/myserial".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 500,
            disable_torque_on_disconnect: true,
            max_relative_target: Some(SafetyLimit::Uniform(30.0)),
            joint_limits: default_joint_limits(),
            home_position: [90.0, 90.0, 90.0, 90.0, 90.0, 180.0],
            home_duration_ms: 2000,
            action_duration_ms: 100,
            timing: TimingConfig::default(),
            read_only: false,
        }
    }
}

fn default_joint_limits() -> BTreeMap<String, JointLimit> {
    JointId::all()
        .map(|j| {
            let spec = ServoSpec::for_joint(j);
            (
                j.name(),
                JointLimit {
                    min: spec.angle_min,
                    max: spec.angle_max,
                },
            )
        })
        .collect()
}

impl ArmConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing.into()
    }

    /// Effective limit for a joint: the configured entry, else the full servo range.
    pub fn joint_limit(&self, joint: JointId) -> JointLimit {
        self.joint_limits.get(&joint.name()).copied().unwrap_or_else(|| {
            let spec = ServoSpec::for_joint(joint);
            JointLimit {
                min: spec.angle_min,
                max: spec.angle_max,
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, limit) in &self.joint_limits {
            let joint =
                JointId::from_name(name).ok_or_else(|| ConfigError::UnknownJoint(name.clone()))?;
            let spec = ServoSpec::for_joint(joint);
            if !spec.contains_angle(limit.min) || !spec.contains_angle(limit.max) {
                return Err(ConfigError::LimitOutsideServoRange {
                    joint,
                    min: limit.min,
                    max: limit.max,
                    lo: spec.angle_min,
                    hi: spec.angle_max,
                });
            }
            if limit.min > limit.max {
                return Err(ConfigError::InvertedLimit {
                    joint,
                    min: limit.min,
                    max: limit.max,
                });
            }
        }
        if let Some(limit) = &self.max_relative_target {
            limit.validate()?;
            if let SafetyLimit::PerJoint(map) = limit {
                if let Some(name) = map.keys().find(|n| JointId::from_name(n).is_none()) {
                    return Err(ConfigError::UnknownJoint(name.clone()));
                }
            }
        }
        for joint in JointId::all() {
            let angle = self.home_position[joint.index()];
            let limit = self.joint_limit(joint);
            if !(limit.min..=limit.max).contains(&angle) {
                return Err(ConfigError::HomeOutOfLimits { joint, angle });
            }
        }
        Ok(())
    }
}

/// Load and validate an arm configuration file.
pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<ArmConfig> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
    let config: ArmConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating config: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ArmConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.serial_settings().baud_rate, 115_200);
        assert_eq!(cfg.serial_settings().read_timeout, Duration::from_millis(500));
        assert_eq!(cfg.timing(), Timing::default());
        assert_eq!(cfg.joint_limit(JointId::new(5).unwrap()).max, 270.0);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: ArmConfig = serde_yaml::from_str(
            "port: /dev/ttyUSB0\nmax_relative_target: null\ntiming:\n  settle_ms: 0\n",
        )
        .unwrap();
        assert_eq!(cfg.port, "/dev/ttyUSB0");
        assert!(cfg.max_relative_target.is_none());
        assert_eq!(cfg.timing.settle_ms, 0);
        assert_eq!(cfg.timing.command_delay_ms, 10);
        assert_eq!(cfg.action_duration_ms, 100);
    }

    #[test]
    fn rejects_bad_limits() {
        let mut cfg = ArmConfig::default();
        cfg.joint_limits.insert(
            "joint_1".into(),
            JointLimit {
                min: -10.0,
                max: 90.0,
            },
        );
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::LimitOutsideServoRange { .. })
        ));

        let mut cfg = ArmConfig::default();
        cfg.joint_limits
            .insert("joint_2".into(), JointLimit { min: 120.0, max: 60.0 });
        assert!(matches!(cfg.validate(), Err(ConfigError::InvertedLimit { .. })));

        let mut cfg = ArmConfig::default();
        cfg.joint_limits
            .insert("gripper".into(), JointLimit { min: 0.0, max: 10.0 });
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownJoint(_))));

        let cfg = ArmConfig {
            max_relative_target: Some(SafetyLimit::Uniform(-1.0)),
            ..ArmConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Safety(_))));
    }

    #[test]
    fn home_must_respect_limits() {
        let mut cfg = ArmConfig::default();
        cfg.joint_limits
            .insert("joint_6".into(), JointLimit { min: 0.0, max: 120.0 });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::HomeOutOfLimits { .. })
        ));
    }
}
