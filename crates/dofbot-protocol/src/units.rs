use crate::ProtocolError;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Joint count of the Dofbot SE arm.
pub const JOINT_COUNT: usize = 6;

/// Reversed servos are mirrored over the 0-180 domain, including on extended-range joints.
pub const REVERSAL_SPAN_DEG: f64 = 180.0;

/// Servo index on the arm (1-based, as the firmware numbers them).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct JointId(u8);

impl JointId {
    pub fn new(id: u8) -> Option<Self> {
        if (1..=JOINT_COUNT as u8).contains(&id) {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Parse a `joint_N` name as used in configuration and observations.
    pub fn from_name(name: &str) -> Option<Self> {
        let n = name.trim().strip_prefix("joint_")?.parse::<u8>().ok()?;
        Self::new(n)
    }

    pub fn all() -> impl Iterator<Item = JointId> {
        (1..=JOINT_COUNT as u8).map(JointId)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    /// Zero-based position in six-element arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn name(self) -> String {
        format!("joint_{}", self.0)
    }
}

impl TryFrom<u8> for JointId {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id).ok_or(ProtocolError::InvalidJoint(id))
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint_{}", self.0)
    }
}

impl Serialize for JointId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoModel {
    /// 0-180 degrees over raw 900..3100 (joints 1-4 and 6)
    Standard,
    /// 0-270 degrees over raw 380..3700 (joint 5, wrist roll)
    Extended,
}

/// Static conversion parameters for one joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServoSpec {
    #[serde(skip)]
    pub joint: JointId,
    pub model: ServoModel,
    pub angle_min: f64,
    pub angle_max: f64,
    pub raw_min: u16,
    pub raw_max: u16,
    pub reversed: bool,
}

const fn spec(joint: u8, model: ServoModel, reversed: bool) -> ServoSpec {
    let (angle_max, raw_min, raw_max) = match model {
        ServoModel::Standard => (180.0, 900, 3100),
        ServoModel::Extended => (270.0, 380, 3700),
    };
    ServoSpec {
        joint: JointId(joint),
        model,
        angle_min: 0.0,
        angle_max,
        raw_min,
        raw_max,
        reversed,
    }
}

/// Servo table for the Dofbot SE. Joints 2, 3 and 4 are mounted upside down.
pub const DOFBOT_SE_SERVOS: [ServoSpec; JOINT_COUNT] = [
    spec(1, ServoModel::Standard, false), // base rotation
    spec(2, ServoModel::Standard, true),  // shoulder
    spec(3, ServoModel::Standard, true),  // elbow
    spec(4, ServoModel::Standard, true),  // wrist pitch
    spec(5, ServoModel::Extended, false), // wrist roll
    spec(6, ServoModel::Standard, false), // gripper
];

impl ServoSpec {
    pub fn for_joint(joint: JointId) -> &'static ServoSpec {
        &DOFBOT_SE_SERVOS[joint.index()]
    }

    pub fn angle_range(&self) -> f64 {
        self.angle_max - self.angle_min
    }

    pub fn raw_range(&self) -> f64 {
        f64::from(self.raw_max) - f64::from(self.raw_min)
    }

    /// Inclusive check against the joint's angle domain. NaN is never in range.
    pub fn contains_angle(&self, angle: f64) -> bool {
        (self.angle_min..=self.angle_max).contains(&angle)
    }

    /// Angle used when a joint has never been read successfully.
    pub fn default_angle(&self) -> f64 {
        match self.model {
            ServoModel::Standard => 90.0,
            ServoModel::Extended => 135.0,
        }
    }
}

/// Convert degrees to raw actuator units.
///
/// The angle is silently clamped into the joint's domain first; NaN maps to `angle_min`.
/// Range rejection, where wanted, is the caller's job.
pub fn angle_to_raw(angle: f64, spec: &ServoSpec) -> u16 {
    let angle = if angle.is_nan() {
        spec.angle_min
    } else {
        angle.clamp(spec.angle_min, spec.angle_max)
    };
    let raw = spec.raw_range() * (angle - spec.angle_min) / spec.angle_range() + f64::from(spec.raw_min);
    raw.round() as u16
}

/// Convert raw actuator units to degrees. No clamping; validate the result if needed.
pub fn raw_to_angle(raw: u16, spec: &ServoSpec) -> f64 {
    spec.angle_min + spec.angle_range() * (f64::from(raw) - f64::from(spec.raw_min)) / spec.raw_range()
}

/// Mirror the angle for servos mounted in reverse; identity otherwise.
pub fn apply_mount_reversal(angle: f64, spec: &ServoSpec) -> f64 {
    if spec.reversed {
        REVERSAL_SPAN_DEG - angle
    } else {
        angle
    }
}
