use crate::packet::Command;
use crate::units::{angle_to_raw, apply_mount_reversal, JointId, ServoSpec, JOINT_COUNT};

/// One joint move as the caller expresses it, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointCommand {
    pub joint: JointId,
    pub target_angle_deg: f64,
    pub duration_ms: u16,
}

impl JointCommand {
    pub fn new(joint: JointId, target_angle_deg: f64, duration_ms: u16) -> Self {
        Self {
            joint,
            target_angle_deg,
            duration_ms,
        }
    }

    /// Mount correction, then conversion (which clamps into the joint domain).
    pub fn to_command(&self) -> Command {
        Command::ServoWrite {
            joint: self.joint,
            raw: joint_angle_to_raw(self.joint, self.target_angle_deg),
            duration_ms: self.duration_ms,
        }
    }
}

/// Write-path conversion for one joint: reversal first, then angle to raw.
pub fn joint_angle_to_raw(joint: JointId, angle: f64) -> u16 {
    let spec = ServoSpec::for_joint(joint);
    angle_to_raw(apply_mount_reversal(angle, spec), spec)
}

/// Convert six joint angles into a write-all command.
pub fn write_all_command(angles: &[f64; JOINT_COUNT], duration_ms: u16) -> Command {
    let mut raw = [0u16; JOINT_COUNT];
    for joint in JointId::all() {
        raw[joint.index()] = joint_angle_to_raw(joint, angles[joint.index()]);
    }
    Command::ServoWriteAll { raw, duration_ms }
}
