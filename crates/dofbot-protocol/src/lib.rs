//! dofbot-protocol: wire format of the Dofbot SE controller board
//!
//! Outbound packets are `[0xFF][0xFC][len][opcode][payload..][checksum]`, replies are
//! `[0xFF][0xFB][len][type][data..][checksum]`. This crate frames commands, decodes
//! replies from a byte stream, and converts between joint angles and raw servo units.
//! It performs no I/O of its own.

mod error;
pub use error::{InvalidResponse, ProtocolError};

pub mod units;
pub use units::{
    angle_to_raw, apply_mount_reversal, raw_to_angle, JointId, ServoModel, ServoSpec,
    DOFBOT_SE_SERVOS, JOINT_COUNT,
};

pub mod packet;
pub use packet::{checksum, opcode, Command, Packet, DEVICE_ID, RESPONSE_MARKER};

pub mod parser;
pub use parser::{
    frame_response, frame_servo_position, read_response, ParseOutcome, ResponseParser,
    ServoPosition, Step, TelemetryRecord,
};

mod command;
pub use command::{joint_angle_to_raw, write_all_command, JointCommand};
