use crate::config::ConfigError;
use dofbot_protocol::{InvalidResponse, JointId, ProtocolError};
use serial_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = DeviceError> = core::result::Result<T, E>;

/// Failures that abort an operation. Protocol-level read anomalies are not errors; see
/// [`ReadFailure`].
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),
    #[error("{joint} angle {angle} out of range [{min}, {max}]")]
    OutOfRange {
        joint: JointId,
        angle: f64,
        min: f64,
        max: f64,
    },
    #[error("expected {expected} joint angles, got {got}")]
    WrongJointCount { expected: usize, got: usize },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("unknown robot type '{name}' (known: {known})")]
    UnknownRobot { name: String, known: String },
}

/// Why a servo read produced no usable angle.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ReadFailure {
    #[error("no telemetry received")]
    NoTelemetry,
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] InvalidResponse),
    #[error("unexpected response type 0x{0:02X}")]
    UnexpectedResponse(u8),
    #[error("reply answers opcode 0x{echoed:02X}, expected 0x{expected:02X}")]
    StaleReply { expected: u8, echoed: u8 },
    #[error("servo reported raw position 0")]
    ZeroPosition,
    #[error("decoded angle {0:.1} outside the joint range")]
    AngleOutOfRange(f64),
}
