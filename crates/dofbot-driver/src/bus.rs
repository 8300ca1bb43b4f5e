use crate::{DeviceError, DeviceMetrics, ReadFailure, Result};
use dofbot_protocol::{
    apply_mount_reversal, opcode, raw_to_angle, read_response, write_all_command, Command,
    JointCommand, JointId, ParseOutcome, ServoSpec, JOINT_COUNT, RESPONSE_MARKER,
};
use serial_transport::{ByteTransport, SerialSettings};
use std::thread;
use std::time::Duration;

/// Device processing latency the bus waits out. The board drops commands that arrive
/// back to back, so these delays can be tuned but never skipped on hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause after every packet write.
    pub command_delay: Duration,
    /// Pause after opening the port, before the first exchange.
    pub settle: Duration,
    /// Pause between a read request and reading its reply.
    pub read_gap: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_delay: Duration::from_millis(10),
            settle: Duration::from_millis(200),
            read_gap: Duration::from_millis(1),
        }
    }
}

/// Outcome of a single servo read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoReading {
    Angle(f64),
    Absent(ReadFailure),
}

impl ServoReading {
    pub fn angle(self) -> Option<f64> {
        match self {
            ServoReading::Angle(a) => Some(a),
            ServoReading::Absent(_) => None,
        }
    }
}

/// Request/response access to the Dofbot controller board.
///
/// The bus owns its transport exclusively and every operation takes `&mut self`, so at
/// most one request is ever in flight. Share it between threads behind a single lock.
pub struct DofbotBus<T: ByteTransport> {
    transport: T,
    timing: Timing,
    metrics: Option<DeviceMetrics>,
}

impl<T: ByteTransport> DofbotBus<T> {
    pub fn open(port: &str, settings: &SerialSettings, timing: Timing) -> Result<Self> {
        let transport = T::open(port, settings).map_err(|e| {
            tracing::error!(port, "failed to open port: {e}");
            e
        })?;
        let bus = Self::connect(transport, timing)?;
        tracing::info!(port, "connected to Dofbot");
        Ok(bus)
    }

    /// Take ownership of an opened transport, wait for the line to settle and drop any
    /// stale input.
    pub fn connect(mut transport: T, timing: Timing) -> Result<Self> {
        thread::sleep(timing.settle);
        transport.clear()?;
        Ok(Self {
            transport,
            timing,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: DeviceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn send(&mut self, cmd: &Command) -> Result<()> {
        let packet = cmd.to_packet()?;
        tracing::debug!(opcode = packet.opcode(), bytes = ?packet.as_bytes(), "tx");
        if let Err(e) = self.transport.write_all(packet.as_bytes()) {
            tracing::error!(opcode = packet.opcode(), "error sending command: {e}");
            return Err(e.into());
        }
        if let Some(m) = &self.metrics {
            m.tx_packets.inc();
        }
        thread::sleep(self.timing.command_delay);
        Ok(())
    }

    fn receive(&mut self) -> Result<ParseOutcome> {
        let transport = &mut self.transport;
        let outcome = read_response(RESPONSE_MARKER, || transport.read_byte())?;
        if let Some(m) = &self.metrics {
            match outcome {
                ParseOutcome::Telemetry(_) => m.rx_records.inc(),
                ParseOutcome::Invalid(_) => m.malformed_responses.inc(),
                _ => {}
            }
        }
        Ok(outcome)
    }

    /// Move one joint. The angle is clamped into the joint's domain, not rejected.
    pub fn write_one(&mut self, joint: JointId, angle: f64, duration_ms: u16) -> Result<()> {
        self.write_joint(&JointCommand::new(joint, angle, duration_ms))
    }

    pub fn write_joint(&mut self, cmd: &JointCommand) -> Result<()> {
        self.send(&cmd.to_command())
    }

    /// Move all six joints at once.
    ///
    /// Every angle is checked against its joint's domain before anything is written;
    /// out-of-range input is rejected rather than clamped.
    pub fn write_all(&mut self, angles: &[f64], duration_ms: u16) -> Result<()> {
        let angles: &[f64; JOINT_COUNT] =
            angles
                .try_into()
                .map_err(|_| DeviceError::WrongJointCount {
                    expected: JOINT_COUNT,
                    got: angles.len(),
                })?;
        for joint in JointId::all() {
            let spec = ServoSpec::for_joint(joint);
            let angle = angles[joint.index()];
            if !spec.contains_angle(angle) {
                return Err(DeviceError::OutOfRange {
                    joint,
                    angle,
                    min: spec.angle_min,
                    max: spec.angle_max,
                });
            }
        }
        self.send(&write_all_command(angles, duration_ms))
    }

    /// Read one joint's angle; `None` for any protocol-level failure.
    pub fn read_one(&mut self, joint: JointId) -> Result<Option<f64>> {
        Ok(self.read_servo(joint)?.angle())
    }

    /// Read one joint, reporting why the read failed when it did.
    ///
    /// The request goes out twice and only the second reply counts: right after a write
    /// the board's first answer is often stale.
    pub fn read_servo(&mut self, joint: JointId) -> Result<ServoReading> {
        let request = Command::ServoRead { joint };
        let mut outcome = ParseOutcome::NoData;
        for attempt in 0..2 {
            self.send(&request)?;
            thread::sleep(self.timing.read_gap);
            outcome = self.receive()?;
            tracing::trace!(%joint, attempt, ?outcome, "read reply");
        }
        let reading = match evaluate(joint, outcome) {
            Ok(angle) => ServoReading::Angle(angle),
            Err(failure) => {
                tracing::debug!(%joint, "read failed: {failure}");
                if let Some(m) = &self.metrics {
                    m.failed_reads.inc();
                }
                ServoReading::Absent(failure)
            }
        };
        Ok(reading)
    }

    pub fn set_torque(&mut self, enabled: bool) -> Result<()> {
        self.send(&Command::Torque(enabled))?;
        tracing::debug!("torque {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub fn set_led(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        self.send(&Command::Led { r, g, b })
    }

    /// `duration` is the board's duration code (0xFF keeps the buzzer on). Disabling
    /// always sends 0x00.
    pub fn set_buzzer(&mut self, enabled: bool, duration: u8) -> Result<()> {
        let code = if enabled { duration } else { 0x00 };
        self.send(&Command::Buzzer(code))
    }
}

fn evaluate(joint: JointId, outcome: ParseOutcome) -> Result<f64, ReadFailure> {
    let record = match outcome {
        ParseOutcome::Telemetry(record) => record,
        ParseOutcome::NoData => return Err(ReadFailure::NoTelemetry),
        ParseOutcome::Invalid(e) => return Err(ReadFailure::MalformedResponse(e)),
        ParseOutcome::Ignored { response_type } => {
            return Err(ReadFailure::UnexpectedResponse(response_type))
        }
    };
    let position = record
        .servo_position()
        .ok_or(ReadFailure::UnexpectedResponse(record.response_type))?;

    let expected = opcode::servo_read(joint);
    if position.echoed_opcode != expected {
        return Err(ReadFailure::StaleReply {
            expected,
            echoed: position.echoed_opcode,
        });
    }
    let raw = position.raw();
    if raw == 0 {
        return Err(ReadFailure::ZeroPosition);
    }
    let spec = ServoSpec::for_joint(joint);
    let angle = raw_to_angle(raw, spec);
    if !spec.contains_angle(angle) {
        return Err(ReadFailure::AngleOutOfRange(angle));
    }
    Ok(apply_mount_reversal(angle, spec))
}
