use dofbot_protocol::{
    frame_servo_position, joint_angle_to_raw, opcode, JointId, Packet, ServoSpec, DEVICE_ID,
    JOINT_COUNT,
};
use serial_transport::MockTransport;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct SimState {
    raw: [u16; JOINT_COUNT],
    torque: bool,
    led: (u8, u8, u8),
    buzzer: u8,
    muted: [bool; JOINT_COUNT],
    stale_after_write: bool,
    stale_pending: bool,
    last_duration_ms: Option<u16>,
    rejected: usize,
}

/// In-process stand-in for the controller board.
///
/// Decodes every packet written to its [`MockTransport`], tracks servo positions, torque,
/// LED and buzzer, and answers read requests with framed position reports. Moves
/// complete instantly.
#[derive(Clone)]
pub struct SimulatedDofbot {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for SimulatedDofbot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDofbot {
    /// Board with every joint at its default angle and torque off.
    pub fn new() -> Self {
        let mut raw = [0u16; JOINT_COUNT];
        for joint in JointId::all() {
            let angle = ServoSpec::for_joint(joint).default_angle();
            raw[joint.index()] = joint_angle_to_raw(joint, angle);
        }
        Self {
            state: Arc::new(Mutex::new(SimState {
                raw,
                torque: false,
                led: (0, 0, 0),
                buzzer: 0,
                muted: [false; JOINT_COUNT],
                stale_after_write: false,
                stale_pending: false,
                last_duration_ms: None,
                rejected: 0,
            })),
        }
    }

    /// A transport wired to this board. Each call returns a fresh port on the same board.
    pub fn transport(&self) -> MockTransport {
        let state = Arc::clone(&self.state);
        MockTransport::with_responder(move |bytes| respond(&mut lock(&state), bytes))
    }

    pub fn raw_position(&self, joint: JointId) -> u16 {
        lock(&self.state).raw[joint.index()]
    }

    /// Move a servo as if by hand.
    pub fn set_raw_position(&self, joint: JointId, raw: u16) {
        lock(&self.state).raw[joint.index()] = raw;
    }

    /// Set a joint by its logical angle (mount reversal applied, as the bus would).
    pub fn set_angle(&self, joint: JointId, angle: f64) {
        self.set_raw_position(joint, joint_angle_to_raw(joint, angle));
    }

    /// A muted servo never answers read requests.
    pub fn mute(&self, joint: JointId, muted: bool) {
        lock(&self.state).muted[joint.index()] = muted;
    }

    /// Answer the first read after every write with a reply to the wrong request, the
    /// way real boards sometimes do.
    pub fn set_stale_after_write(&self, enabled: bool) {
        lock(&self.state).stale_after_write = enabled;
    }

    pub fn torque(&self) -> bool {
        lock(&self.state).torque
    }

    pub fn led(&self) -> (u8, u8, u8) {
        lock(&self.state).led
    }

    pub fn buzzer(&self) -> u8 {
        lock(&self.state).buzzer
    }

    /// Duration of the most recent move command.
    pub fn last_duration_ms(&self) -> Option<u16> {
        lock(&self.state).last_duration_ms
    }

    /// Packets dropped for a bad frame or an unknown opcode.
    pub fn rejected_packets(&self) -> usize {
        lock(&self.state).rejected
    }
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn respond(state: &mut SimState, bytes: &[u8]) -> Vec<u8> {
    let Some((DEVICE_ID, op, payload)) = Packet::decode(bytes) else {
        tracing::debug!(?bytes, "sim: dropping malformed packet");
        state.rejected += 1;
        return Vec::new();
    };
    match (op, payload.len()) {
        (opcode::LED, 3) => state.led = (payload[0], payload[1], payload[2]),
        (opcode::BUZZER, 1) => state.buzzer = payload[0],
        (opcode::TORQUE, 1) => state.torque = payload[0] != 0,
        (opcode::SERVO_WRITE_ALL, 14) => {
            for (i, chunk) in payload[..12].chunks_exact(2).enumerate() {
                state.raw[i] = be_u16(chunk);
            }
            state.last_duration_ms = Some(be_u16(&payload[12..]));
            state.stale_pending = state.stale_after_write;
        }
        (op, 4) if (0x11..=0x16).contains(&op) => {
            let idx = usize::from(op - opcode::SERVO_WRITE_BASE - 1);
            state.raw[idx] = be_u16(&payload[..2]);
            state.last_duration_ms = Some(be_u16(&payload[2..]));
            state.stale_pending = state.stale_after_write;
        }
        (op, 0) if (0x31..=0x36).contains(&op) => {
            let idx = usize::from(op - opcode::SERVO_READ_BASE - 1);
            if state.muted[idx] {
                return Vec::new();
            }
            if state.stale_pending {
                state.stale_pending = false;
                return frame_servo_position(state.raw[idx], opcode::SERVO_READ_BASE);
            }
            return frame_servo_position(state.raw[idx], op);
        }
        _ => {
            tracing::debug!(op, len = payload.len(), "sim: unsupported command");
            state.rejected += 1;
        }
    }
    Vec::new()
}
