use crate::units::{JointId, JOINT_COUNT};
use crate::ProtocolError;

pub const HEADER: u8 = 0xFF;
/// Id the controller board listens on.
pub const DEVICE_ID: u8 = 0xFC;
/// Marker the board puts in place of the device id when it answers (device id minus one).
pub const RESPONSE_MARKER: u8 = DEVICE_ID - 1;

/// Length byte + opcode + checksum.
const FRAME_OVERHEAD: usize = 3;
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - FRAME_OVERHEAD;

pub mod opcode {
    use crate::units::JointId;

    pub const LED: u8 = 0x02;
    pub const BUZZER: u8 = 0x06;
    pub const SERVO_WRITE_BASE: u8 = 0x10;
    pub const TORQUE: u8 = 0x1A;
    pub const SERVO_WRITE_ALL: u8 = 0x1D;
    pub const SERVO_READ_BASE: u8 = 0x30;

    pub fn servo_write(joint: JointId) -> u8 {
        SERVO_WRITE_BASE + joint.raw()
    }

    pub fn servo_read(joint: JointId) -> u8 {
        SERVO_READ_BASE + joint.raw()
    }
}

/// Sum modulo 256. Callers pass the bytes from the length field onward, so the
/// two header bytes are never included.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// A framed outbound packet: `[0xFF][device_id][length][opcode][payload..][checksum]`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    pub fn encode(device_id: u8, opcode: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong(payload.len()));
        }
        let mut bytes = Vec::with_capacity(payload.len() + 5);
        bytes.push(HEADER);
        bytes.push(device_id);
        bytes.push((payload.len() + FRAME_OVERHEAD) as u8);
        bytes.push(opcode);
        bytes.extend_from_slice(payload);
        let sum = checksum(&bytes[2..]);
        bytes.push(sum);
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn device_id(&self) -> u8 {
        self.bytes[1]
    }

    pub fn length(&self) -> u8 {
        self.bytes[2]
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[3]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[4..self.bytes.len() - 1]
    }

    pub fn checksum_byte(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Split a received outbound frame back into `(device_id, opcode, payload)`.
    ///
    /// Used by loopback tooling and the simulator; returns `None` on any framing error.
    pub fn decode(bytes: &[u8]) -> Option<(u8, u8, &[u8])> {
        if bytes.len() < 5 || bytes[0] != HEADER {
            return None;
        }
        let len = usize::from(bytes[2]);
        if len < FRAME_OVERHEAD || bytes.len() != len + 2 {
            return None;
        }
        let (body, sum) = bytes.split_at(bytes.len() - 1);
        if checksum(&body[2..]) != sum[0] {
            return None;
        }
        Some((bytes[1], bytes[3], &body[4..]))
    }
}

/// Commands understood by the Dofbot controller board, already in raw units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ServoWrite {
        joint: JointId,
        raw: u16,
        duration_ms: u16,
    },
    ServoWriteAll {
        raw: [u16; JOINT_COUNT],
        duration_ms: u16,
    },
    ServoRead {
        joint: JointId,
    },
    Torque(bool),
    Led {
        r: u8,
        g: u8,
        b: u8,
    },
    /// 0x00 silences the buzzer, 0xFF keeps it on.
    Buzzer(u8),
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::ServoWrite { joint, .. } => opcode::servo_write(*joint),
            Command::ServoWriteAll { .. } => opcode::SERVO_WRITE_ALL,
            Command::ServoRead { joint } => opcode::servo_read(*joint),
            Command::Torque(_) => opcode::TORQUE,
            Command::Led { .. } => opcode::LED,
            Command::Buzzer(_) => opcode::BUZZER,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Command::ServoWrite {
                raw, duration_ms, ..
            } => {
                let mut out = Vec::with_capacity(4);
                out.extend_from_slice(&raw.to_be_bytes());
                out.extend_from_slice(&duration_ms.to_be_bytes());
                out
            }
            Command::ServoWriteAll { raw, duration_ms } => {
                let mut out = Vec::with_capacity(JOINT_COUNT * 2 + 2);
                for r in raw {
                    out.extend_from_slice(&r.to_be_bytes());
                }
                out.extend_from_slice(&duration_ms.to_be_bytes());
                out
            }
            Command::ServoRead { .. } => Vec::new(),
            Command::Torque(on) => vec![u8::from(on)],
            Command::Led { r, g, b } => vec![r, g, b],
            Command::Buzzer(duration) => vec![duration],
        }
    }

    pub fn to_packet(&self) -> Result<Packet, ProtocolError> {
        Packet::encode(DEVICE_ID, self.opcode(), &self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j(n: u8) -> JointId {
        JointId::new(n).unwrap()
    }

    #[test]
    fn read_request_layout() {
        let p = Command::ServoRead { joint: j(1) }.to_packet().unwrap();
        assert_eq!(p.as_bytes(), &[0xFF, 0xFC, 0x03, 0x31, 0x34]);
        assert!(p.payload().is_empty());
    }

    #[test]
    fn single_write_layout() {
        let p = Command::ServoWrite {
            joint: j(3),
            raw: 2000,
            duration_ms: 1000,
        }
        .to_packet()
        .unwrap();
        // 2000 = 0x07D0, 1000 = 0x03E8
        assert_eq!(p.length(), 0x07);
        assert_eq!(p.opcode(), 0x13);
        assert_eq!(p.payload(), &[0x07, 0xD0, 0x03, 0xE8]);
        let expected = (0x07u32 + 0x13 + 0x07 + 0xD0 + 0x03 + 0xE8) % 256;
        assert_eq!(u32::from(p.checksum_byte()), expected);
    }

    #[test]
    fn write_all_layout() {
        let p = Command::ServoWriteAll {
            raw: [2000, 2000, 2000, 2000, 2040, 2000],
            duration_ms: 100,
        }
        .to_packet()
        .unwrap();
        assert_eq!(p.as_bytes().len(), 19);
        assert_eq!(p.length(), 0x11);
        assert_eq!(p.opcode(), 0x1D);
        assert_eq!(&p.payload()[8..10], &[0x07, 0xF8]);
        assert_eq!(&p.payload()[12..], &[0x00, 0x64]);
        let bytes = p.as_bytes();
        assert_eq!(checksum(&bytes[2..bytes.len() - 1]), p.checksum_byte());
    }

    #[test]
    fn auxiliary_commands() {
        let torque = Command::Torque(true).to_packet().unwrap();
        assert_eq!(torque.as_bytes(), &[0xFF, 0xFC, 0x04, 0x1A, 0x01, 0x1F]);

        let led = Command::Led { r: 0, g: 255, b: 0 }.to_packet().unwrap();
        assert_eq!(led.length(), 0x06);
        assert_eq!(led.payload(), &[0x00, 0xFF, 0x00]);

        let buzz = Command::Buzzer(0).to_packet().unwrap();
        assert_eq!(buzz.as_bytes(), &[0xFF, 0xFC, 0x04, 0x06, 0x00, 0x0A]);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn payload_bound() {
        let big = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            Packet::encode(DEVICE_ID, 0x01, &big),
            Err(ProtocolError::PayloadTooLong(MAX_PAYLOAD_LEN + 1))
        );
        let max = vec![0u8; MAX_PAYLOAD_LEN];
        assert_eq!(Packet::encode(DEVICE_ID, 0x01, &max).unwrap().length(), 0xFF);
    }

    #[test]
    fn decode_roundtrip_and_rejects_corruption() {
        let p = Command::Led { r: 1, g: 2, b: 3 }.to_packet().unwrap();
        let (id, op, payload) = Packet::decode(p.as_bytes()).unwrap();
        assert_eq!((id, op, payload), (DEVICE_ID, opcode::LED, &[1u8, 2, 3][..]));

        let mut bad = p.into_bytes();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        assert!(Packet::decode(&bad).is_none());
        assert!(Packet::decode(&[0xFF, 0xFC]).is_none());
    }
}
