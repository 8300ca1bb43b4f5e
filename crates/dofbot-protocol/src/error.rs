use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload of {0} bytes does not fit a one-byte length field")]
    PayloadTooLong(usize),
    #[error("invalid joint id: {0} (expected 1-6)")]
    InvalidJoint(u8),
}

/// Why a received response was discarded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidResponse {
    #[error("unexpected response marker 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedMarker { expected: u8, found: u8 },
    #[error("response length {0} leaves no room for a checksum")]
    LengthTooShort(u8),
    #[error("checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    ChecksumMismatch { computed: u8, received: u8 },
}
