use crate::packet::{checksum, HEADER, RESPONSE_MARKER};
use crate::InvalidResponse;

/// Response type carrying a servo position report.
pub const SERVO_POSITION: u8 = 0x0A;

/// Bytes discarded while hunting for a header before the attempt is given up.
pub const MAX_RESYNC_BYTES: usize = 256;

/// A checksum-verified response. `data` excludes the checksum byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub response_type: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoPosition {
    pub position_high: u8,
    pub position_low: u8,
    /// Read opcode the board is answering (0x30 + joint).
    pub echoed_opcode: u8,
}

impl ServoPosition {
    pub fn raw(&self) -> u16 {
        u16::from_be_bytes([self.position_high, self.position_low])
    }
}

impl TelemetryRecord {
    pub fn servo_position(&self) -> Option<ServoPosition> {
        if self.response_type != SERVO_POSITION || self.data.len() < 3 {
            return None;
        }
        Some(ServoPosition {
            position_high: self.data[0],
            position_low: self.data[1],
            echoed_opcode: self.data[2],
        })
    }
}

/// Result of one receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Telemetry(TelemetryRecord),
    /// Well-formed response of a type this driver does not consume.
    Ignored { response_type: u8 },
    Invalid(InvalidResponse),
    /// Timeout, short read, or no header found.
    NoData,
}

impl ParseOutcome {
    pub fn into_record(self) -> Option<TelemetryRecord> {
        match self {
            ParseOutcome::Telemetry(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pending,
    Done(ParseOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserState {
    AwaitHeader1,
    AwaitHeader2,
    AwaitLength,
    AwaitType {
        ext_len: u8,
    },
    AccumulateData {
        ext_type: u8,
        data_len: usize,
        received: usize,
        sum: u8,
        data: Vec<u8>,
    },
}

/// Byte-at-a-time decoder for `[0xFF][marker][ext_len][ext_type][data..][checksum]`.
///
/// The parser owns its scratch state and returns to `AwaitHeader1` after every
/// completed attempt, so one instance never leaks state between two responses.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    marker: u8,
    state: ParserState,
    discarded: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(RESPONSE_MARKER)
    }
}

impl ResponseParser {
    pub fn new(marker: u8) -> Self {
        Self {
            marker,
            state: ParserState::AwaitHeader1,
            discarded: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = ParserState::AwaitHeader1;
        self.discarded = 0;
    }

    fn finish(&mut self, outcome: ParseOutcome) -> Step {
        self.reset();
        Step::Done(outcome)
    }

    pub fn feed(&mut self, byte: u8) -> Step {
        match &mut self.state {
            ParserState::AwaitHeader1 => {
                if byte == HEADER {
                    self.state = ParserState::AwaitHeader2;
                    return Step::Pending;
                }
                self.discarded += 1;
                if self.discarded >= MAX_RESYNC_BYTES {
                    tracing::debug!(discarded = self.discarded, "no response header found");
                    return self.finish(ParseOutcome::NoData);
                }
                Step::Pending
            }
            ParserState::AwaitHeader2 => {
                if byte != self.marker {
                    let err = InvalidResponse::UnexpectedMarker {
                        expected: self.marker,
                        found: byte,
                    };
                    tracing::warn!("{err}");
                    return self.finish(ParseOutcome::Invalid(err));
                }
                self.state = ParserState::AwaitLength;
                Step::Pending
            }
            ParserState::AwaitLength => {
                if byte < 3 {
                    let err = InvalidResponse::LengthTooShort(byte);
                    tracing::warn!("{err}");
                    return self.finish(ParseOutcome::Invalid(err));
                }
                self.state = ParserState::AwaitType { ext_len: byte };
                Step::Pending
            }
            ParserState::AwaitType { ext_len } => {
                let ext_len = *ext_len;
                let data_len = usize::from(ext_len) - 2;
                self.state = ParserState::AccumulateData {
                    ext_type: byte,
                    data_len,
                    received: 0,
                    sum: checksum(&[ext_len, byte]),
                    data: Vec::with_capacity(data_len.saturating_sub(1)),
                };
                Step::Pending
            }
            ParserState::AccumulateData {
                ext_type,
                data_len,
                received,
                sum,
                data,
            } => {
                *received += 1;
                if *received < *data_len {
                    *sum = sum.wrapping_add(byte);
                    data.push(byte);
                    return Step::Pending;
                }
                // the byte completing the count is the checksum
                let (computed, response_type) = (*sum, *ext_type);
                if computed != byte {
                    let err = InvalidResponse::ChecksumMismatch {
                        computed,
                        received: byte,
                    };
                    tracing::warn!(response_type, data = ?data, "{err}");
                    return self.finish(ParseOutcome::Invalid(err));
                }
                let record = TelemetryRecord {
                    response_type,
                    data: std::mem::take(data),
                };
                let outcome = dispatch(record);
                self.finish(outcome)
            }
        }
    }

    /// Feed a chunk; stops at the first completed response. Returns the step and the
    /// number of bytes consumed.
    pub fn feed_chunk(&mut self, bytes: &[u8]) -> (Step, usize) {
        for (i, &b) in bytes.iter().enumerate() {
            if let Step::Done(outcome) = self.feed(b) {
                return (Step::Done(outcome), i + 1);
            }
        }
        (Step::Pending, bytes.len())
    }

    /// The stream ended or timed out mid-response.
    pub fn end_of_stream(&mut self) -> ParseOutcome {
        if self.state != ParserState::AwaitHeader1 {
            tracing::debug!(state = ?self.state, "response cut short");
        }
        self.reset();
        ParseOutcome::NoData
    }
}

fn dispatch(record: TelemetryRecord) -> ParseOutcome {
    if record.servo_position().is_some() {
        ParseOutcome::Telemetry(record)
    } else {
        tracing::debug!(response_type = record.response_type, "ignoring response");
        ParseOutcome::Ignored {
            response_type: record.response_type,
        }
    }
}

/// Run one receive attempt against a blocking byte source.
///
/// `next_byte` returns `Ok(None)` on timeout or end of stream, which ends the attempt
/// with [`ParseOutcome::NoData`]. Errors from the source are returned untouched.
pub fn read_response<E>(
    marker: u8,
    mut next_byte: impl FnMut() -> Result<Option<u8>, E>,
) -> Result<ParseOutcome, E> {
    let mut parser = ResponseParser::new(marker);
    loop {
        match next_byte()? {
            Some(b) => {
                if let Step::Done(outcome) = parser.feed(b) {
                    return Ok(outcome);
                }
            }
            None => return Ok(parser.end_of_stream()),
        }
    }
}

/// Frame a device response. Used by the simulator and by tests.
pub fn frame_response(response_type: u8, payload: &[u8]) -> Vec<u8> {
    let ext_len = (payload.len() + 3) as u8;
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.extend_from_slice(&[HEADER, RESPONSE_MARKER, ext_len, response_type]);
    out.extend_from_slice(payload);
    let sum = checksum(&out[2..]);
    out.push(sum);
    out
}

/// Frame the position reply a board sends for `read_opcode`.
pub fn frame_servo_position(raw: u16, read_opcode: u8) -> Vec<u8> {
    let [h, l] = raw.to_be_bytes();
    frame_response(SERVO_POSITION, &[h, l, read_opcode])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn run(bytes: &[u8]) -> ParseOutcome {
        let mut it = bytes.iter().copied();
        read_response::<Infallible>(RESPONSE_MARKER, || Ok(it.next())).unwrap()
    }

    #[test]
    fn decodes_servo_position() {
        let frame = frame_servo_position(2000, 0x31);
        assert_eq!(frame, vec![0xFF, 0xFB, 0x06, 0x0A, 0x07, 0xD0, 0x31, 0x18]);
        let record = run(&frame).into_record().unwrap();
        let pos = record.servo_position().unwrap();
        assert_eq!(pos.raw(), 2000);
        assert_eq!(pos.echoed_opcode, 0x31);
    }

    #[test]
    fn skips_leading_noise() {
        let mut bytes = vec![0x00, 0x12, 0xFE];
        bytes.extend(frame_servo_position(1500, 0x33));
        let pos = run(&bytes).into_record().and_then(|r| r.servo_position());
        assert_eq!(pos.map(|p| p.raw()), Some(1500));
    }

    #[test]
    fn wrong_marker_aborts() {
        let mut frame = frame_servo_position(1500, 0x33);
        frame[1] = 0xFC;
        assert_eq!(
            run(&frame),
            ParseOutcome::Invalid(InvalidResponse::UnexpectedMarker {
                expected: 0xFB,
                found: 0xFC
            })
        );
    }

    #[test]
    fn missing_checksum_is_no_data() {
        let frame = frame_servo_position(1500, 0x33);
        assert_eq!(run(&frame[..frame.len() - 1]), ParseOutcome::NoData);
        for cut in 0..frame.len() {
            assert_eq!(run(&frame[..cut]), ParseOutcome::NoData);
        }
    }

    #[test]
    fn checksum_mismatch_is_invalid() {
        let mut frame = frame_servo_position(1500, 0x33);
        frame[5] ^= 0x40;
        assert!(matches!(
            run(&frame),
            ParseOutcome::Invalid(InvalidResponse::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn impossible_length_is_invalid() {
        assert_eq!(
            run(&[0xFF, 0xFB, 0x02, 0x0A, 0x0C]),
            ParseOutcome::Invalid(InvalidResponse::LengthTooShort(2))
        );
    }

    #[test]
    fn other_types_are_ignored() {
        let frame = frame_response(0x0B, &[1, 2, 3, 4]);
        assert_eq!(run(&frame), ParseOutcome::Ignored { response_type: 0x0B });
        // position type but too short to carry an opcode echo
        let short = frame_response(SERVO_POSITION, &[0x07, 0xD0]);
        assert_eq!(run(&short), ParseOutcome::Ignored { response_type: 0x0A });
    }

    #[test]
    fn endless_noise_gives_up() {
        let noise = vec![0x55u8; MAX_RESYNC_BYTES * 2];
        let mut parser = ResponseParser::default();
        let (step, used) = parser.feed_chunk(&noise);
        assert_eq!(step, Step::Done(ParseOutcome::NoData));
        assert_eq!(used, MAX_RESYNC_BYTES);
    }

    #[test]
    fn chunked_feeding_and_reuse() {
        let mut stream = frame_servo_position(900, 0x31);
        stream.extend(frame_servo_position(3100, 0x32));
        let mut parser = ResponseParser::default();

        let (first, used) = parser.feed_chunk(&stream);
        let first = match first {
            Step::Done(ParseOutcome::Telemetry(r)) => r,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(first.servo_position().unwrap().raw(), 900);

        let (second, _) = parser.feed_chunk(&stream[used..]);
        match second {
            Step::Done(ParseOutcome::Telemetry(r)) => {
                assert_eq!(r.servo_position().unwrap().echoed_opcode, 0x32)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn source_errors_propagate() {
        let res: Result<ParseOutcome, &str> = read_response(RESPONSE_MARKER, || Err("gone"));
        assert_eq!(res, Err("gone"));
    }
}
