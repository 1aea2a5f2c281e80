//! Tapefile: a raw received-byte stream with in-band carrier escapes.
//!
//! | Bytes     | Meaning                               |
//! |-----------|---------------------------------------|
//! | `FF 00`   | carrier lost                          |
//! | `FF 04`   | carrier present (5 s warm-up)         |
//! | `FF FF`   | literal `FF` data byte                |
//! | `nn`      | data byte                             |

use emu_core::{MasterClock, Ticks};

use crate::stream::ByteStream;
use crate::{IDLE_DELAY, TapeError, TapeSink};

const ESCAPE: u8 = 0xFF;
const CARRIER_LOST: u8 = 0x00;
const CARRIER_PRESENT: u8 = 0x04;

/// Seconds of carrier simulated by an `FF 04` escape.
const CARRIER_WARMUP_SECS: f64 = 5.0;

/// Cassette bit rate before the control register's divider.
const CASSETTE_BASE_RATE: u64 = 19_200;

/// Counter divide select, indexed by control register bits 0-1.
/// `0b11` is master reset, so it never survives into the register.
const DIVIDERS: [Option<u64>; 4] = [Some(1), Some(16), Some(64), None];

/// Decoder for a Tapefile image.
pub struct TapefileTape {
    stream: ByteStream,
    clock: MasterClock,
}

impl TapefileTape {
    #[must_use]
    pub fn new(data: Vec<u8>, clock: MasterClock) -> Self {
        Self {
            stream: ByteStream::new(data, "tapefile"),
            clock,
        }
    }

    /// A Tapefile has no header; rewinding returns to the first byte, not
    /// to offset 10 as some players do, which would skip the leading carrier
    /// escape and the start of the data.
    pub fn rewind(&mut self) {
        self.stream.seek(0);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stream.eof()
    }

    pub fn poll(&mut self, sink: &mut dyn TapeSink) -> Result<Ticks, TapeError> {
        if self.stream.eof() {
            return Ok(IDLE_DELAY);
        }
        let mut byte = self.stream.read_u8()?;
        if byte == ESCAPE {
            byte = self.stream.read_u8()?;
            match byte {
                CARRIER_LOST => {
                    sink.set_dcd(false);
                    return Ok(Ticks::ZERO);
                }
                CARRIER_PRESENT => {
                    sink.set_dcd(true);
                    return Ok(self.clock.secs_to_ticks(CARRIER_WARMUP_SECS));
                }
                ESCAPE => {}
                other => return Err(TapeError::UnexpectedEscape(other)),
            }
        }
        sink.receive(byte);
        Ok(self.byte_time(sink.control_register()))
    }

    /// Time on the wire for one byte at the configured divider.
    ///
    /// The serial ULA's rate selection doesn't apply to the cassette; only
    /// the chip's divider does. Bit 7 clear adds a tenth bit per byte.
    fn byte_time(&self, control: u8) -> Ticks {
        let bits_per_byte = if control & 0x80 == 0 { 10 } else { 9 };
        let Some(divider) = DIVIDERS[usize::from(control & 0x03)] else {
            log::warn!("tapefile polled with invalid divider in control {control:#04X}");
            return IDLE_DELAY;
        };
        Ticks::new(bits_per_byte * self.clock.frequency_hz * divider / CASSETTE_BASE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Event, RecordingSink};

    fn tape(data: &[u8]) -> TapefileTape {
        TapefileTape::new(data.to_vec(), MasterClock::BBC_MICRO)
    }

    #[test]
    fn carrier_drop_between_bytes() {
        let mut t = tape(&[0x41, 0xFF, 0x00, 0x42]);
        let mut sink = RecordingSink::default();

        t.poll(&mut sink).expect("poll 1");
        assert_eq!(sink.take(), [Event::Receive(0x41)]);

        let delay = t.poll(&mut sink).expect("poll 2");
        assert_eq!(delay, Ticks::ZERO);
        assert_eq!(sink.take(), [Event::Dcd(false)]);

        t.poll(&mut sink).expect("poll 3");
        assert_eq!(sink.take(), [Event::Receive(0x42)]);
        assert!(t.is_finished());
    }

    #[test]
    fn carrier_escape_waits_five_seconds() {
        let mut t = tape(&[0xFF, 0x04]);
        let mut sink = RecordingSink::default();
        let delay = t.poll(&mut sink).expect("poll");
        assert_eq!(delay, Ticks::new(10_000_000));
        assert_eq!(sink.take(), [Event::Dcd(true)]);
    }

    #[test]
    fn doubled_escape_is_literal_data() {
        let mut t = tape(&[0xFF, 0xFF]);
        let mut sink = RecordingSink::default();
        t.poll(&mut sink).expect("poll");
        assert_eq!(sink.take(), [Event::Receive(0xFF)]);
    }

    #[test]
    fn unknown_escape_is_a_format_error() {
        let mut t = tape(&[0xFF, 0x07]);
        let mut sink = RecordingSink::default();
        assert_eq!(t.poll(&mut sink), Err(TapeError::UnexpectedEscape(0x07)));
    }

    #[test]
    fn escape_at_end_of_stream_is_truncated() {
        let mut t = tape(&[0xFF]);
        let mut sink = RecordingSink::default();
        assert!(matches!(t.poll(&mut sink), Err(TapeError::Truncated { .. })));
    }

    #[test]
    fn byte_time_follows_divider_and_word_length() {
        let mut sink = RecordingSink::default();
        // Divide by 16, bit 7 clear: 10 bits at 1200 baud.
        sink.control = 0x01;
        let mut t = tape(&[0x00, 0x00, 0x00]);
        assert_eq!(t.poll(&mut sink).expect("poll"), Ticks::new(16_666));
        // Bit 7 set: 9 bits.
        sink.control = 0x81;
        assert_eq!(t.poll(&mut sink).expect("poll"), Ticks::new(15_000));
        // Divide by 1: 9 bits at 19200 baud.
        sink.control = 0x80;
        assert_eq!(t.poll(&mut sink).expect("poll"), Ticks::new(937));
    }

    #[test]
    fn idles_at_end_and_rewinds_to_start() {
        let mut t = tape(&[0x41]);
        let mut sink = RecordingSink::default();
        t.poll(&mut sink).expect("poll");
        assert_eq!(t.poll(&mut sink).expect("idle"), IDLE_DELAY);

        t.rewind();
        assert!(!t.is_finished());
        sink.take();
        t.poll(&mut sink).expect("poll");
        assert_eq!(sink.take(), [Event::Receive(0x41)]);
    }
}
