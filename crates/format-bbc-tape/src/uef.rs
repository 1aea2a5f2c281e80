//! UEF tape container decoder.
//!
//! # Format
//!
//! A 12-byte header (`"UEF File!"`, NUL, minor version, major version)
//! followed by chunks of `{ id: u16, length: u32, payload }`, all
//! little-endian.
//!
//! Bits are frequency-shift keyed: a `0` is one cycle of the base tone
//! (1200 Hz unless changed), a `1` two cycles at twice the frequency. Every
//! bit therefore lasts one base-tone period.
//!
//! | Chunk   | Meaning                                          |
//! |---------|--------------------------------------------------|
//! | `0000`  | origin string                                    |
//! | `0100`  | implicit 8N1 data                                |
//! | `0104`  | defined-format data (bits, parity, stop bits)    |
//! | `0110`  | carrier tone                                     |
//! | `0111`  | carrier tone with a dummy `AA` byte              |
//! | `0112`  | integer gap                                      |
//! | `0113`  | base frequency change                            |
//! | `0114`  | security cycles (ignored)                        |
//! | `0115`  | phase change (ignored)                           |
//! | `0116`  | floating-point gap                               |
//!
//! Reference: <http://electrem.emuunlim.com/UEFSpecs.html>

use emu_core::{BitStream, MasterClock, Ticks};
use log::{debug, info, warn};

use crate::stream::ByteStream;
use crate::{IDLE_DELAY, MAX_DELAY, TapeError, TapeSink};

pub(crate) const MAGIC: &[u8; 10] = b"UEF File!\0";
const HEADER_LEN: usize = 12;

const DEFAULT_BASE_FREQUENCY: f32 = 1200.0;

const CHUNK_ORIGIN: u16 = 0x0000;
const CHUNK_IMPLICIT_DATA: u16 = 0x0100;
const CHUNK_DEFINED_DATA: u16 = 0x0104;
const CHUNK_CARRIER: u16 = 0x0110;
const CHUNK_CARRIER_DUMMY: u16 = 0x0111;
const CHUNK_INTEGER_GAP: u16 = 0x0112;
const CHUNK_BASE_FREQUENCY: u16 = 0x0113;
const CHUNK_SECURITY_CYCLES: u16 = 0x0114;
const CHUNK_PHASE_CHANGE: u16 = 0x0115;
const CHUNK_FLOAT_GAP: u16 = 0x0116;

/// The byte framed inside a `0111` chunk's carrier.
const DUMMY_BYTE: u8 = 0xAA;
/// Tone pattern of that frame, LSB first; a set bit plays the base tone.
const DUMMY_FRAME: [u8; 2] = [0x54, 0x03];
const DUMMY_FRAME_BITS: u32 = 10;

/// Parity setting of a defined-data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Parity {
    fn from_byte(byte: u8) -> Self {
        match byte {
            b'N' => Parity::None,
            b'O' => Parity::Odd,
            b'E' => Parity::Even,
            other => {
                warn!("Unknown UEF parity {other:#04X}, assuming none");
                Parity::None
            }
        }
    }

    fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }

    /// The parity bit sent after `byte`'s data bits.
    fn bit_for(self, byte: u8) -> bool {
        match self {
            Parity::None => false,
            Parity::Odd => byte.count_ones() % 2 == 0,
            Parity::Even => byte.count_ones() % 2 == 1,
        }
    }
}

struct Chunk {
    id: u16,
    payload: ByteStream,
}

/// Decoder for a UEF image.
pub struct UefTape {
    stream: ByteStream,
    clock: MasterClock,
    /// The chunk being played; `None` between chunks.
    chunk: Option<Chunk>,
    /// Framing position within the current chunk; `None` before its first poll.
    state: Option<u32>,
    base_frequency: f32,
    cur_byte: u8,
    data_bits: BitStream,
    num_data_bits: u8,
    parity: Parity,
    num_stop_bits: u8,
    carrier_after: u16,
}

impl UefTape {
    /// Open a UEF image, validating its header.
    pub fn new(data: Vec<u8>, clock: MasterClock) -> Result<Self, TapeError> {
        if !data.starts_with(MAGIC) {
            return Err(TapeError::UnknownFormat);
        }
        let mut stream = ByteStream::new(data, "UEF image");
        stream.seek(MAGIC.len());
        let minor = stream.read_u8()?;
        let major = stream.read_u8()?;
        if major != 0 {
            return Err(TapeError::UnsupportedUefVersion { major, minor });
        }
        info!("UEF version {major}.{minor}");

        let mut tape = Self {
            stream,
            clock,
            chunk: None,
            state: None,
            base_frequency: DEFAULT_BASE_FREQUENCY,
            cur_byte: 0,
            data_bits: BitStream::new(&[]),
            num_data_bits: 8,
            parity: Parity::None,
            num_stop_bits: 1,
            carrier_after: 0,
        };
        tape.rewind();
        Ok(tape)
    }

    pub fn rewind(&mut self) {
        self.stream.seek(HEADER_LEN);
        self.chunk = None;
        self.state = None;
        self.base_frequency = DEFAULT_BASE_FREQUENCY;
        self.cur_byte = 0;
        self.data_bits = BitStream::new(&[]);
        self.num_data_bits = 8;
        self.parity = Parity::None;
        self.num_stop_bits = 1;
        self.carrier_after = 0;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.chunk.is_none() && self.stream.eof()
    }

    /// Current base tone frequency in Hz.
    #[must_use]
    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    pub fn poll(&mut self, sink: &mut dyn TapeSink) -> Result<Ticks, TapeError> {
        let mut chunk = match self.chunk.take() {
            Some(chunk) => chunk,
            None => {
                if self.stream.eof() {
                    return Ok(IDLE_DELAY);
                }
                self.state = None;
                self.read_chunk()?
            }
        };

        // Carrier is only present while a carrier tone is playing.
        if !matches!(chunk.id, CHUNK_CARRIER | CHUNK_CARRIER_DUMMY) {
            sink.set_dcd(false);
        }

        let payload = &mut chunk.payload;
        let delay = match chunk.id {
            CHUNK_ORIGIN => {
                info!("UEF origin: {}", payload.read_nul_string());
                self.bit_time(1)
            }
            CHUNK_IMPLICIT_DATA => self.poll_implicit_data(payload, sink)?,
            CHUNK_DEFINED_DATA => self.poll_defined_data(payload, sink)?,
            CHUNK_CARRIER => {
                let cycles = payload.read_u16()?;
                sink.set_dcd(true);
                sink.tone(self.high_tone());
                self.bit_time(u32::from(cycles))
            }
            CHUNK_CARRIER_DUMMY => self.poll_carrier_dummy(payload, sink)?,
            CHUNK_INTEGER_GAP => {
                let n = payload.read_u16()?;
                sink.tone(0.0);
                let delay = self
                    .clock
                    .periods_to_ticks(f64::from(n), 2.0 * f64::from(self.base_frequency));
                info!("Tape gap of {delay}");
                delay
            }
            CHUNK_FLOAT_GAP => {
                let secs = payload.read_f32()?;
                sink.tone(0.0);
                if secs.is_finite() && secs >= 0.0 {
                    info!("Tape gap of {secs}s");
                    self.clock.secs_to_ticks(f64::from(secs))
                } else {
                    warn!("Ignoring invalid tape gap of {secs}s");
                    Ticks::ZERO
                }
            }
            CHUNK_BASE_FREQUENCY => {
                let hz = payload.read_f32()?;
                if hz.is_finite() && hz > 0.0 {
                    info!("Frequency change to {hz} Hz");
                    self.base_frequency = hz;
                } else {
                    warn!("Ignoring invalid base frequency {hz}");
                }
                self.bit_time(1)
            }
            CHUNK_SECURITY_CYCLES => {
                debug!("Ignoring security cycles");
                self.bit_time(1)
            }
            CHUNK_PHASE_CHANGE => {
                debug!("Ignoring polarity change");
                self.bit_time(1)
            }
            other => {
                warn!("Skipping unknown UEF chunk {other:#06X}");
                self.bit_time(1)
            }
        };

        if self.state.is_some() {
            self.chunk = Some(chunk);
        }
        Ok(delay.min(MAX_DELAY))
    }

    fn read_chunk(&mut self) -> Result<Chunk, TapeError> {
        let id = self.stream.read_u16()?;
        let length = self.stream.read_u32()? as usize;
        let payload = self.stream.substream(length, "UEF chunk")?;
        debug!("UEF chunk {id:#06X}, {length} bytes");
        Ok(Chunk { id, payload })
    }

    /// `0100`: start bit, eight data bits, stop bit; the byte is delivered
    /// with its stop bit.
    fn poll_implicit_data(
        &mut self,
        payload: &mut ByteStream,
        sink: &mut dyn TapeSink,
    ) -> Result<Ticks, TapeError> {
        let state = match self.state {
            Some(state) => state,
            None => {
                if payload.eof() {
                    return Ok(self.bit_time(1));
                }
                self.load_byte(payload.read_u8()?, 8);
                0
            }
        };

        self.state = match state {
            0 => {
                sink.tone(self.base_frequency);
                Some(1)
            }
            1..=8 => {
                let bit = self.data_bits.next_bit();
                sink.tone(self.bit_tone(bit));
                Some(state + 1)
            }
            _ => {
                sink.tone(self.high_tone());
                sink.receive(self.cur_byte);
                if payload.eof() {
                    None
                } else {
                    self.load_byte(payload.read_u8()?, 8);
                    Some(0)
                }
            }
        };
        Ok(self.bit_time(1))
    }

    /// `0104`: framing read from the chunk header. The byte is delivered
    /// after its last stop bit with a zero delay.
    fn poll_defined_data(
        &mut self,
        payload: &mut ByteStream,
        sink: &mut dyn TapeSink,
    ) -> Result<Ticks, TapeError> {
        let state = match self.state {
            Some(state) => state,
            None => {
                let bits = payload.read_u8()?;
                if bits > 8 {
                    warn!("Defined data with {bits} data bits, clamping to 8");
                }
                self.num_data_bits = bits.min(8);
                self.parity = Parity::from_byte(payload.read_u8()?);
                self.num_stop_bits = payload.read_u8()?;
                info!(
                    "Defined data with {}{}{}",
                    self.num_data_bits,
                    self.parity.letter(),
                    self.num_stop_bits
                );
                0
            }
        };

        let data_end = 1 + u32::from(self.num_data_bits);
        let parity_end = data_end + u32::from(self.parity != Parity::None);
        let stop_end = parity_end + u32::from(self.num_stop_bits);

        if state == 0 {
            if payload.eof() {
                self.state = None;
                return Ok(self.bit_time(1));
            }
            self.load_byte(payload.read_u8()?, self.num_data_bits);
            sink.tone(self.base_frequency);
        } else if state < data_end {
            let bit = self.data_bits.next_bit();
            sink.tone(self.bit_tone(bit));
        } else if state < parity_end {
            sink.tone(self.bit_tone(self.parity.bit_for(self.cur_byte)));
        } else if state < stop_end {
            sink.tone(self.high_tone());
        } else {
            sink.receive(self.cur_byte);
            self.state = Some(0);
            return Ok(Ticks::ZERO);
        }
        self.state = Some(state + 1);
        Ok(self.bit_time(1))
    }

    /// `0111`: carrier, one framed dummy byte, carrier.
    fn poll_carrier_dummy(
        &mut self,
        payload: &mut ByteStream,
        sink: &mut dyn TapeSink,
    ) -> Result<Ticks, TapeError> {
        let Some(state) = self.state else {
            let before = payload.read_u16()?;
            self.carrier_after = payload.read_u16()?;
            info!(
                "Carrier with dummy byte: {before} cycles before, {} after",
                self.carrier_after
            );
            self.data_bits = BitStream::with_bits(&DUMMY_FRAME, DUMMY_FRAME_BITS as usize);
            sink.set_dcd(true);
            sink.tone(self.high_tone());
            self.state = Some(1);
            return Ok(self.bit_time(u32::from(before)));
        };

        if state <= DUMMY_FRAME_BITS {
            sink.set_dcd(false);
            let low = self.data_bits.next_bit();
            sink.tone(if low {
                self.base_frequency
            } else {
                self.high_tone()
            });
            if state == DUMMY_FRAME_BITS {
                sink.receive(DUMMY_BYTE);
            }
            self.state = Some(state + 1);
            return Ok(self.bit_time(1));
        }

        sink.set_dcd(true);
        sink.tone(self.high_tone());
        self.state = None;
        Ok(self.bit_time(u32::from(self.carrier_after)))
    }

    fn load_byte(&mut self, byte: u8, bits: u8) {
        let bits = bits.min(8);
        let mask = if bits == 8 { 0xFF } else { (1u8 << bits) - 1 };
        self.cur_byte = byte & mask;
        self.data_bits = BitStream::with_bits(&[self.cur_byte], usize::from(bits));
    }

    fn high_tone(&self) -> f32 {
        2.0 * self.base_frequency
    }

    fn bit_tone(&self, bit: bool) -> f32 {
        if bit {
            self.high_tone()
        } else {
            self.base_frequency
        }
    }

    /// Cycles spanned by `count` bit periods at the base frequency.
    fn bit_time(&self, count: u32) -> Ticks {
        self.clock
            .periods_to_ticks(f64::from(count), f64::from(self.base_frequency))
    }
}
