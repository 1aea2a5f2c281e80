//! BBC Micro cassette image decoders.
//!
//! Two container formats are supported:
//!
//! - **Tapefile**: the raw byte stream the serial chip would receive, with
//!   `0xFF` escapes marking carrier changes.
//! - **UEF**: a chunked container describing the FSK tones on the tape.
//!
//! A decoder is polled by the serial chip whenever the previous unit of work
//! (one bit, one byte, one tone segment) has finished on the wire. Each poll
//! drives a [`TapeSink`] and returns how many cycles that unit occupies. A
//! zero delay means "poll again straight away".

mod error;
mod stream;
mod tapefile;
mod uef;

pub use error::TapeError;
pub use tapefile::TapefileTape;
pub use uef::{Parity, UefTape};

use std::io::Read;

use emu_core::{MasterClock, Ticks};
use flate2::read::MultiGzDecoder;
use log::info;

/// gzip member header (RFC 1952). Most UEF files are distributed compressed.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Delay returned once a tape has nothing left to play.
pub const IDLE_DELAY: Ticks = Ticks::new(100_000);

/// Longest delay a decoder reports, about 36 minutes at 2 MHz. Gap and
/// carrier lengths read from an image are clamped to it.
pub const MAX_DELAY: Ticks = Ticks::new(0xFFFF_FFFF);

/// What a tape decoder drives: the receive side of a serial chip plus the
/// cassette tone output.
pub trait TapeSink {
    /// A complete byte has arrived.
    fn receive(&mut self, byte: u8);

    /// Carrier detect line level.
    fn set_dcd(&mut self, level: bool);

    /// Play a tone at `hz` for audio feedback. Zero mutes.
    fn tone(&mut self, hz: f32);

    /// The chip's control register; sets word framing for raw byte streams.
    fn control_register(&self) -> u8;
}

/// A loaded tape image.
pub enum TapeSource {
    Tapefile(TapefileTape),
    Uef(UefTape),
}

impl TapeSource {
    /// Perform the next unit of work and return its duration on the wire.
    pub fn poll(&mut self, sink: &mut dyn TapeSink) -> Result<Ticks, TapeError> {
        match self {
            TapeSource::Tapefile(tape) => tape.poll(sink),
            TapeSource::Uef(tape) => tape.poll(sink),
        }
    }

    /// Return to the start of the tape, discarding decoder state.
    pub fn rewind(&mut self) {
        match self {
            TapeSource::Tapefile(tape) => tape.rewind(),
            TapeSource::Uef(tape) => tape.rewind(),
        }
    }

    /// Whether the whole image has been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match self {
            TapeSource::Tapefile(tape) => tape.is_finished(),
            TapeSource::Uef(tape) => tape.is_finished(),
        }
    }

    #[must_use]
    pub fn format_name(&self) -> &'static str {
        match self {
            TapeSource::Tapefile(_) => "tapefile",
            TapeSource::Uef(_) => "uef",
        }
    }
}

/// Identify and open a tape image.
///
/// A gzip-compressed image is inflated first. Then a leading `FF 04`
/// (carrier escape) marks a Tapefile and a `"UEF File!"` magic marks a UEF
/// container.
pub fn load_tape(data: Vec<u8>, clock: MasterClock) -> Result<TapeSource, TapeError> {
    let data = if data.starts_with(&GZIP_MAGIC) {
        gunzip(&data)?
    } else {
        data
    };
    if data.starts_with(&[0xFF, 0x04]) {
        info!("Detected a tapefile tape ({} bytes)", data.len());
        return Ok(TapeSource::Tapefile(TapefileTape::new(data, clock)));
    }
    if data.starts_with(uef::MAGIC) {
        info!("Detected a UEF tape ({} bytes)", data.len());
        return Ok(TapeSource::Uef(UefTape::new(data, clock)?));
    }
    Err(TapeError::UnknownFormat)
}

fn gunzip(compressed: &[u8]) -> Result<Vec<u8>, TapeError> {
    let mut data = Vec::new();
    MultiGzDecoder::new(compressed)
        .read_to_end(&mut data)
        .map_err(|err| TapeError::Decompress(err.to_string()))?;
    info!(
        "Inflated gzip tape image ({} -> {} bytes)",
        compressed.len(),
        data.len()
    );
    Ok(data)
}
