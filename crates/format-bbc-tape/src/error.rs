//! Tape decoding errors.

use thiserror::Error;

/// Why a tape image couldn't be loaded or decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TapeError {
    /// A Tapefile `0xFF` escape followed by something other than `00`, `04` or `FF`.
    #[error("unexpected escape byte {0:#04X} in tapefile")]
    UnexpectedEscape(u8),

    #[error("unsupported UEF version {major}.{minor}")]
    UnsupportedUefVersion { major: u8, minor: u8 },

    #[error("truncated {context} at offset {offset}: need {needed} bytes, {remaining} remain")]
    Truncated {
        context: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A gzip-wrapped image that didn't inflate cleanly.
    #[error("corrupt gzip tape image: {0}")]
    Decompress(String),

    /// Neither a Tapefile nor a UEF image.
    #[error("unrecognised tape image format")]
    UnknownFormat,
}
