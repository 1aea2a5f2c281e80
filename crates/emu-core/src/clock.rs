//! Base clock configuration.

use crate::Ticks;

/// The clock every cycle count in a machine is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Frequency in Hz (e.g., `2_000_000` for the BBC Micro's 6502 bus).
    pub frequency_hz: u64,
}

impl MasterClock {
    /// The BBC Micro's 2 MHz system clock.
    pub const BBC_MICRO: Self = Self::new(2_000_000);

    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Convert a duration in seconds to whole cycles, truncating toward zero.
    ///
    /// Negative and NaN durations give zero cycles.
    #[must_use]
    pub fn secs_to_ticks(&self, secs: f64) -> Ticks {
        // `as` saturates: NaN and negatives become 0.
        Ticks::new((self.frequency_hz as f64 * secs) as u64)
    }

    /// Cycles spanned by `periods` periods of a `hz` waveform, truncating.
    #[must_use]
    pub fn periods_to_ticks(&self, periods: f64, hz: f64) -> Ticks {
        Ticks::new((self.frequency_hz as f64 * periods / hz) as u64)
    }
}

impl Default for MasterClock {
    fn default() -> Self {
        Self::BBC_MICRO
    }
}
