//! ACIA configuration.

use emu_core::{MasterClock, Ticks};

/// Configuration for creating an [`Acia`](crate::Acia).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AciaConfig {
    /// Clock the register-level timing is counted in.
    pub clock: MasterClock,
    /// Cycles between a data-register write and TDRE rising again. The real
    /// shift-register load time isn't known; a late TDRE is harmless where an
    /// early one isn't.
    pub tx_delay: Ticks,
    /// Initial RS423 receive rate in baud, until the serial ULA sets one.
    pub serial_receive_rate: u32,
}

impl Default for AciaConfig {
    fn default() -> Self {
        Self {
            clock: MasterClock::BBC_MICRO,
            tx_delay: Ticks::new(2000),
            serial_receive_rate: 19_200,
        }
    }
}
