//! BBC Micro serial ULA (control register at &FE10).
//!
//! | Bits | Meaning                                  |
//! |------|------------------------------------------|
//! | 0-2  | Transmit baud rate                       |
//! | 3-5  | Receive baud rate                        |
//! | 6    | RS423 select (0 = cassette)              |
//! | 7    | Cassette motor relay                     |

use crate::Acia;

/// Baud rates selected by each 3-bit rate field.
const BAUD_RATES: [u32; 8] = [19_200, 9_600, 4_800, 2_400, 1_200, 300, 150, 75];

/// The serial ULA's write-only control register and its effect on the ACIA.
#[derive(Debug, Default)]
pub struct SerialUla {
    register: u8,
}

impl SerialUla {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.register = 0;
    }

    /// Latch a control value and apply it to `acia`.
    pub fn write(&mut self, acia: &mut Acia, value: u8) {
        self.register = value;
        acia.set_serial_receive(self.receive_rate());
        acia.set_motor(value & 0x80 != 0);
        acia.select_rs423(value & 0x40 != 0);
    }

    /// The register is write-only. A read drives the data bus with &FE,
    /// which the ULA latches as a write.
    pub fn read(&mut self, acia: &mut Acia) -> u8 {
        self.write(acia, 0xFE);
        0
    }

    #[must_use]
    pub fn register(&self) -> u8 {
        self.register
    }

    #[must_use]
    pub fn transmit_rate(&self) -> u32 {
        BAUD_RATES[usize::from(self.register & 0x07)]
    }

    #[must_use]
    pub fn receive_rate(&self) -> u32 {
        BAUD_RATES[usize::from((self.register >> 3) & 0x07)]
    }
}
