//! Motorola MC6850 Asynchronous Communications Interface Adapter (ACIA).
//!
//! On the BBC Micro the 6850 sits behind the serial ULA, which routes its
//! receive side either to the cassette interface or to the RS423 port. The
//! ACIA model here owns the loaded tape and a small private scheduler that
//! times transmit completion, tape polling and RS423 receive polling.
//!
//! # Registers (address bit 0)
//!
//! | Addr | Read            | Write            |
//! |------|-----------------|------------------|
//! | $0   | Status (SR)     | Control (CR)     |
//! | $1   | Receive data    | Transmit data    |
//!
//! # Status bits
//!
//! | Bit | Name | Meaning                                |
//! |-----|------|----------------------------------------|
//! | 0   | RDRF | Receive data register full             |
//! | 1   | TDRE | Transmit data register empty           |
//! | 2   | DCD  | Data carrier detect                    |
//! | 3   | CTS  | Clear to send (active low)             |
//! | 7   | IRQ  | Interrupt request pending              |
//!
//! Writing a control value with both low bits set is a master reset.

mod acia;
mod config;
mod handler;
mod serial_ula;

pub use acia::Acia;
pub use config::AciaConfig;
pub use handler::{MotorNoise, Rs423Handler, ToneGenerator};
pub use serial_ula::SerialUla;

/// Receive data register full.
pub const SR_RDRF: u8 = 0x01;
/// Transmit data register empty.
pub const SR_TDRE: u8 = 0x02;
/// Data carrier detect.
pub const SR_DCD: u8 = 0x04;
/// Clear to send, active low.
pub const SR_CTS: u8 = 0x08;
/// Interrupt request.
pub const SR_IRQ: u8 = 0x80;
