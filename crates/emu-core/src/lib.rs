//! Core types for cycle-accurate emulation.
//!
//! Everything is measured in cycles of the machine's base clock. Peripherals
//! never look at host time: they are advanced explicitly by the caller, and
//! timed work rides on the [`Scheduler`].

mod bitstream;
mod bus;
mod clock;
mod observable;
pub mod scheduler;
mod ticks;

pub use bitstream::BitStream;
pub use bus::Bus;
pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use scheduler::{Scheduler, TaskCallback, TaskId};
pub use ticks::Ticks;
