//! Collaborators the ACIA drives.
//!
//! All of them are optional. A missing collaborator is simply skipped.

/// A device on the far end of the RS423 port.
pub trait Rs423Handler {
    /// The machine transmitted `byte`.
    fn on_transmit(&mut self, byte: u8);

    /// Offer a byte to the machine. Polled once per byte time while RS423 is
    /// selected; `rts` is the ACIA's request-to-send output.
    fn try_receive(&mut self, rts: bool) -> Option<u8>;
}

/// Audible cassette tone.
pub trait ToneGenerator {
    fn tone(&mut self, hz: f32);
    fn mute(&mut self);
}

/// Cassette motor relay sound effects.
pub trait MotorNoise {
    fn motor_on(&mut self);
    fn motor_off(&mut self);
}
