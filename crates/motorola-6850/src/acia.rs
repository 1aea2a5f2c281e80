//! The 6850 register model and its cassette/RS423 timing.

use emu_core::{Bus, MasterClock, Observable, Scheduler, TaskId, Ticks, Value};
use format_bbc_tape::{TapeError, TapeSink, TapeSource};
use log::{info, warn};

use crate::{
    AciaConfig, MotorNoise, Rs423Handler, SR_CTS, SR_DCD, SR_IRQ, SR_RDRF, SR_TDRE,
    ToneGenerator,
};

/// Control register value meaning master reset (low two bits).
const CR_MASTER_RESET: u8 = 0x03;
/// Control register word length select: 8 data bits when set.
const CR_WORD_8: u8 = 0x10;

/// Stop and parity bit counts, indexed by CR bits 2-4.
const WORD_SELECT: [(u32, u32); 8] = [
    (2, 1),
    (2, 1),
    (1, 1),
    (1, 1),
    (2, 0),
    (1, 0),
    (1, 1),
    (1, 1),
];

/// Register block and everything task callbacks need to reach.
struct AciaCore {
    sr: u8,
    cr: u8,
    dr: u8,
    clock: MasterClock,
    rs423_selected: bool,
    motor_on: bool,
    serial_receive_rate: u32,
    tape: Option<TapeSource>,
    /// Set by the tape task when the image turns out to be malformed.
    tape_error: Option<TapeError>,
    rs423: Option<Box<dyn Rs423Handler>>,
    tone_generator: Option<Box<dyn ToneGenerator>>,
    motor_noise: Option<Box<dyn MotorNoise>>,
}

impl AciaCore {
    fn set_dcd(&mut self, level: bool) {
        if level {
            // Edge triggered: only a rising carrier interrupts.
            if self.sr & SR_DCD == 0 {
                self.sr |= SR_DCD | SR_IRQ;
            }
        } else {
            self.sr &= !SR_DCD;
        }
    }

    fn receive(&mut self, byte: u8) {
        self.dr = byte;
        self.sr |= SR_RDRF | SR_IRQ;
    }

    fn num_bits_per_byte(&self) -> u32 {
        let word_length = if self.cr & CR_WORD_8 != 0 { 8 } else { 7 };
        let (stop_bits, parity_bits) = WORD_SELECT[usize::from((self.cr >> 2) & 7)];
        word_length + stop_bits + parity_bits
    }

    fn rts(&self) -> bool {
        self.cr & 0x40 == 0 || self.cr & 0x60 == 0x60
    }

    fn cycles_per_byte(&self) -> Ticks {
        let ticks = self.clock.periods_to_ticks(
            f64::from(self.num_bits_per_byte()),
            f64::from(self.serial_receive_rate),
        );
        if ticks.is_zero() { Ticks::new(1) } else { ticks }
    }

    fn play_tone(&mut self, hz: f32) {
        if let Some(generator) = self.tone_generator.as_mut() {
            if hz > 0.0 {
                generator.tone(hz);
            } else {
                generator.mute();
            }
        }
    }

    /// Run the tape until it asks for a real delay. `None` when there's
    /// nothing to poll or the tape had to be ejected.
    fn poll_tape(&mut self) -> Option<Ticks> {
        if !self.motor_on {
            return None;
        }
        let mut tape = self.tape.take()?;
        let result = loop {
            match tape.poll(self) {
                Ok(delay) if delay.is_zero() => {}
                other => break other,
            }
        };
        match result {
            Ok(delay) => {
                self.tape = Some(tape);
                Some(delay)
            }
            Err(err) => {
                warn!("Ejecting {} tape: {err}", tape.format_name());
                self.tape_error = Some(err);
                None
            }
        }
    }

    fn poll_rs423(&mut self) {
        let rts = self.rts();
        let byte = self
            .rs423
            .as_mut()
            .and_then(|handler| handler.try_receive(rts));
        if let Some(byte) = byte {
            self.receive(byte);
        }
    }
}

impl TapeSink for AciaCore {
    fn receive(&mut self, byte: u8) {
        AciaCore::receive(self, byte);
    }

    fn set_dcd(&mut self, level: bool) {
        // The cassette carrier can't reach DCD while RS423 is selected.
        if !self.rs423_selected {
            AciaCore::set_dcd(self, level);
        }
    }

    fn tone(&mut self, hz: f32) {
        self.play_tone(hz);
    }

    fn control_register(&self) -> u8 {
        self.cr
    }
}

/// Motorola MC6850 ACIA.
pub struct Acia {
    core: AciaCore,
    timers: Scheduler<AciaCore>,
    tx_complete: TaskId,
    tape_poll: TaskId,
    rs423_poll: TaskId,
    tx_delay: Ticks,
}

impl Acia {
    /// # Panics
    ///
    /// If the configured transmit delay or receive rate is zero.
    #[must_use]
    pub fn new(config: AciaConfig) -> Self {
        assert!(!config.tx_delay.is_zero(), "ACIA transmit delay must be positive");
        assert!(
            config.serial_receive_rate > 0,
            "ACIA receive rate must be positive"
        );

        let mut timers = Scheduler::new();
        let tx_complete = timers.new_task(|core: &mut AciaCore, _, _| {
            core.sr |= SR_TDRE;
        });
        let tape_poll = timers.new_task(|core: &mut AciaCore, timers, task| {
            if let Some(delay) = core.poll_tape() {
                timers.schedule(task, delay);
            }
        });
        let rs423_poll = timers.new_task(|core: &mut AciaCore, timers, task| {
            if core.rs423_selected {
                core.poll_rs423();
                timers.schedule(task, core.cycles_per_byte());
            }
        });

        Self {
            core: AciaCore {
                sr: 0,
                cr: 0,
                dr: 0,
                clock: config.clock,
                rs423_selected: false,
                motor_on: false,
                serial_receive_rate: config.serial_receive_rate,
                tape: None,
                tape_error: None,
                rs423: None,
                tone_generator: None,
                motor_noise: None,
            },
            timers,
            tx_complete,
            tape_poll,
            rs423_poll,
            tx_delay: config.tx_delay,
        }
    }

    /// Check if the ACIA is requesting an interrupt.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.core.sr & self.core.cr & SR_IRQ != 0
    }

    /// Read a register. Address bit 0 selects data (1) or status (0).
    pub fn read(&mut self, addr: u16) -> u8 {
        if addr & 1 != 0 {
            self.core.sr &= !(SR_RDRF | SR_IRQ);
            self.core.dr
        } else {
            let sr = self.core.sr;
            let mut result = (sr & 0x7F) | (sr & self.core.cr & SR_IRQ);
            if !self.clear_to_send() {
                result &= !SR_TDRE;
            }
            result
        }
    }

    /// Write a register. Address bit 0 selects data (1) or control (0).
    pub fn write(&mut self, addr: u16, value: u8) {
        if addr & 1 != 0 {
            self.core.sr &= !SR_TDRE;
            self.timers
                .ensure_scheduled(self.tx_complete, true, self.tx_delay);
            if self.core.rs423_selected {
                if let Some(handler) = self.core.rs423.as_mut() {
                    handler.on_transmit(value);
                }
            }
        } else if value & CR_MASTER_RESET == CR_MASTER_RESET {
            self.reset();
        } else {
            self.core.cr = value;
        }
    }

    /// Master reset. CTS is an external input and survives; TDRE and DCD
    /// are forced high, everything else clears.
    pub fn reset(&mut self) {
        self.core.sr = (self.core.sr & SR_CTS) | SR_TDRE | SR_DCD;
    }

    /// Route the receive side to RS423 (`true`) or the cassette.
    ///
    /// Nothing drives CTS low on the RS423 side, so selecting it raises CTS
    /// and drops DCD. Cassette mode is always clear to send.
    pub fn select_rs423(&mut self, selected: bool) {
        self.core.rs423_selected = selected;
        if selected {
            self.core.sr |= SR_CTS;
            self.core.set_dcd(false);
        } else {
            self.core.sr &= !SR_CTS;
        }
        let period = self.core.cycles_per_byte();
        self.timers
            .ensure_scheduled(self.rs423_poll, selected, period);
    }

    /// Drive the carrier detect input.
    pub fn set_dcd(&mut self, level: bool) {
        self.core.set_dcd(level);
    }

    /// Deliver a received byte. An unread byte is overwritten.
    pub fn receive(&mut self, byte: u8) {
        self.core.receive(byte);
    }

    /// Switch the cassette motor relay.
    pub fn set_motor(&mut self, on: bool) {
        if on == self.core.motor_on {
            return;
        }
        self.core.motor_on = on;
        if on {
            info!("Cassette motor on");
            if let Some(noise) = self.core.motor_noise.as_mut() {
                noise.motor_on();
            }
            let has_tape = self.core.tape.is_some();
            self.timers
                .ensure_scheduled(self.tape_poll, has_tape, Ticks::new(1));
        } else {
            info!("Cassette motor off");
            self.core.play_tone(0.0);
            self.timers.cancel(self.tape_poll);
            TapeSink::set_dcd(&mut self.core, false);
            if let Some(noise) = self.core.motor_noise.as_mut() {
                noise.motor_off();
            }
        }
    }

    /// Advance time by `cycles`.
    ///
    /// A malformed tape is ejected and its error returned; the ACIA itself
    /// stays usable.
    pub fn polltime(&mut self, cycles: Ticks) -> Result<(), TapeError> {
        self.timers.polltime_with(cycles, &mut self.core);
        match self.core.tape_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cycles until the transmit register empties, zero when it already has.
    #[must_use]
    pub fn tx_time_remaining(&self) -> Ticks {
        self.timers
            .remaining(self.tx_complete)
            .unwrap_or(Ticks::ZERO)
    }

    /// Set the RS423 receive rate in baud.
    ///
    /// # Panics
    ///
    /// If `rate` is zero.
    pub fn set_serial_receive(&mut self, rate: u32) {
        assert!(rate > 0, "serial receive rate must be positive");
        self.core.serial_receive_rate = rate;
    }

    #[must_use]
    pub fn serial_receive_rate(&self) -> u32 {
        self.core.serial_receive_rate
    }

    /// Bits per character on the wire for the current control register.
    #[must_use]
    pub fn num_bits_per_byte(&self) -> u32 {
        self.core.num_bits_per_byte()
    }

    /// Request-to-send output: low only for CR6:5 = `10`.
    #[must_use]
    pub fn rts(&self) -> bool {
        self.core.rts()
    }

    /// Whether the transmitter may report TDRE.
    #[must_use]
    pub fn clear_to_send(&self) -> bool {
        self.core.sr & SR_CTS == 0
    }

    /// Load a tape, returning whatever was in the deck.
    pub fn insert_tape(&mut self, tape: TapeSource) -> Option<TapeSource> {
        info!("Inserted {} tape", tape.format_name());
        let previous = self.core.tape.replace(tape);
        self.timers.cancel(self.tape_poll);
        if self.core.motor_on {
            self.timers.schedule(self.tape_poll, Ticks::new(1));
        }
        previous
    }

    pub fn eject_tape(&mut self) -> Option<TapeSource> {
        self.timers.cancel(self.tape_poll);
        self.core.tape.take()
    }

    pub fn rewind_tape(&mut self) {
        if let Some(tape) = self.core.tape.as_mut() {
            info!("Rewinding tape");
            tape.rewind();
        }
    }

    #[must_use]
    pub fn tape(&self) -> Option<&TapeSource> {
        self.core.tape.as_ref()
    }

    pub fn set_rs423_handler(&mut self, handler: Option<Box<dyn Rs423Handler>>) {
        self.core.rs423 = handler;
    }

    pub fn set_tone_generator(&mut self, generator: Option<Box<dyn ToneGenerator>>) {
        self.core.tone_generator = generator;
    }

    pub fn set_motor_noise(&mut self, noise: Option<Box<dyn MotorNoise>>) {
        self.core.motor_noise = noise;
    }

    /// Raw status register, without the read-time CTS masking.
    #[must_use]
    pub fn status(&self) -> u8 {
        self.core.sr
    }

    #[must_use]
    pub fn control(&self) -> u8 {
        self.core.cr
    }

    #[must_use]
    pub fn data(&self) -> u8 {
        self.core.dr
    }

    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.core.motor_on
    }

    #[must_use]
    pub fn rs423_selected(&self) -> bool {
        self.core.rs423_selected
    }
}

impl Default for Acia {
    fn default() -> Self {
        Self::new(AciaConfig::default())
    }
}

impl Bus for Acia {
    fn read(&mut self, address: u16) -> u8 {
        Acia::read(self, address)
    }

    fn write(&mut self, address: u16, value: u8) {
        Acia::write(self, address, value);
    }
}

impl Observable for Acia {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "status" => Some(self.core.sr.into()),
            "control" => Some(self.core.cr.into()),
            "data" => Some(self.core.dr.into()),
            "irq" => Some(self.irq_active().into()),
            "motor" => Some(self.core.motor_on.into()),
            "rs423" => Some(self.core.rs423_selected.into()),
            "tx_remaining" => Some(self.tx_time_remaining().into()),
            "tape" => Some(
                self.core
                    .tape
                    .as_ref()
                    .map_or("none", TapeSource::format_name)
                    .into(),
            ),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "status",
            "control",
            "data",
            "irq",
            "motor",
            "rs423",
            "tx_remaining",
            "tape",
        ]
    }
}
