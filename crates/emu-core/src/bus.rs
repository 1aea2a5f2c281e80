//! Memory-mapped register access.

/// A device reachable through memory-mapped I/O.
///
/// The host CPU loop routes register accesses through this trait. Each
/// device decodes only the address lines it cares about.
pub trait Bus {
    /// Read a register. Reads may have side effects (clearing flags).
    fn read(&mut self, address: u16) -> u8;

    /// Write a register.
    fn write(&mut self, address: u16, value: u8);
}
