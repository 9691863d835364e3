//! CPU core trait.

use crate::Bus;

/// A CPU core that executes whole instructions.
///
/// The bus is passed in, not owned, so the machine can keep sound chips
/// and timers behind it and inspect them between instructions.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction and return the cycles it took.
    ///
    /// The cycles have already been charged to the bus with `Bus::tick`.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Take a maskable interrupt now, if interrupts are enabled.
    ///
    /// Returns true if the interrupt was taken.
    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> bool;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU has stopped on a halt opcode.
    fn is_halted(&self) -> bool;
}
