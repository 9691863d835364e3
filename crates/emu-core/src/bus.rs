//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The CPU accesses memory through this trait. The bus owns the cycle
/// counter: the CPU charges the cost of each instruction with [`Bus::tick`]
/// before performing the instruction's data accesses, so a memory-mapped
/// device sees the cycle at which the access completes.
///
/// There are two kinds of access. [`Bus::read`] and [`Bus::write`] are
/// decoded and may reach I/O registers. [`Bus::peek`] and [`Bus::poke`] go
/// straight to RAM; the CPU uses them for opcode and operand fetches, zero
/// page, the stack and vectors.
pub trait Bus {
    /// Read a byte, decoding I/O addresses.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte, decoding I/O addresses.
    fn write(&mut self, address: u16, value: u8);

    /// Read a byte from RAM, bypassing I/O decoding.
    fn peek(&self, address: u16) -> u8;

    /// Write a byte to RAM, bypassing I/O decoding.
    fn poke(&mut self, address: u16, value: u8);

    /// Advance the cycle counter.
    fn tick(&mut self, cycles: u32);

    /// Read the operand of a read-modify-write instruction.
    ///
    /// A real 6502 reads the operand one cycle before writing it back twice.
    /// Buses whose devices care about that timing override this.
    fn read_rmw(&mut self, address: u16) -> u8 {
        self.read(address)
    }
}
