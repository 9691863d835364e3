//! 6502 addressing modes.
//!
//! Instruction bytes, zero page, the stack and indirect pointers are always
//! RAM and go through `Bus::peek`/`Bus::poke`. Data at a full 16-bit
//! effective address may be an I/O register and goes through
//! `Bus::read`/`Bus::write`.
//!
//! - Immediate: #$nn
//! - Zero Page: $nn, $nn,X, $nn,Y (index wraps within page zero)
//! - Absolute: $nnnn, $nnnn,X, $nnnn,Y
//! - Indexed Indirect: ($nn,X)
//! - Indirect Indexed: ($nn),Y
//! - Relative: branch offset (-128 to +127)
//! - Indirect: ($nnnn), JMP only, with the page wrap bug

use emu_core::Bus;

use crate::Mos6502;

/// Operand addressing mode of a data instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndexedIndirect,
    IndirectIndexed,
}

/// Where an operand lives once its address has been worked out.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Zero page: always RAM.
    Ram(u16),
    /// Anywhere in the address space: may be I/O.
    Decoded(u16),
}

impl Mos6502 {
    /// Fetch the next instruction byte and increment PC.
    pub(crate) fn fetch<B: Bus>(&mut self, bus: &B) -> u8 {
        let value = bus.peek(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch a 16-bit little-endian word at PC.
    pub(crate) fn fetch_word<B: Bus>(&mut self, bus: &B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Read a 16-bit word from RAM (vectors).
    pub(crate) fn read_vector<B: Bus>(bus: &B, addr: u16) -> u16 {
        u16::from_le_bytes([bus.peek(addr), bus.peek(addr.wrapping_add(1))])
    }

    /// Read a pointer from zero page, wrapping within page zero.
    fn zp_pointer<B: Bus>(bus: &B, ptr: u8) -> u16 {
        u16::from_le_bytes([bus.peek(u16::from(ptr)), bus.peek(u16::from(ptr.wrapping_add(1)))])
    }

    /// Push a byte onto the stack.
    pub(crate) fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push();
        bus.poke(addr, value);
    }

    /// Pull a byte from the stack.
    pub(crate) fn pull<B: Bus>(&mut self, bus: &B) -> u8 {
        let addr = self.regs.pop();
        bus.peek(addr)
    }

    /// Push a 16-bit word (high byte first).
    pub(crate) fn push_word<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    /// Pull a 16-bit word (low byte first).
    pub(crate) fn pull_word<B: Bus>(&mut self, bus: &B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Add `index` to `base`, charging a cycle for a page crossing when the
    /// instruction is a read.
    fn indexed<B: Bus>(&mut self, bus: &mut B, base: u16, index: u8, penalty: bool) -> u16 {
        let addr = base.wrapping_add(u16::from(index));
        if penalty && (addr & 0xFF) < u16::from(index) {
            self.charge(bus, 1);
        }
        addr
    }

    /// Work out where the operand of `mode` lives.
    ///
    /// `penalty` selects read timing (extra cycle on page crossing) versus
    /// write/read-modify-write timing, whose cost is already in the table.
    fn target<B: Bus>(&mut self, bus: &mut B, mode: Mode, penalty: bool) -> Target {
        match mode {
            Mode::Immediate => {
                let addr = self.regs.pc;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                Target::Ram(addr)
            }
            Mode::ZeroPage => Target::Ram(u16::from(self.fetch(bus))),
            Mode::ZeroPageX => Target::Ram(u16::from(self.fetch(bus).wrapping_add(self.regs.x))),
            Mode::ZeroPageY => Target::Ram(u16::from(self.fetch(bus).wrapping_add(self.regs.y))),
            Mode::Absolute => Target::Decoded(self.fetch_word(bus)),
            Mode::AbsoluteX => {
                let base = self.fetch_word(bus);
                Target::Decoded(self.indexed(bus, base, self.regs.x, penalty))
            }
            Mode::AbsoluteY => {
                let base = self.fetch_word(bus);
                Target::Decoded(self.indexed(bus, base, self.regs.y, penalty))
            }
            Mode::IndexedIndirect => {
                let ptr = self.fetch(bus).wrapping_add(self.regs.x);
                Target::Decoded(Self::zp_pointer(bus, ptr))
            }
            Mode::IndirectIndexed => {
                let ptr = self.fetch(bus);
                let base = Self::zp_pointer(bus, ptr);
                Target::Decoded(self.indexed(bus, base, self.regs.y, penalty))
            }
        }
    }

    /// Read the operand of `mode` and hand it to `op`.
    pub(crate) fn read_op<B: Bus>(&mut self, bus: &mut B, mode: Mode, op: fn(&mut Self, u8)) {
        let value = match self.target(bus, mode, true) {
            Target::Ram(addr) => bus.peek(addr),
            Target::Decoded(addr) => bus.read(addr),
        };
        op(self, value);
    }

    /// Store the value produced by `val` at the operand of `mode`.
    pub(crate) fn write_op<B: Bus>(&mut self, bus: &mut B, mode: Mode, val: fn(&Self) -> u8) {
        let target = self.target(bus, mode, false);
        let value = val(self);
        match target {
            Target::Ram(addr) => bus.poke(addr, value),
            Target::Decoded(addr) => bus.write(addr, value),
        }
    }

    /// Read, transform with `op` and write back the operand of `mode`.
    pub(crate) fn rmw_op<B: Bus>(&mut self, bus: &mut B, mode: Mode, op: fn(&mut Self, u8) -> u8) {
        match self.target(bus, mode, false) {
            Target::Ram(addr) => {
                let value = bus.peek(addr);
                let result = op(self, value);
                bus.poke(addr, result);
            }
            Target::Decoded(addr) => {
                let value = bus.read_rmw(addr);
                let result = op(self, value);
                bus.write(addr, result);
            }
        }
    }

    /// Relative branch: one extra cycle when taken, one more when the
    /// target is on another page.
    pub(crate) fn branch<B: Bus>(&mut self, bus: &mut B, condition: bool) {
        let offset = self.fetch(bus) as i8;
        if condition {
            let target = self.regs.pc.wrapping_add(offset as u16);
            let extra = if (target ^ self.regs.pc) & 0xFF00 != 0 { 2 } else { 1 };
            self.charge(bus, extra);
            self.regs.pc = target;
        }
    }

    /// Stores of the form `register & (high byte of base + 1)` to `base + index`.
    pub(crate) fn store_high_and<B: Bus>(&mut self, bus: &mut B, base: u16, index: u8, value: u8) {
        let hi = (base >> 8) as u8;
        let addr = base.wrapping_add(u16::from(index));
        bus.write(addr, value & hi.wrapping_add(1));
    }

    /// Zero page pointer used by `($nn),Y` high-byte stores.
    pub(crate) fn fetch_zp_pointer<B: Bus>(&mut self, bus: &B) -> u16 {
        let ptr = self.fetch(bus);
        Self::zp_pointer(bus, ptr)
    }

    /// Skip the operand of an absolute,X NOP, charging a page crossing.
    pub(crate) fn skip_abx<B: Bus>(&mut self, bus: &mut B) {
        let base = self.fetch_word(bus);
        self.indexed(bus, base, self.regs.x, true);
    }

    /// JMP ($nnnn): the high byte is read from the start of the same page
    /// when the pointer sits at $xxFF.
    pub(crate) fn read_indirect_jump<B: Bus>(bus: &B, addr: u16) -> u16 {
        let hi_addr = (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF);
        u16::from_le_bytes([bus.peek(addr), bus.peek(hi_addr)])
    }
}
