//! 6502 CPU implementation.
//!
//! Instruction-stepped emulation: `step()` fetches an opcode, charges its
//! base cost from [`CYCLES`] to the bus and then performs the whole
//! instruction. Extra cycles for page crossings and taken branches are
//! charged at the point where they happen.

use emu_core::{Bus, Cpu, Observable, Value};

use crate::addressing::Mode;
use crate::flags::{C, D, I, N, V, Z};
use crate::{CYCLES, Registers, Status};

/// The MOS 6502 CPU.
#[derive(Debug, Clone)]
pub struct Mos6502 {
    /// CPU registers.
    pub regs: Registers,

    /// Set when the last instruction was a halt opcode (CIM).
    halted: bool,

    /// Cycles charged by the instruction in progress.
    step_cycles: u32,

    /// Total cycles executed (for debugging).
    total_cycles: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// Create a new 6502 in reset state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            halted: false,
            step_cycles: 0,
            total_cycles: 0,
        }
    }

    /// Charge cycles to the bus and to the current instruction.
    pub(crate) fn charge<B: Bus>(&mut self, bus: &mut B, cycles: u32) {
        bus.tick(cycles);
        self.step_cycles += cycles;
    }

    /// Execute one instruction.
    fn execute<B: Bus>(&mut self, bus: &mut B, opcode: u8) {
        use Mode::{
            Absolute as Abs, AbsoluteX as Abx, AbsoluteY as Aby, Immediate as Imm,
            IndexedIndirect as Izx, IndirectIndexed as Izy, ZeroPage as Zp, ZeroPageX as Zpx,
            ZeroPageY as Zpy,
        };

        match opcode {
            // BRK - 7 cycles
            0x00 => {
                let pc = self.regs.pc.wrapping_add(1);
                self.push_word(bus, pc);
                let p = self.regs.p.to_byte_brk();
                self.push(bus, p);
                self.regs.p.set(I);
                self.regs.pc = Self::read_vector(bus, 0xFFFE);
            }

            // ORA
            0x01 => self.read_op(bus, Izx, Self::do_ora),
            0x05 => self.read_op(bus, Zp, Self::do_ora),
            0x09 => self.read_op(bus, Imm, Self::do_ora),
            0x0D => self.read_op(bus, Abs, Self::do_ora),
            0x11 => self.read_op(bus, Izy, Self::do_ora),
            0x15 => self.read_op(bus, Zpx, Self::do_ora),
            0x19 => self.read_op(bus, Aby, Self::do_ora),
            0x1D => self.read_op(bus, Abx, Self::do_ora),

            // AND
            0x21 => self.read_op(bus, Izx, Self::do_and),
            0x25 => self.read_op(bus, Zp, Self::do_and),
            0x29 => self.read_op(bus, Imm, Self::do_and),
            0x2D => self.read_op(bus, Abs, Self::do_and),
            0x31 => self.read_op(bus, Izy, Self::do_and),
            0x35 => self.read_op(bus, Zpx, Self::do_and),
            0x39 => self.read_op(bus, Aby, Self::do_and),
            0x3D => self.read_op(bus, Abx, Self::do_and),

            // EOR
            0x41 => self.read_op(bus, Izx, Self::do_eor),
            0x45 => self.read_op(bus, Zp, Self::do_eor),
            0x49 => self.read_op(bus, Imm, Self::do_eor),
            0x4D => self.read_op(bus, Abs, Self::do_eor),
            0x51 => self.read_op(bus, Izy, Self::do_eor),
            0x55 => self.read_op(bus, Zpx, Self::do_eor),
            0x59 => self.read_op(bus, Aby, Self::do_eor),
            0x5D => self.read_op(bus, Abx, Self::do_eor),

            // ADC
            0x61 => self.read_op(bus, Izx, Self::do_adc),
            0x65 => self.read_op(bus, Zp, Self::do_adc),
            0x69 => self.read_op(bus, Imm, Self::do_adc),
            0x6D => self.read_op(bus, Abs, Self::do_adc),
            0x71 => self.read_op(bus, Izy, Self::do_adc),
            0x75 => self.read_op(bus, Zpx, Self::do_adc),
            0x79 => self.read_op(bus, Aby, Self::do_adc),
            0x7D => self.read_op(bus, Abx, Self::do_adc),

            // SBC (0xEB is the undocumented duplicate)
            0xE1 => self.read_op(bus, Izx, Self::do_sbc),
            0xE5 => self.read_op(bus, Zp, Self::do_sbc),
            0xE9 | 0xEB => self.read_op(bus, Imm, Self::do_sbc),
            0xED => self.read_op(bus, Abs, Self::do_sbc),
            0xF1 => self.read_op(bus, Izy, Self::do_sbc),
            0xF5 => self.read_op(bus, Zpx, Self::do_sbc),
            0xF9 => self.read_op(bus, Aby, Self::do_sbc),
            0xFD => self.read_op(bus, Abx, Self::do_sbc),

            // CMP / CPX / CPY
            0xC1 => self.read_op(bus, Izx, Self::do_cmp),
            0xC5 => self.read_op(bus, Zp, Self::do_cmp),
            0xC9 => self.read_op(bus, Imm, Self::do_cmp),
            0xCD => self.read_op(bus, Abs, Self::do_cmp),
            0xD1 => self.read_op(bus, Izy, Self::do_cmp),
            0xD5 => self.read_op(bus, Zpx, Self::do_cmp),
            0xD9 => self.read_op(bus, Aby, Self::do_cmp),
            0xDD => self.read_op(bus, Abx, Self::do_cmp),
            0xE0 => self.read_op(bus, Imm, Self::do_cpx),
            0xE4 => self.read_op(bus, Zp, Self::do_cpx),
            0xEC => self.read_op(bus, Abs, Self::do_cpx),
            0xC0 => self.read_op(bus, Imm, Self::do_cpy),
            0xC4 => self.read_op(bus, Zp, Self::do_cpy),
            0xCC => self.read_op(bus, Abs, Self::do_cpy),

            // BIT
            0x24 => self.read_op(bus, Zp, Self::do_bit),
            0x2C => self.read_op(bus, Abs, Self::do_bit),

            // LDA
            0xA1 => self.read_op(bus, Izx, Self::do_lda),
            0xA5 => self.read_op(bus, Zp, Self::do_lda),
            0xA9 => self.read_op(bus, Imm, Self::do_lda),
            0xAD => self.read_op(bus, Abs, Self::do_lda),
            0xB1 => self.read_op(bus, Izy, Self::do_lda),
            0xB5 => self.read_op(bus, Zpx, Self::do_lda),
            0xB9 => self.read_op(bus, Aby, Self::do_lda),
            0xBD => self.read_op(bus, Abx, Self::do_lda),

            // LDX
            0xA2 => self.read_op(bus, Imm, Self::do_ldx),
            0xA6 => self.read_op(bus, Zp, Self::do_ldx),
            0xAE => self.read_op(bus, Abs, Self::do_ldx),
            0xB6 => self.read_op(bus, Zpy, Self::do_ldx),
            0xBE => self.read_op(bus, Aby, Self::do_ldx),

            // LDY
            0xA0 => self.read_op(bus, Imm, Self::do_ldy),
            0xA4 => self.read_op(bus, Zp, Self::do_ldy),
            0xAC => self.read_op(bus, Abs, Self::do_ldy),
            0xB4 => self.read_op(bus, Zpx, Self::do_ldy),
            0xBC => self.read_op(bus, Abx, Self::do_ldy),

            // STA
            0x81 => self.write_op(bus, Izx, Self::reg_a),
            0x85 => self.write_op(bus, Zp, Self::reg_a),
            0x8D => self.write_op(bus, Abs, Self::reg_a),
            0x91 => self.write_op(bus, Izy, Self::reg_a),
            0x95 => self.write_op(bus, Zpx, Self::reg_a),
            0x99 => self.write_op(bus, Aby, Self::reg_a),
            0x9D => self.write_op(bus, Abx, Self::reg_a),

            // STX
            0x86 => self.write_op(bus, Zp, Self::reg_x),
            0x8E => self.write_op(bus, Abs, Self::reg_x),
            0x96 => self.write_op(bus, Zpy, Self::reg_x),

            // STY
            0x84 => self.write_op(bus, Zp, Self::reg_y),
            0x8C => self.write_op(bus, Abs, Self::reg_y),
            0x94 => self.write_op(bus, Zpx, Self::reg_y),

            // ASL
            0x0A => self.regs.a = self.do_asl(self.regs.a),
            0x06 => self.rmw_op(bus, Zp, Self::do_asl),
            0x0E => self.rmw_op(bus, Abs, Self::do_asl),
            0x16 => self.rmw_op(bus, Zpx, Self::do_asl),
            0x1E => self.rmw_op(bus, Abx, Self::do_asl),

            // ROL
            0x2A => self.regs.a = self.do_rol(self.regs.a),
            0x26 => self.rmw_op(bus, Zp, Self::do_rol),
            0x2E => self.rmw_op(bus, Abs, Self::do_rol),
            0x36 => self.rmw_op(bus, Zpx, Self::do_rol),
            0x3E => self.rmw_op(bus, Abx, Self::do_rol),

            // LSR
            0x4A => self.regs.a = self.do_lsr(self.regs.a),
            0x46 => self.rmw_op(bus, Zp, Self::do_lsr),
            0x4E => self.rmw_op(bus, Abs, Self::do_lsr),
            0x56 => self.rmw_op(bus, Zpx, Self::do_lsr),
            0x5E => self.rmw_op(bus, Abx, Self::do_lsr),

            // ROR
            0x6A => self.regs.a = self.do_ror(self.regs.a),
            0x66 => self.rmw_op(bus, Zp, Self::do_ror),
            0x6E => self.rmw_op(bus, Abs, Self::do_ror),
            0x76 => self.rmw_op(bus, Zpx, Self::do_ror),
            0x7E => self.rmw_op(bus, Abx, Self::do_ror),

            // DEC
            0xC6 => self.rmw_op(bus, Zp, Self::do_dec),
            0xCE => self.rmw_op(bus, Abs, Self::do_dec),
            0xD6 => self.rmw_op(bus, Zpx, Self::do_dec),
            0xDE => self.rmw_op(bus, Abx, Self::do_dec),

            // INC
            0xE6 => self.rmw_op(bus, Zp, Self::do_inc),
            0xEE => self.rmw_op(bus, Abs, Self::do_inc),
            0xF6 => self.rmw_op(bus, Zpx, Self::do_inc),
            0xFE => self.rmw_op(bus, Abx, Self::do_inc),

            // Register increments and transfers
            0xCA => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.x);
            }
            0x88 => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.y);
            }
            0xE8 => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.update_nz(self.regs.x);
            }
            0xC8 => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.update_nz(self.regs.y);
            }
            0xAA => self.do_ldx(self.regs.a),  // TAX
            0xA8 => self.do_ldy(self.regs.a),  // TAY
            0x8A => self.do_lda(self.regs.x),  // TXA
            0x98 => self.do_lda(self.regs.y),  // TYA
            0xBA => self.do_ldx(self.regs.s),  // TSX
            0x9A => self.regs.s = self.regs.x, // TXS

            // Stack
            0x48 => {
                // PHA - 3 cycles
                let a = self.regs.a;
                self.push(bus, a);
            }
            0x08 => {
                // PHP - 3 cycles
                let p = self.regs.p.to_byte_brk();
                self.push(bus, p);
            }
            0x68 => {
                // PLA - 4 cycles
                let value = self.pull(bus);
                self.do_lda(value);
            }
            0x28 => {
                // PLP - 4 cycles
                self.regs.p = Status::from_byte(self.pull(bus));
            }

            // Flags
            0x18 => self.regs.p.clear(C),
            0x38 => self.regs.p.set(C),
            0x58 => self.regs.p.clear(I),
            0x78 => self.regs.p.set(I),
            0xB8 => self.regs.p.clear(V),
            0xD8 => self.regs.p.clear(D),
            0xF8 => self.regs.p.set(D),

            // Branches
            0x10 => self.branch(bus, !self.regs.p.is_set(N)),
            0x30 => self.branch(bus, self.regs.p.is_set(N)),
            0x50 => self.branch(bus, !self.regs.p.is_set(V)),
            0x70 => self.branch(bus, self.regs.p.is_set(V)),
            0x90 => self.branch(bus, !self.regs.p.is_set(C)),
            0xB0 => self.branch(bus, self.regs.p.is_set(C)),
            0xD0 => self.branch(bus, !self.regs.p.is_set(Z)),
            0xF0 => self.branch(bus, self.regs.p.is_set(Z)),

            // Jumps
            0x4C => self.regs.pc = self.fetch_word(bus),
            0x6C => {
                // JMP ($nnnn) - 5 cycles
                let ptr = self.fetch_word(bus);
                self.regs.pc = Self::read_indirect_jump(bus, ptr);
            }
            0x20 => {
                // JSR $nnnn - 6 cycles, pushes the address of its last byte
                let target = self.fetch_word(bus);
                let ret = self.regs.pc.wrapping_sub(1);
                self.push_word(bus, ret);
                self.regs.pc = target;
            }
            0x60 => {
                // RTS - 6 cycles
                self.regs.pc = self.pull_word(bus).wrapping_add(1);
            }
            0x40 => {
                // RTI - 6 cycles
                self.regs.p = Status::from_byte(self.pull(bus));
                self.regs.pc = self.pull_word(bus);
            }

            // NOPs of every length
            0xEA | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => {}
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 | 0x04 | 0x44 | 0x64 | 0x14 | 0x34 | 0x54 | 0x74
            | 0xD4 | 0xF4 => {
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
            0x0C => self.regs.pc = self.regs.pc.wrapping_add(2),
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => self.skip_abx(bus),

            // CIM - halt with PC on the opcode
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                self.regs.pc = self.regs.pc.wrapping_sub(1);
                self.halted = true;
            }

            // ASO (SLO) - ASL then ORA
            0x03 => self.rmw_op(bus, Izx, Self::do_aso),
            0x07 => self.rmw_op(bus, Zp, Self::do_aso),
            0x0F => self.rmw_op(bus, Abs, Self::do_aso),
            0x13 => self.rmw_op(bus, Izy, Self::do_aso),
            0x17 => self.rmw_op(bus, Zpx, Self::do_aso),
            0x1B => self.rmw_op(bus, Aby, Self::do_aso),
            0x1F => self.rmw_op(bus, Abx, Self::do_aso),

            // RLA - ROL then AND
            0x23 => self.rmw_op(bus, Izx, Self::do_rla),
            0x27 => self.rmw_op(bus, Zp, Self::do_rla),
            0x2F => self.rmw_op(bus, Abs, Self::do_rla),
            0x33 => self.rmw_op(bus, Izy, Self::do_rla),
            0x37 => self.rmw_op(bus, Zpx, Self::do_rla),
            0x3B => self.rmw_op(bus, Aby, Self::do_rla),
            0x3F => self.rmw_op(bus, Abx, Self::do_rla),

            // LSE (SRE) - LSR then EOR
            0x43 => self.rmw_op(bus, Izx, Self::do_lse),
            0x47 => self.rmw_op(bus, Zp, Self::do_lse),
            0x4F => self.rmw_op(bus, Abs, Self::do_lse),
            0x53 => self.rmw_op(bus, Izy, Self::do_lse),
            0x57 => self.rmw_op(bus, Zpx, Self::do_lse),
            0x5B => self.rmw_op(bus, Aby, Self::do_lse),
            0x5F => self.rmw_op(bus, Abx, Self::do_lse),

            // RRA - ROR then ADC
            0x63 => self.rmw_op(bus, Izx, Self::do_rra),
            0x67 => self.rmw_op(bus, Zp, Self::do_rra),
            0x6F => self.rmw_op(bus, Abs, Self::do_rra),
            0x73 => self.rmw_op(bus, Izy, Self::do_rra),
            0x77 => self.rmw_op(bus, Zpx, Self::do_rra),
            0x7B => self.rmw_op(bus, Aby, Self::do_rra),
            0x7F => self.rmw_op(bus, Abx, Self::do_rra),

            // DCM (DCP) - DEC then CMP
            0xC3 => self.rmw_op(bus, Izx, Self::do_dcm),
            0xC7 => self.rmw_op(bus, Zp, Self::do_dcm),
            0xCF => self.rmw_op(bus, Abs, Self::do_dcm),
            0xD3 => self.rmw_op(bus, Izy, Self::do_dcm),
            0xD7 => self.rmw_op(bus, Zpx, Self::do_dcm),
            0xDB => self.rmw_op(bus, Aby, Self::do_dcm),
            0xDF => self.rmw_op(bus, Abx, Self::do_dcm),

            // INS (ISB) - INC then SBC
            0xE3 => self.rmw_op(bus, Izx, Self::do_ins),
            0xE7 => self.rmw_op(bus, Zp, Self::do_ins),
            0xEF => self.rmw_op(bus, Abs, Self::do_ins),
            0xF3 => self.rmw_op(bus, Izy, Self::do_ins),
            0xF7 => self.rmw_op(bus, Zpx, Self::do_ins),
            0xFB => self.rmw_op(bus, Aby, Self::do_ins),
            0xFF => self.rmw_op(bus, Abx, Self::do_ins),

            // SAX - store A AND X
            0x83 => self.write_op(bus, Izx, Self::reg_ax),
            0x87 => self.write_op(bus, Zp, Self::reg_ax),
            0x8F => self.write_op(bus, Abs, Self::reg_ax),
            0x97 => self.write_op(bus, Zpy, Self::reg_ax),

            // LAX - load A and X
            0xA3 => self.read_op(bus, Izx, Self::do_lax),
            0xA7 => self.read_op(bus, Zp, Self::do_lax),
            0xAF => self.read_op(bus, Abs, Self::do_lax),
            0xB3 => self.read_op(bus, Izy, Self::do_lax),
            0xB7 => self.read_op(bus, Zpy, Self::do_lax),
            0xBF => self.read_op(bus, Aby, Self::do_lax),

            // Immediate-only combinations
            0x0B | 0x2B => self.read_op(bus, Imm, Self::do_anc),
            0x4B => self.read_op(bus, Imm, Self::do_alr),
            0x6B => self.read_op(bus, Imm, Self::do_arr),
            0x8B => self.read_op(bus, Imm, Self::do_ane),
            0xAB => self.read_op(bus, Imm, Self::do_anx),
            0xCB => self.read_op(bus, Imm, Self::do_sbx),

            // LAS $nnnn,Y - A, X and S all become S AND memory
            0xBB => self.read_op(bus, Aby, Self::do_las),

            // High-byte stores
            0x93 => {
                // SHA ($nn),Y
                let base = self.fetch_zp_pointer(bus);
                let value = self.regs.a & self.regs.x;
                self.store_high_and(bus, base, self.regs.y, value);
            }
            0x9F => {
                // SHA $nnnn,Y
                let base = self.fetch_word(bus);
                let value = self.regs.a & self.regs.x;
                self.store_high_and(bus, base, self.regs.y, value);
            }
            0x9B => {
                // SHS $nnnn,Y
                let base = self.fetch_word(bus);
                self.regs.s = self.regs.a & self.regs.x;
                self.store_high_and(bus, base, self.regs.y, self.regs.s);
            }
            0x9C => {
                // SHY $nnnn,X
                let base = self.fetch_word(bus);
                self.store_high_and(bus, base, self.regs.x, self.regs.y);
            }
            0x9E => {
                // SHX $nnnn,Y
                let base = self.fetch_word(bus);
                self.store_high_and(bus, base, self.regs.y, self.regs.x);
            }
        }
    }

    // ========================================================================
    // Store sources
    // ========================================================================

    fn reg_a(&self) -> u8 {
        self.regs.a
    }

    fn reg_x(&self) -> u8 {
        self.regs.x
    }

    fn reg_y(&self) -> u8 {
        self.regs.y
    }

    fn reg_ax(&self) -> u8 {
        self.regs.a & self.regs.x
    }

    // ========================================================================
    // ALU operations
    // ========================================================================

    fn do_lda(&mut self, val: u8) {
        self.regs.a = val;
        self.regs.p.update_nz(val);
    }

    fn do_ldx(&mut self, val: u8) {
        self.regs.x = val;
        self.regs.p.update_nz(val);
    }

    fn do_ldy(&mut self, val: u8) {
        self.regs.y = val;
        self.regs.p.update_nz(val);
    }

    fn do_ora(&mut self, val: u8) {
        self.regs.a |= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_and(&mut self, val: u8) {
        self.regs.a &= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_eor(&mut self, val: u8) {
        self.regs.a ^= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn decimal_mode(&self) -> bool {
        cfg!(feature = "decimal") && self.regs.p.is_set(D)
    }

    fn do_adc(&mut self, val: u8) {
        if self.decimal_mode() {
            self.do_adc_decimal(val);
        } else {
            self.do_adc_binary(val);
        }
    }

    fn do_adc_binary(&mut self, val: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(val) + u16::from(self.regs.p.carry());
        let result = sum as u8;

        self.regs.p.set_if(C, sum > 0xFF);
        self.regs.p.set_if(V, !(a ^ val) & (a ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// NMOS decimal ADC. Z comes from the binary sum; N and V come from the
    /// sum after the low nibble is adjusted but before the high nibble is,
    /// and N is also set when the binary sum is negative.
    fn do_adc_decimal(&mut self, val: u8) {
        let a = u16::from(self.regs.a);
        let val = u16::from(val);
        let carry = u16::from(self.regs.p.carry());

        let mut tmp = (a & 0x0F) + (val & 0x0F) + carry;
        if tmp >= 10 {
            tmp = (tmp - 10) | 0x10;
        }
        tmp += (a & 0xF0) + (val & 0xF0);

        let binary = (a + val + carry) & 0xFF;
        self.regs.p.set_if(Z, binary == 0);
        self.regs.p.set_if(N, (tmp | binary) & 0x80 != 0);
        self.regs.p.set_if(V, !(a ^ val) & (a ^ tmp) & 0x80 != 0);

        if tmp > 0x9F {
            tmp += 0x60;
        }
        self.regs.p.set_if(C, tmp > 0xFF);
        self.regs.a = tmp as u8;
    }

    fn do_sbc(&mut self, val: u8) {
        if self.decimal_mode() {
            self.do_sbc_decimal(val);
        } else {
            // SBC is ADC with inverted operand
            self.do_adc_binary(!val);
        }
    }

    /// NMOS decimal SBC. C and V come from the binary difference; N and Z
    /// from the adjusted result.
    fn do_sbc_decimal(&mut self, val: u8) {
        let a = i16::from(self.regs.a);
        let val = i16::from(val);
        let carry = i16::from(self.regs.p.carry());

        let binary = a - val - 1 + carry;
        let mut lo = (a & 0x0F) - (val & 0x0F) - 1 + carry;
        let mut hi = (a >> 4) - (val >> 4);
        if lo & 0x10 != 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi & 0x10 != 0 {
            hi -= 6;
        }

        self.regs.p.set_if(C, binary >= 0);
        self.regs.p.set_if(V, (val ^ a) & (a ^ binary) & 0x80 != 0);
        self.regs.a = ((hi << 4) + (lo & 0x0F)) as u8;
        self.regs.p.update_nz(self.regs.a);
    }

    fn compare(&mut self, reg: u8, val: u8) {
        self.regs.p.set_if(C, reg >= val);
        self.regs.p.update_nz(reg.wrapping_sub(val));
    }

    fn do_cmp(&mut self, val: u8) {
        self.compare(self.regs.a, val);
    }

    fn do_cpx(&mut self, val: u8) {
        self.compare(self.regs.x, val);
    }

    fn do_cpy(&mut self, val: u8) {
        self.compare(self.regs.y, val);
    }

    fn do_bit(&mut self, val: u8) {
        self.regs.p.set_if(Z, self.regs.a & val == 0);
        self.regs.p.set_if(N, val & 0x80 != 0);
        self.regs.p.set_if(V, val & 0x40 != 0);
    }

    fn do_asl(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x80 != 0);
        let result = val << 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_lsr(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x01 != 0);
        let result = val >> 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_rol(&mut self, val: u8) -> u8 {
        let carry = self.regs.p.carry();
        self.regs.p.set_if(C, val & 0x80 != 0);
        let result = (val << 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_ror(&mut self, val: u8) -> u8 {
        let carry = self.regs.p.carry() << 7;
        self.regs.p.set_if(C, val & 0x01 != 0);
        let result = (val >> 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_inc(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.regs.p.update_nz(result);
        result
    }

    fn do_dec(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.regs.p.update_nz(result);
        result
    }

    // ========================================================================
    // Undocumented operations
    // ========================================================================

    fn do_aso(&mut self, val: u8) -> u8 {
        let result = self.do_asl(val);
        self.do_ora(result);
        result
    }

    fn do_rla(&mut self, val: u8) -> u8 {
        let result = self.do_rol(val);
        self.do_and(result);
        result
    }

    fn do_lse(&mut self, val: u8) -> u8 {
        let result = self.do_lsr(val);
        self.do_eor(result);
        result
    }

    fn do_rra(&mut self, val: u8) -> u8 {
        let result = self.do_ror(val);
        self.do_adc(result);
        result
    }

    fn do_dcm(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.do_cmp(result);
        result
    }

    fn do_ins(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.do_sbc(result);
        result
    }

    fn do_lax(&mut self, val: u8) {
        self.regs.x = val;
        self.do_lda(val);
    }

    fn do_anc(&mut self, val: u8) {
        self.do_and(val);
        self.regs.p.set_if(C, self.regs.a & 0x80 != 0);
    }

    fn do_alr(&mut self, val: u8) {
        self.regs.a &= val;
        self.regs.a = self.do_lsr(self.regs.a);
    }

    /// AND then ROR, with the carry and overflow taken from the AND result
    /// and, in decimal mode, a BCD fix-up of the rotated value.
    fn do_arr(&mut self, val: u8) {
        let data = self.regs.a & val;
        let mut a = (data >> 1) | (self.regs.p.carry() << 7);
        self.regs.p.update_nz(a);
        self.regs.p.set_if(V, (a ^ data) & 0x40 != 0);
        if self.decimal_mode() {
            if (data & 0x0F) + (data & 0x01) > 5 {
                a = (a & 0xF0) | (a.wrapping_add(6) & 0x0F);
            }
            let fix = u16::from(data & 0xF0) + u16::from(data & 0x10) > 0x50;
            if fix {
                a = a.wrapping_add(0x60);
            }
            self.regs.p.set_if(C, fix);
        } else {
            self.regs.p.set_if(C, data & 0x80 != 0);
        }
        self.regs.a = a;
    }

    fn do_ane(&mut self, val: u8) {
        self.regs.a &= self.regs.x;
        self.do_and(val);
    }

    fn do_anx(&mut self, val: u8) {
        self.regs.a &= val;
        self.do_ldx(self.regs.a);
    }

    fn do_sbx(&mut self, val: u8) {
        let ax = self.regs.a & self.regs.x;
        self.regs.p.set_if(C, ax >= val);
        self.do_ldx(ax.wrapping_sub(val));
    }

    fn do_las(&mut self, val: u8) {
        self.regs.s &= val;
        self.regs.x = self.regs.s;
        self.do_lda(self.regs.s);
    }
}

impl Cpu for Mos6502 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.halted = false;
        self.step_cycles = 0;
        let opcode = self.fetch(bus);
        self.charge(bus, u32::from(CYCLES[opcode as usize]));
        self.execute(bus, opcode);
        self.total_cycles += u64::from(self.step_cycles);
        self.step_cycles
    }

    /// Hardware IRQ: pushes PC and P with B clear, then jumps through $FFFE.
    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> bool {
        if self.regs.p.is_set(I) {
            return false;
        }
        let pc = self.regs.pc;
        self.push_word(bus, pc);
        let p = self.regs.p.to_byte_irq();
        self.push(bus, p);
        self.regs.p.set(I);
        self.regs.pc = Self::read_vector(bus, 0xFFFE);
        bus.tick(7);
        self.total_cycles += 7;
        true
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.halted
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.regs.p.0.into()),
            "flags.c" | "c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" | "z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" | "i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" | "d" => Some(self.regs.p.is_set(D).into()),
            "flags.v" | "v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" | "n" => Some(self.regs.p.is_set(N).into()),
            "cycles" => Some(Value::String(self.total_cycles.to_string())),
            "halted" => Some(self.halted.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "s", "p", "flags.c", "flags.z", "flags.i", "flags.d", "flags.v",
            "flags.n", "cycles", "halted",
        ]
    }
}
