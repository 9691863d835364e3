//! The 6502 and the Atari bus, run a scanline at a time.
//!
//! # Scanline loop
//!
//! Each iteration:
//! 1. If an event is due: close the scanline (advance VCOUNT, charge the
//!    9 cycles of DMA, stop after the last one), expire POKEY timers, take
//!    a pending IRQ if interrupts are enabled
//! 2. Execute one instruction
//! 3. After CLI, PLP or RTI, take a pending IRQ; after a CIM, skip to the
//!    end of the call

use emu_core::{Bus, Cpu};
use log::trace;
use mos_6502::{Mos6502, Registers, Status};

use crate::bus::{AtariBus, DMA_STEAL_CYCLES, SCANLINE_CYCLES, SCANLINES_PER_FRAME};

/// Opcodes that may unmask interrupts.
const CLI: u8 = 0x58;
const PLP: u8 = 0x28;
const RTI: u8 = 0x40;

/// A subroutine called by [`Machine::prepare_call`] returns to this CIM.
const RETURN_ADDR: u16 = 0xD20A;

/// CIM opcode placed at [`RETURN_ADDR`].
const CIM: u8 = 0xD2;

/// CPU plus bus.
pub struct Machine {
    pub cpu: Mos6502,
    pub bus: AtariBus,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: Mos6502::new(),
            bus: AtariBus::new(),
        }
    }

    /// Reset devices and registers for a new song. Memory is kept.
    pub fn reset(&mut self, stereo: bool, covox_addr: Option<u16>) {
        self.bus.reset(stereo, covox_addr);
        self.cpu = Mos6502::new();
        self.cpu.regs = Registers {
            p: Status::new(),
            ..Registers::new()
        };
    }

    fn check_irq(&mut self) {
        if self.bus.irqst != 0xFF && self.cpu.interrupt(&mut self.bus) {
            trace!(
                "IRQ at cycle {}, IRQST {:02X}",
                self.bus.cycle,
                self.bus.irqst
            );
        }
    }

    /// Run `scanlines` scanlines of 114 cycles, or fewer if the CPU hits a
    /// CIM. Cycle stamps are rebased so the next call starts near cycle 0.
    pub fn run_scanlines(&mut self, scanlines: i32) {
        let cycle_limit = SCANLINE_CYCLES * scanlines;
        let mut remaining = scanlines;
        self.bus.next_scanline_cycle = SCANLINE_CYCLES;
        self.bus.nearest_event_cycle = self
            .bus
            .timer_cycles
            .iter()
            .fold(SCANLINE_CYCLES, |nearest, &t| nearest.min(t));

        loop {
            if self.bus.cycle >= self.bus.nearest_event_cycle {
                if self.bus.cycle >= self.bus.next_scanline_cycle {
                    self.bus.scanline_number = (self.bus.scanline_number + 1) % SCANLINES_PER_FRAME;
                    self.bus.cycle += DMA_STEAL_CYCLES;
                    self.bus.next_scanline_cycle += SCANLINE_CYCLES;
                    remaining -= 1;
                    if remaining <= 0 {
                        break;
                    }
                }
                self.bus.expire_timers();
                self.check_irq();
            }

            let opcode = self.bus.peek(self.cpu.regs.pc);
            self.cpu.step(&mut self.bus);
            if self.cpu.is_halted() {
                // The rest of the call passes with the CPU jammed
                self.bus.scanline_number =
                    (self.bus.scanline_number + remaining - 1) % SCANLINES_PER_FRAME;
                remaining = 1;
                self.bus.cycle = cycle_limit;
            } else if matches!(opcode, CLI | PLP | RTI) {
                self.check_irq();
            }
        }

        self.bus.rebase(cycle_limit);
    }

    /// Point the CPU at the subroutine `addr` with a return address on the
    /// stack that leads to a CIM.
    pub fn prepare_call(&mut self, addr: u16) {
        self.cpu.regs.pc = addr;
        self.bus.poke(RETURN_ADDR, CIM);
        let [lo, hi] = (RETURN_ADDR - 1).to_le_bytes();
        self.bus.poke(0x01FE, lo);
        self.bus.poke(0x01FF, hi);
        self.cpu.regs.s = 0xFD;
    }

    /// Call the subroutine at `addr` for at most `max_scanlines`.
    pub fn call(&mut self, addr: u16, max_scanlines: i32) {
        self.prepare_call(addr);
        self.run_scanlines(max_scanlines);
    }

    /// Push the interrupted state and a return stub, then enter the type D
    /// player at `player` as if it were an interrupt handler.
    pub fn enter_interrupt_player(&mut self, player: u16, stub: u16) {
        const STUB: [u8; 6] = [
            0x68, // PLA
            0xA8, // TAY
            0x68, // PLA
            0xAA, // TAX
            0x68, // PLA
            0x40, // RTI
        ];
        let regs = self.cpu.regs;
        let [pc_lo, pc_hi] = regs.pc.to_le_bytes();
        let [ret_lo, ret_hi] = (stub - 1).to_le_bytes();
        let mut s = regs.s;
        for byte in [pc_hi, pc_lo, regs.p.to_byte_irq(), regs.a, regs.x, regs.y, ret_hi, ret_lo] {
            self.bus.poke(0x0100 | u16::from(s), byte);
            s = s.wrapping_sub(1);
        }
        self.cpu.regs.s = s;
        for (offset, &byte) in STUB.iter().enumerate() {
            self.bus.poke(stub + offset as u16, byte);
        }
        self.cpu.regs.pc = player;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atari_pokey::NEVER;

    fn machine_with(addr: u16, program: &[u8]) -> Machine {
        let mut m = Machine::new();
        m.reset(false, None);
        let start = usize::from(addr);
        m.bus.memory_mut()[start..start + program.len()].copy_from_slice(program);
        m
    }

    #[test]
    fn subroutine_returns_to_cim() {
        // LDA #$42; STA $80; RTS
        let mut m = machine_with(0x2000, &[0xA9, 0x42, 0x85, 0x80, 0x60]);
        m.call(0x2000, 312);
        assert_eq!(m.bus.peek(0x80), 0x42);
        assert!(m.cpu.is_halted());
        assert_eq!(m.cpu.regs.pc, RETURN_ADDR);
        assert_eq!(m.bus.scanline_number, 0, "a full frame passed");
        assert_eq!(m.bus.cycle, DMA_STEAL_CYCLES);
    }

    #[test]
    fn cim_skips_remaining_scanlines() {
        let mut m = machine_with(0x2000, &[0x60]);
        m.call(0x2000, 100);
        assert_eq!(m.bus.scanline_number, 100);
        m.call(0x2000, 300);
        assert_eq!(m.bus.scanline_number, 88);
    }

    #[test]
    fn endless_loop_runs_the_requested_scanlines() {
        // JMP $2000
        let mut m = machine_with(0x2000, &[0x4C, 0x00, 0x20]);
        m.cpu.regs.pc = 0x2000;
        m.run_scanlines(10);
        assert_eq!(m.bus.scanline_number, 10);
        assert!(!m.cpu.is_halted());
        // Overshoot is at most one instruction past the last DMA steal
        assert!((DMA_STEAL_CYCLES..DMA_STEAL_CYCLES + 3).contains(&m.bus.cycle));
    }

    #[test]
    fn vcount_advances_every_two_scanlines() {
        // LDA $D40B; STA $80; JMP $2000
        let mut m = machine_with(0x2000, &[0xAD, 0x0B, 0xD4, 0x85, 0x80, 0x4C, 0x00, 0x20]);
        m.cpu.regs.pc = 0x2000;
        m.run_scanlines(21);
        assert_eq!(m.bus.peek(0x80), 10);
    }

    #[test]
    fn wsync_allows_one_iteration_per_scanline() {
        // STA $D40A; INC $80; JMP $2000
        let mut m = machine_with(0x2000, &[0x8D, 0x0A, 0xD4, 0xE6, 0x80, 0x4C, 0x00, 0x20]);
        m.cpu.regs.pc = 0x2000;
        m.run_scanlines(10);
        assert_eq!(m.bus.peek(0x80), 10);
    }

    #[test]
    fn timer_interrupt_is_taken() {
        // INC $81; LDA #0; STA $D20E; LDA #1; STA $D20E; RTI
        let handler = [
            0xE6, 0x81, 0xA9, 0x00, 0x8D, 0x0E, 0xD2, 0xA9, 0x01, 0x8D, 0x0E, 0xD2, 0x40,
        ];
        // CLI; JMP $2001
        let mut m = machine_with(0x2000, &[0x58, 0x4C, 0x01, 0x20]);
        let start = 0x3000;
        m.bus.memory_mut()[start..start + handler.len()].copy_from_slice(&handler);
        m.bus.poke(0xFFFE, 0x00);
        m.bus.poke(0xFFFF, 0x30);

        // Timer 1 every 28 * 256 cycles, first underflow at cycle 0
        m.bus.pokeys.mute(0, 0);
        m.bus.write(0xD200, 0xFF);
        m.bus.write(0xD20E, 0x01);
        assert_ne!(m.bus.timer_cycles[0], NEVER);

        m.cpu.regs.pc = 0x2000;
        m.run_scanlines(SCANLINES_PER_FRAME);
        // 35568 cycles in the frame
        let count = m.bus.peek(0x81);
        assert!((4..=5).contains(&count), "{count} interrupts");
    }
}
