//! Atari bus: 64K of RAM with POKEY, the POKEY timer interrupts, WSYNC,
//! VCOUNT, the console speaker and the COVOX DAC mapped in.
//!
//! Only addresses with `(addr & $F900) == $D000` are decoded; the rest of
//! the address space, including the I/O pages for opcode fetches and stack
//! traffic, is plain RAM.

use atari_pokey::{DELTA_SHIFT_COVOX, DELTA_SHIFT_GTIA, NEVER, PokeyPair};
use emu_core::Bus;
use log::trace;

/// CPU cycles per scanline.
pub const SCANLINE_CYCLES: i32 = 114;

/// Scanlines per PAL frame.
pub const SCANLINES_PER_FRAME: i32 = 312;

/// Cycles ANTIC steals at the end of every scanline.
pub const DMA_STEAL_CYCLES: i32 = 9;

/// Timer interrupts: IRQST/IRQEN bit and the POKEY channel that drives it.
const TIMERS: [(u8, usize); 3] = [(0x01, 0), (0x02, 1), (0x04, 3)];

/// The machine's memory map and the devices on it.
///
/// The bus owns the cycle counter. The CPU advances it with [`Bus::tick`];
/// the scanline driver rebases it at the end of every call.
pub struct AtariBus {
    memory: Box<[u8; 0x10000]>,
    /// Base POKEY at `$D200` and, in stereo mode, the extra one at `$D210`.
    pub pokeys: PokeyPair,
    /// Cycle within the current call of the scanline driver.
    pub cycle: i32,
    /// Cycle at which the current scanline ends.
    pub next_scanline_cycle: i32,
    /// Earliest pending event: scanline end or timer expiry.
    pub nearest_event_cycle: i32,
    /// Scanline within the frame, 0-311.
    pub scanline_number: i32,
    /// Pending interrupts, active low.
    pub irqst: u8,
    /// Expiry cycle of timers 1, 2 and 4, or [`NEVER`].
    pub timer_cycles: [i32; 3],
    /// Console speaker bit (`$D01F` bit 3).
    consol: u8,
    /// Last value written to each COVOX channel.
    covox: [u8; 4],
    /// Page the COVOX DAC is decoded at.
    covox_page: Option<u16>,
}

impl Default for AtariBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AtariBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x10000]),
            pokeys: PokeyPair::new(),
            cycle: 0,
            next_scanline_cycle: 0,
            nearest_event_cycle: 0,
            scanline_number: 0,
            irqst: 0xFF,
            timer_cycles: [NEVER; 3],
            consol: 8,
            covox: [0x80; 4],
            covox_page: None,
        }
    }

    /// Return every device to its state at the start of a song.
    pub fn reset(&mut self, stereo: bool, covox_addr: Option<u16>) {
        self.pokeys.initialize(stereo);
        self.cycle = 0;
        self.next_scanline_cycle = 0;
        self.nearest_event_cycle = 0;
        self.scanline_number = 0;
        self.irqst = 0xFF;
        self.timer_cycles = [NEVER; 3];
        self.consol = 8;
        self.covox = [0x80; 4];
        self.covox_page = covox_addr.map(|addr| addr & 0xFF00);
    }

    #[must_use]
    pub fn memory(&self) -> &[u8; 0x10000] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8; 0x10000] {
        &mut self.memory
    }

    /// Read a hardware register.
    fn io_read(&self, addr: u16) -> u8 {
        match addr & 0xFF0F {
            0xD20A => self.pokeys.random(addr, self.cycle),
            0xD20E => {
                // The extra POKEY raises no interrupts
                if addr & self.pokeys.extra_mask() != 0 {
                    0xFF
                } else {
                    self.irqst
                }
            }
            0xD20F => 0xFF,
            0xD40B => (self.scanline_number >> 1) as u8,
            _ => self.memory[usize::from(addr)],
        }
    }

    /// Write a hardware register.
    fn io_write(&mut self, addr: u16, data: u8) {
        if addr >> 8 == 0xD2 {
            if addr & (self.pokeys.extra_mask() + 0x0F) == 0x0E {
                self.write_irqen(data);
            } else {
                self.pokeys.write(addr, data, self.cycle);
            }
        } else if addr & 0xFF0F == 0xD40A {
            self.wsync();
        } else if self.covox_page == Some(addr & 0xFF00) {
            let channel = usize::from(addr & 3);
            let delta = (i32::from(data) - i32::from(self.covox[channel])) << DELTA_SHIFT_COVOX;
            // Channels 0 and 3 are left, 1 and 2 right
            self.pokeys
                .add_delta(channel == 1 || channel == 2, self.cycle, delta);
            self.covox[channel] = data;
        } else if addr & 0xFF1F == 0xD01F {
            let data = data & 8;
            // Reversed polarity relative to POKEY
            let delta = (i32::from(self.consol) - i32::from(data)) << DELTA_SHIFT_GTIA;
            self.consol = data;
            self.pokeys.add_delta(false, self.cycle, delta);
            self.pokeys.add_delta(true, self.cycle, delta);
        } else {
            self.memory[usize::from(addr)] = data;
        }
    }

    /// IRQEN: acknowledge disabled interrupts and arm the enabled timers
    /// at the next underflow of their channel.
    fn write_irqen(&mut self, data: u8) {
        self.irqst |= data ^ 0xFF;
        for (timer, &(bit, ch)) in TIMERS.iter().enumerate() {
            if data & self.irqst & bit == 0 {
                self.timer_cycles[timer] = NEVER;
                continue;
            }
            if self.timer_cycles[timer] != NEVER {
                continue;
            }
            let channel = &self.pokeys.base.channels[ch];
            let mut t = channel.tick_cycle;
            if t < self.cycle {
                let period = channel.period_cycles;
                t += (self.cycle - t + period - 1) / period * period;
            }
            trace!("Timer {bit} armed for cycle {t}");
            self.timer_cycles[timer] = t;
            self.nearest_event_cycle = self.nearest_event_cycle.min(t);
        }
    }

    /// WSYNC: halt the CPU until the horizontal blank.
    fn wsync(&mut self) {
        self.cycle = if self.cycle <= self.next_scanline_cycle - 8 {
            self.next_scanline_cycle - 8
        } else {
            self.next_scanline_cycle + SCANLINE_CYCLES - 8
        };
    }

    /// Clear the IRQST bits of expired timers and recompute the nearest
    /// event.
    pub(crate) fn expire_timers(&mut self) {
        let mut next_event = self.next_scanline_cycle;
        for (timer, &(bit, _)) in TIMERS.iter().enumerate() {
            let t = self.timer_cycles[timer];
            if self.cycle >= t {
                self.irqst &= !bit;
                self.timer_cycles[timer] = NEVER;
            } else {
                next_event = next_event.min(t);
            }
        }
        self.nearest_event_cycle = next_event;
    }

    /// Subtract `cycles` from every timestamp.
    pub(crate) fn rebase(&mut self, cycles: i32) {
        self.cycle -= cycles;
        for t in &mut self.timer_cycles {
            if *t != NEVER {
                *t -= cycles;
            }
        }
    }
}

/// True for addresses the hardware decodes.
const fn is_io(addr: u16) -> bool {
    addr & 0xF900 == 0xD000
}

impl Bus for AtariBus {
    fn read(&mut self, address: u16) -> u8 {
        if is_io(address) {
            self.io_read(address)
        } else {
            self.memory[usize::from(address)]
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if is_io(address) {
            self.io_write(address, value);
        } else {
            self.memory[usize::from(address)] = value;
        }
    }

    fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn poke(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }

    fn tick(&mut self, cycles: u32) {
        self.cycle += cycles as i32;
    }

    /// POKEY sees the read of a read-modify-write one cycle before the
    /// instruction's final cycle.
    fn read_rmw(&mut self, address: u16) -> u8 {
        if address >> 8 == 0xD2 {
            self.cycle -= 1;
            let data = self.io_read(address);
            self.cycle += 1;
            data
        } else {
            self.read(address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> AtariBus {
        let mut bus = AtariBus::new();
        bus.reset(false, None);
        bus
    }

    #[test]
    fn ram_outside_io() {
        let mut bus = bus();
        bus.write(0x1234, 0x56);
        assert_eq!(bus.read(0x1234), 0x56);
        // $D800 is not decoded
        bus.write(0xD800, 0x77);
        assert_eq!(bus.peek(0xD800), 0x77);
    }

    #[test]
    fn vcount_is_half_the_scanline() {
        let mut bus = bus();
        bus.scanline_number = 201;
        assert_eq!(bus.read(0xD40B), 100);
        assert_eq!(bus.read(0xD4FB), 100, "mirrored every 16 bytes");
    }

    #[test]
    fn skstat_reads_ff() {
        let mut bus = bus();
        assert_eq!(bus.read(0xD20F), 0xFF);
    }

    #[test]
    fn pokey_writes_reach_the_chip() {
        let mut bus = bus();
        bus.write(0xD200, 0x20);
        bus.write(0xD201, 0xAF);
        assert_eq!(bus.pokeys.base.channels[0].audf, 0x20);
        assert_eq!(bus.pokeys.base.channels[0].audc, 0xAF);
        // RAM under the register is untouched
        assert_eq!(bus.peek(0xD200), 0);
    }

    #[test]
    fn pokey_mirrors_repeat_across_the_page() {
        let mut bus = bus();
        bus.write(0xD210, 0x55);
        bus.write(0xD2F3, 0xAF);
        assert_eq!(bus.pokeys.base.channels[0].audf, 0x55);
        assert_eq!(bus.pokeys.base.channels[1].audc, 0xAF);

        let mut bus = AtariBus::new();
        bus.reset(true, None);
        bus.write(0xD211, 0xAF);
        bus.write(0xD2E0, 0x33);
        assert_eq!(bus.pokeys.extra.channels[0].audc, 0xAF);
        assert_eq!(bus.pokeys.base.channels[0].audf, 0x33);
    }

    #[test]
    fn wsync_waits_for_horizontal_blank() {
        let mut bus = bus();
        bus.next_scanline_cycle = 114;
        bus.cycle = 50;
        bus.write(0xD40A, 0);
        assert_eq!(bus.cycle, 106);

        bus.cycle = 110;
        bus.write(0xD40A, 0);
        assert_eq!(bus.cycle, 220);
    }

    #[test]
    fn irqen_arms_timer_on_channel_underflow() {
        let mut bus = bus();
        bus.pokeys.mute(0, 0);
        // Channel 1 period 28 * 0x20 cycles, armed at cycle 0
        bus.write(0xD200, 0x1F);
        bus.cycle = 1000;
        bus.write(0xD20E, 0x01);
        assert_eq!(bus.timer_cycles[0], 28 * 0x20 * 2);
        assert_eq!(bus.timer_cycles[1], NEVER);
        assert_eq!(bus.read(0xD20E), 0xFF);

        bus.cycle = bus.timer_cycles[0];
        bus.expire_timers();
        assert_eq!(bus.read(0xD20E), 0xFE, "timer 1 pending");
        assert_eq!(bus.timer_cycles[0], NEVER);

        // Disabling acknowledges
        bus.write(0xD20E, 0x00);
        assert_eq!(bus.read(0xD20E), 0xFF);
    }

    #[test]
    fn console_speaker_posts_to_both_chips() {
        let mut bus = AtariBus::new();
        bus.reset(true, None);
        bus.write(0xD01F, 0x00);
        let delta = 8 << DELTA_SHIFT_GTIA;
        assert_eq!(bus.pokeys.base.delta_buffer()[0], delta);
        assert_eq!(bus.pokeys.extra.delta_buffer()[0], delta);
        // Writing the same level again posts nothing
        bus.write(0xD01F, 0x00);
        assert_eq!(bus.pokeys.base.delta_buffer()[0], delta);
    }

    #[test]
    fn covox_channels_split_left_and_right() {
        let mut bus = AtariBus::new();
        bus.reset(true, Some(0xD600));
        bus.write(0xD600, 0x90);
        bus.write(0xD601, 0x70);
        assert_eq!(bus.pokeys.base.delta_buffer()[0], 0x10 << DELTA_SHIFT_COVOX);
        assert_eq!(
            bus.pokeys.extra.delta_buffer()[0],
            -(0x10 << DELTA_SHIFT_COVOX)
        );
    }

    #[test]
    fn covox_page_is_ram_when_absent() {
        let mut bus = bus();
        bus.write(0xD600, 0x90);
        assert_eq!(bus.peek(0xD600), 0x90);
    }

    #[test]
    fn rmw_reads_pokey_a_cycle_early() {
        let mut bus = bus();
        bus.cycle = 500;
        let early = bus.pokeys.random(0xD20A, 499);
        assert_eq!(bus.read_rmw(0xD20A), early);
        assert_eq!(bus.cycle, 500);
    }
}
