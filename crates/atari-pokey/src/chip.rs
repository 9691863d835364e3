//! A single POKEY chip.
//!
//! Channels are event driven: each armed channel knows the cycle of its
//! next divider underflow, and [`Pokey::generate`] walks those events in
//! order up to a target cycle, posting output changes into the delta
//! buffer. Every register write first brings the chip up to the cycle of
//! the write, so a change never affects events that happened before it.

use emu_core::{Observable, SampleClock, Value};
use log::trace;

use crate::channel::Channel;
use crate::poly::{POLY9_PERIOD, POLY17_PERIOD, PolyTables, poly4, poly5};
use crate::{DELTA_BUFFER_LEN, DELTA_SHIFT_POKEY, MUTE_INIT, MUTE_USER, NEVER, ULTRASOUND_CYCLES};

/// Starting phase of the polynomial counters: a common multiple of the
/// 4-, 5- and 17-bit periods, so `poly_index - channel` never goes negative.
const POLY_INDEX_START: i32 = 15 * 31 * POLY17_PERIOD;

/// One POKEY: four channels, their control registers and a delta buffer.
#[derive(Debug, Clone)]
pub struct Pokey {
    /// Channels 1-4.
    pub channels: [Channel; 4],
    /// AUDCTL.
    pub audctl: u8,
    /// SKCTL.
    pub skctl: u8,
    /// SKCTL bits 0-1 clear: prescalers and polynomial counters held.
    init: bool,
    /// 28 (64 kHz base clock) or 114 (15 kHz).
    div_cycles: i32,
    /// Phase of the polynomial counters at cycle 0 of the current frame.
    poly_index: i32,
    /// Output level changes, indexed by sample within the frame.
    delta_buffer: Box<[i32]>,
}

impl Default for Pokey {
    fn default() -> Self {
        Self::new()
    }
}

impl Pokey {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: [Channel::new(); 4],
            audctl: 0,
            skctl: 3,
            init: false,
            div_cycles: 28,
            poly_index: POLY_INDEX_START,
            delta_buffer: vec![0; DELTA_BUFFER_LEN].into_boxed_slice(),
        }
    }

    /// Return to power-on state.
    pub fn reset(&mut self) {
        self.channels = [Channel::new(); 4];
        self.audctl = 0;
        self.skctl = 3;
        self.init = false;
        self.div_cycles = 28;
        self.poly_index = POLY_INDEX_START;
        self.delta_buffer.fill(0);
    }

    /// True when every channel's volume is zero.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.channels.iter().all(|ch| ch.audc & 0x0F == 0)
    }

    /// True while SKCTL holds the chip in initialization mode.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        self.init
    }

    /// The delta buffer for the current frame.
    #[must_use]
    pub fn delta_buffer(&self) -> &[i32] {
        &self.delta_buffer
    }

    /// Add a level change at `cycle`.
    pub(crate) fn add_delta(&mut self, clock: &SampleClock, cycle: i32, delta: i32) {
        // Changes past the end of the buffer land in its last slot
        let index = clock.sample_at(cycle).min(DELTA_BUFFER_LEN - 1);
        self.delta_buffer[index] += delta;
    }

    /// Negate a channel's delta and post it.
    fn flip(&mut self, ch: usize, clock: &SampleClock, cycle: i32) {
        let delta = -self.channels[ch].delta;
        self.channels[ch].delta = delta;
        self.add_delta(clock, cycle, delta);
    }

    /// Divider underflow on channel `ch` at `cycle`.
    fn tick(&mut self, ch: usize, cycle: i32, tables: &PolyTables, clock: &SampleClock) {
        let channel = self.channels[ch];
        if self.init {
            // Polynomial counters are stopped; only pure tones keep toggling
            if channel.is_pure_tone() {
                self.channels[ch].out ^= 1;
                self.flip(ch, clock, cycle);
            }
            return;
        }

        let poly = cycle + self.poly_index - ch as i32;
        let poly9 = self.audctl & 0x80 != 0;
        let out = channel.out;
        let new_out = match channel.distortion() {
            // 5-bit gated 9/17-bit noise
            0 => {
                if poly5(poly) != 0 {
                    tables.bit(poly, poly9)
                } else {
                    out
                }
            }
            // 5-bit polynomial toggling
            2 | 6 => out ^ poly5(poly),
            // 5-bit gated 4-bit polynomial
            4 => {
                if poly5(poly) != 0 {
                    poly4(poly)
                } else {
                    out
                }
            }
            8 => tables.bit(poly, poly9),
            10 | 14 => out ^ 1,
            12 => poly4(poly),
            _ => out,
        };
        if new_out != out {
            self.channels[ch].out = new_out;
            self.flip(ch, clock, cycle);
        }
    }

    /// Process every channel event before `current_cycle`.
    pub fn generate(&mut self, tables: &PolyTables, clock: &SampleClock, current_cycle: i32) {
        loop {
            let cycle = self
                .channels
                .iter()
                .map(|ch| ch.tick_cycle)
                .fold(current_cycle, i32::min);
            if cycle == current_cycle {
                break;
            }

            if cycle == self.channels[2].tick_cycle {
                self.channels[2].tick_cycle += self.channels[2].period_cycles;
                // High-pass: channel 3 resets channel 1's output
                if self.audctl & 0x04 != 0
                    && self.channels[0].delta > 0
                    && self.channels[0].mute == 0
                {
                    self.flip(0, clock, cycle);
                }
                self.tick(2, cycle, tables, clock);
            }

            if cycle == self.channels[3].tick_cycle {
                self.channels[3].tick_cycle += self.channels[3].period_cycles;
                // 16-bit 3+4: channel 4's underflow reloads channel 3
                if self.audctl & 0x08 != 0 && self.channels[2].mute == 0 {
                    self.channels[2].tick_cycle = cycle + self.channels[2].reload_cycles;
                }
                // High-pass: channel 4 resets channel 2's output
                if self.audctl & 0x02 != 0
                    && self.channels[1].delta > 0
                    && self.channels[1].mute == 0
                {
                    self.flip(1, clock, cycle);
                }
                self.tick(3, cycle, tables, clock);
            }

            if cycle == self.channels[0].tick_cycle {
                self.channels[0].tick_cycle += self.channels[0].period_cycles;
                // Two-tone: channel 1 restarts channel 2 unless SKCTL bit 7 forces a break
                if self.skctl & 0x88 == 0x08 && self.channels[1].mute == 0 {
                    self.channels[1].tick_cycle = cycle + self.channels[1].period_cycles;
                }
                self.tick(0, cycle, tables, clock);
            }

            if cycle == self.channels[1].tick_cycle {
                self.channels[1].tick_cycle += self.channels[1].period_cycles;
                if self.channels[0].mute == 0 {
                    if self.audctl & 0x10 != 0 {
                        // 16-bit 1+2: channel 2's underflow reloads channel 1
                        self.channels[0].tick_cycle = cycle + self.channels[0].reload_cycles;
                    } else if self.skctl & 0x08 != 0 {
                        self.channels[0].tick_cycle = cycle + self.channels[0].period_cycles;
                    }
                }
                self.tick(1, cycle, tables, clock);
            }
        }
    }

    /// Recompute the periods of the pair starting at channel `low` (0 or 2)
    /// from AUDF and AUDCTL.
    fn update_pair(&mut self, low: usize, cycle: i32) {
        let (join_bit, fast_bit) = if low == 0 { (0x10, 0x40) } else { (0x08, 0x20) };
        let div = self.div_cycles;
        let f_lo = i32::from(self.channels[low].audf);
        let f_hi = i32::from(self.channels[low + 1].audf);

        let joined = self.audctl & join_bit != 0;
        let fast = self.audctl & fast_bit != 0;
        let (period_lo, period_hi, reload) = match (joined, fast) {
            (false, false) => (div * (f_lo + 1), div * (f_hi + 1), None),
            (true, false) => (div * 256, div * (f_lo + 256 * f_hi + 1), Some(div * (f_lo + 1))),
            (false, true) => (f_lo + 4, div * (f_hi + 1), None),
            (true, true) => (256, f_lo + 256 * f_hi + 7, Some(f_lo + 4)),
        };

        self.channels[low].period_cycles = period_lo;
        self.channels[low + 1].period_cycles = period_hi;
        if let Some(reload) = reload {
            self.channels[low].reload_cycles = reload;
        }
        for ch in low..low + 2 {
            self.channels[ch].update_ultrasound(cycle, ULTRASOUND_CYCLES);
        }
    }

    /// Mute channels that stop while the prescalers are held.
    fn update_init(&mut self, cycle: i32) {
        let stopped = [
            self.audctl & 0x40 == 0,
            self.audctl & 0x50 != 0x50,
            self.audctl & 0x20 == 0,
            self.audctl & 0x28 != 0x28,
        ];
        for (channel, stopped) in self.channels.iter_mut().zip(stopped) {
            channel.set_mute(self.init && stopped, MUTE_INIT, cycle);
        }
    }

    /// Write a register. Only the low nibble of `reg` is decoded, so the
    /// mirrors repeat every 16 bytes.
    pub fn write(
        &mut self,
        reg: u8,
        data: u8,
        cycle: i32,
        tables: &PolyTables,
        clock: &SampleClock,
    ) {
        let reg = reg & 0x0F;
        match reg {
            // AUDF1-4
            0x00 | 0x02 | 0x04 | 0x06 => {
                let ch = usize::from(reg >> 1);
                if data == self.channels[ch].audf {
                    return;
                }
                self.generate(tables, clock, cycle);
                self.channels[ch].audf = data;
                self.update_pair(ch & 2, cycle);
            }
            // AUDC1-4
            0x01 | 0x03 | 0x05 | 0x07 => {
                let ch = usize::from(reg >> 1);
                if data == self.channels[ch].audc {
                    return;
                }
                self.generate(tables, clock, cycle);
                self.write_audc(ch, data, cycle, clock);
            }
            // AUDCTL
            0x08 => {
                if data == self.audctl {
                    return;
                }
                self.generate(tables, clock, cycle);
                trace!("AUDCTL {:#04X} -> {data:#04X} at cycle {cycle}", self.audctl);
                self.audctl = data;
                self.div_cycles = if data & 0x01 != 0 { 114 } else { 28 };
                self.update_pair(0, cycle);
                self.update_pair(2, cycle);
                self.update_init(cycle);
            }
            // STIMER
            0x09 => {
                self.generate(tables, clock, cycle);
                for channel in &mut self.channels {
                    if channel.tick_cycle != NEVER {
                        channel.tick_cycle = cycle + channel.period_cycles;
                    }
                }
            }
            // SKCTL
            0x0F => {
                if data == self.skctl {
                    return;
                }
                self.generate(tables, clock, cycle);
                trace!("SKCTL {data:#04X} at cycle {cycle}");
                self.skctl = data;
                self.init = data & 0x03 == 0;
                self.update_init(cycle);
            }
            _ => {}
        }
    }

    fn write_audc(&mut self, ch: usize, data: u8, cycle: i32, clock: &SampleClock) {
        let volume = i32::from(data & 0x0F) << DELTA_SHIFT_POKEY;
        let channel = &mut self.channels[ch];
        channel.audc = data;
        let audible = channel.mute & MUTE_USER == 0;
        let old = channel.delta;

        if data & 0x10 != 0 {
            // Volume only: the output is held high at the new volume
            channel.delta = volume;
            if audible {
                let change = if old > 0 { volume - old } else { volume };
                self.add_delta(clock, cycle, change);
            }
        } else {
            channel.update_ultrasound(cycle, ULTRASOUND_CYCLES);
            if old > 0 {
                channel.delta = volume;
                if audible {
                    self.add_delta(clock, cycle, volume - old);
                }
            } else {
                channel.delta = -volume;
            }
        }
    }

    /// Apply the user mute mask (bit n = channel n+1).
    pub fn mute(&mut self, mask: u8, cycle: i32) {
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            channel.set_mute((mask >> ch) & 1 != 0, MUTE_USER, cycle);
        }
    }

    /// RANDOM register value at `cycle`.
    #[must_use]
    pub fn random(&self, tables: &PolyTables, cycle: i32) -> u8 {
        if self.init {
            return 0xFF;
        }
        tables.byte(cycle + self.poly_index, self.audctl & 0x80 != 0)
    }

    /// Bring the chip to `cycle_limit` and rebase every timestamp so the
    /// next frame starts at cycle 0.
    pub fn end_frame(&mut self, tables: &PolyTables, clock: &SampleClock, cycle_limit: i32) {
        self.generate(tables, clock, cycle_limit);
        self.poly_index += cycle_limit;
        let period = if self.audctl & 0x80 != 0 {
            15 * 31 * POLY9_PERIOD
        } else {
            POLY_INDEX_START
        };
        if self.poly_index >= 2 * period {
            self.poly_index -= period;
        }
        for channel in &mut self.channels {
            if channel.tick_cycle != NEVER {
                channel.tick_cycle -= cycle_limit;
            }
        }
    }

    /// Start a new frame. Deltas already posted past the `samples` of the
    /// previous frame move to the head of the buffer.
    pub fn start_frame(&mut self, samples: usize) {
        let len = self.delta_buffer.len();
        let carried = samples.min(len);
        self.delta_buffer.copy_within(carried.., 0);
        self.delta_buffer[len - carried..].fill(0);
    }
}

impl Observable for Pokey {
    fn query(&self, path: &str) -> Option<Value> {
        let channel = |n: &str| -> Option<&Channel> {
            let index: usize = n.parse().ok()?;
            self.channels.get(index.checked_sub(1)?)
        };
        match path {
            "audctl" => Some(self.audctl.into()),
            "skctl" => Some(self.skctl.into()),
            "init" => Some(self.init.into()),
            "silent" => Some(self.is_silent().into()),
            _ => {
                if let Some(n) = path.strip_prefix("audf") {
                    channel(n).map(|ch| ch.audf.into())
                } else if let Some(n) = path.strip_prefix("audc") {
                    channel(n).map(|ch| ch.audc.into())
                } else if let Some(n) = path.strip_prefix("tick") {
                    channel(n).map(|ch| ch.tick_cycle.into())
                } else if let Some(n) = path.strip_prefix("period") {
                    channel(n).map(|ch| ch.period_cycles.into())
                } else {
                    None
                }
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "audctl", "skctl", "init", "silent", "audf1", "audf2", "audf3", "audf4", "audc1",
            "audc2", "audc3", "audc4", "tick1", "tick2", "tick3", "tick4", "period1", "period2",
            "period3", "period4",
        ]
    }
}
