//! The base POKEY plus the optional second chip of stereo modules.

use emu_core::{MasterClock, Observable, SampleClock, Value};
use log::debug;

use crate::{PAL_CLOCK, PolyTables, Pokey, SAMPLE_RATE, SampleFormat};

/// Largest sample magnitude produced.
const SAMPLE_LIMIT: i32 = 32_767;

/// Leaky integrator turning delta sums into a sample.
///
/// The accumulator loses 3/1024 of itself per sample, so a step in level
/// decays back towards zero with a time constant of about 340 samples.
fn integrate(acc: &mut i64, delta: i32) -> i32 {
    *acc += i64::from(delta) - ((*acc * 3) >> 10);
    (*acc >> 10).clamp(-i64::from(SAMPLE_LIMIT), i64::from(SAMPLE_LIMIT)) as i32
}

/// Two POKEYs sharing a sample clock.
///
/// In mono mode only the base chip is audible and every register address
/// reaches it. In stereo mode address bit 4 selects the extra chip, which
/// feeds the right channel.
#[derive(Debug, Clone)]
pub struct PokeyPair {
    /// Left (or only) chip, at $D200.
    pub base: Pokey,
    /// Right chip, at $D210.
    pub extra: Pokey,
    tables: PolyTables,
    clock: SampleClock,
    /// `0x10` in stereo mode, otherwise 0.
    extra_mask: u16,
    /// Samples produced by the last finished frame.
    samples: usize,
    /// Samples of that frame already delivered.
    sample_index: usize,
    iir_left: i64,
    iir_right: i64,
}

impl Default for PokeyPair {
    fn default() -> Self {
        Self::new()
    }
}

impl PokeyPair {
    /// Create a mono pair running at PAL speed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Pokey::new(),
            extra: Pokey::new(),
            tables: PolyTables::new(),
            clock: SampleClock::new(MasterClock::new(PAL_CLOCK), SAMPLE_RATE),
            extra_mask: 0,
            samples: 0,
            sample_index: 0,
            iir_left: 0,
            iir_right: 0,
        }
    }

    /// Reset both chips, the sample clock and the filter state.
    pub fn initialize(&mut self, stereo: bool) {
        debug!("POKEY initialize ({})", if stereo { "stereo" } else { "mono" });
        self.base.reset();
        self.extra.reset();
        self.clock.reset();
        self.extra_mask = if stereo { 0x10 } else { 0 };
        self.samples = 0;
        self.sample_index = 0;
        self.iir_left = 0;
        self.iir_right = 0;
    }

    #[must_use]
    pub const fn is_stereo(&self) -> bool {
        self.extra_mask != 0
    }

    /// Output channels: 1 or 2.
    #[must_use]
    pub const fn channels(&self) -> usize {
        if self.is_stereo() { 2 } else { 1 }
    }

    /// Address bit selecting the extra chip (0 in mono mode).
    #[must_use]
    pub const fn extra_mask(&self) -> u16 {
        self.extra_mask
    }

    #[must_use]
    pub const fn clock(&self) -> &SampleClock {
        &self.clock
    }

    #[must_use]
    pub const fn tables(&self) -> &PolyTables {
        &self.tables
    }

    /// Chip a register address belongs to.
    #[must_use]
    pub fn chip(&self, addr: u16) -> &Pokey {
        if addr & self.extra_mask != 0 {
            &self.extra
        } else {
            &self.base
        }
    }

    /// Write a POKEY register at `cycle`.
    pub fn write(&mut self, addr: u16, data: u8, cycle: i32) {
        let chip = if addr & self.extra_mask != 0 {
            &mut self.extra
        } else {
            &mut self.base
        };
        chip.write(addr as u8, data, cycle, &self.tables, &self.clock);
    }

    /// Read RANDOM at `cycle`.
    #[must_use]
    pub fn random(&self, addr: u16, cycle: i32) -> u8 {
        self.chip(addr).random(&self.tables, cycle)
    }

    /// Post a level change from another sound source (console speaker,
    /// COVOX) into the left or right delta buffer.
    pub fn add_delta(&mut self, right: bool, cycle: i32, delta: i32) {
        let chip = if right { &mut self.extra } else { &mut self.base };
        chip.add_delta(&self.clock, cycle, delta);
    }

    /// Mute channels: bits 0-3 for the base chip, 4-7 for the extra chip.
    /// Unmuted channels restart at `cycle`.
    pub fn mute(&mut self, mask: u8, cycle: i32) {
        self.base.mute(mask & 0x0F, cycle);
        self.extra.mute(mask >> 4, cycle);
    }

    /// True when no channel of either chip has a volume.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.base.is_silent() && self.extra.is_silent()
    }

    /// Prepare the delta buffers for a new frame.
    pub fn start_frame(&mut self) {
        self.base.start_frame(self.samples);
        self.extra.start_frame(self.samples);
    }

    /// Finish a frame of `cycle_limit` cycles. Its samples become available
    /// to [`PokeyPair::generate`].
    pub fn end_frame(&mut self, cycle_limit: i32) {
        self.base.end_frame(&self.tables, &self.clock, cycle_limit);
        if self.is_stereo() {
            self.extra.end_frame(&self.tables, &self.clock, cycle_limit);
        }
        self.samples = self.clock.end_frame(cycle_limit);
        self.sample_index = 0;
    }

    /// Samples in the last finished frame.
    #[must_use]
    pub const fn samples(&self) -> usize {
        self.samples
    }

    /// Samples of the last finished frame not yet generated.
    #[must_use]
    pub const fn remaining_blocks(&self) -> usize {
        self.samples - self.sample_index
    }

    /// Write up to `blocks` blocks (one sample per output channel) to the
    /// start of `buffer`. Returns the blocks written, limited by the
    /// frame's remaining samples and by the buffer size.
    pub fn generate(&mut self, buffer: &mut [u8], blocks: usize, format: SampleFormat) -> usize {
        let width = format.bytes_per_sample();
        let block_size = width * self.channels();
        let blocks = blocks
            .min(self.remaining_blocks())
            .min(buffer.len() / block_size);

        for (i, block) in buffer.chunks_exact_mut(block_size).take(blocks).enumerate() {
            let index = self.sample_index + i;
            let left = integrate(&mut self.iir_left, self.base.delta_buffer()[index]);
            format.store(&mut block[..width], left);
            if self.extra_mask != 0 {
                let right = integrate(&mut self.iir_right, self.extra.delta_buffer()[index]);
                format.store(&mut block[width..], right);
            }
        }
        self.sample_index += blocks;
        blocks
    }

    /// Advance the filter by up to `blocks` samples without producing
    /// output. Returns the blocks skipped.
    pub fn skip(&mut self, blocks: usize) -> usize {
        let blocks = blocks.min(self.remaining_blocks());
        for index in self.sample_index..self.sample_index + blocks {
            integrate(&mut self.iir_left, self.base.delta_buffer()[index]);
            if self.extra_mask != 0 {
                integrate(&mut self.iir_right, self.extra.delta_buffer()[index]);
            }
        }
        self.sample_index += blocks;
        blocks
    }
}

impl Observable for PokeyPair {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "stereo" => Some(self.is_stereo().into()),
            "samples" => Some((self.samples as u32).into()),
            "sample_index" => Some((self.sample_index as u32).into()),
            _ => match path.strip_prefix("extra.") {
                Some(rest) => self.extra.query(rest),
                None => self.base.query(path),
            },
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "stereo",
            "samples",
            "sample_index",
            "audctl",
            "skctl",
            "audf1",
            "audf2",
            "audf3",
            "audf4",
            "audc1",
            "audc2",
            "audc3",
            "audc4",
            "extra.audctl",
            "extra.skctl",
            "extra.audf1",
            "extra.audf2",
            "extra.audf3",
            "extra.audf4",
            "extra.audc1",
            "extra.audc2",
            "extra.audc3",
            "extra.audc4",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DELTA_SHIFT_POKEY;

    /// One PAL frame.
    const FRAME: i32 = 312 * 114;

    fn tone_pair(stereo: bool) -> PokeyPair {
        let mut pair = PokeyPair::new();
        pair.initialize(stereo);
        pair.mute(0, 0);
        pair.write(0x00, 0x20, 0);
        pair.write(0x01, 0xAF, 0);
        pair
    }

    #[test]
    fn integrator_settles_at_fixed_point() {
        let delta = 15 << 10;
        let mut acc = 0i64;
        let mut sample = 0;
        for _ in 0..5000 {
            sample = integrate(&mut acc, delta);
        }
        // acc converges to delta * 1024 / 3
        assert!((sample - delta / 3).abs() <= 1, "sample {sample}");
    }

    #[test]
    fn integrator_clamps() {
        let mut acc = 0i64;
        assert_eq!(integrate(&mut acc, 60 << DELTA_SHIFT_POKEY), SAMPLE_LIMIT);
        let mut acc = 0i64;
        assert_eq!(integrate(&mut acc, -(60 << DELTA_SHIFT_POKEY)), -SAMPLE_LIMIT);
    }

    #[test]
    fn frame_produces_its_samples() {
        let mut pair = tone_pair(false);
        pair.start_frame();
        pair.end_frame(FRAME);
        assert_eq!(pair.samples(), 884);

        let mut buffer = vec![0u8; 2000];
        assert_eq!(pair.generate(&mut buffer, 500, SampleFormat::S16Le), 500);
        assert_eq!(pair.generate(&mut buffer, 500, SampleFormat::S16Le), 384);
        assert_eq!(pair.generate(&mut buffer, 500, SampleFormat::S16Le), 0);
    }

    #[test]
    fn generate_respects_buffer_size() {
        let mut pair = tone_pair(true);
        pair.start_frame();
        pair.end_frame(FRAME);
        let mut buffer = vec![0u8; 10];
        // 4 bytes per stereo 16-bit block
        assert_eq!(pair.generate(&mut buffer, 100, SampleFormat::S16Le), 2);
    }

    #[test]
    fn endian_formats_are_byte_swapped() {
        let mut le = tone_pair(false);
        let mut be = tone_pair(false);
        let mut u8s = tone_pair(false);
        for pair in [&mut le, &mut be, &mut u8s] {
            pair.start_frame();
            pair.end_frame(FRAME);
        }

        let mut le_buf = vec![0u8; 884 * 2];
        let mut be_buf = vec![0u8; 884 * 2];
        let mut u8_buf = vec![0u8; 884];
        le.generate(&mut le_buf, 884, SampleFormat::S16Le);
        be.generate(&mut be_buf, 884, SampleFormat::S16Be);
        u8s.generate(&mut u8_buf, 884, SampleFormat::U8);

        for ((l, b), u) in le_buf.chunks(2).zip(be_buf.chunks(2)).zip(&u8_buf) {
            assert_eq!([l[1], l[0]], [b[0], b[1]]);
            let sample = i32::from(i16::from_le_bytes([l[0], l[1]]));
            assert_eq!(i32::from(*u), (sample >> 8) + 128);
        }
        assert!(le_buf.iter().any(|&b| b != 0), "tone should be audible");
    }

    #[test]
    fn skip_matches_generate() {
        let mut played = tone_pair(false);
        let mut skipped = tone_pair(false);
        let mut buffer = vec![0u8; 884 * 2];
        for _ in 0..3 {
            for pair in [&mut played, &mut skipped] {
                pair.start_frame();
                pair.end_frame(FRAME);
            }
            played.generate(&mut buffer, 884, SampleFormat::S16Le);
            skipped.skip(884);
        }

        let mut a = vec![0u8; 100];
        let mut b = vec![0u8; 100];
        for pair in [&mut played, &mut skipped] {
            pair.start_frame();
            pair.end_frame(FRAME);
        }
        played.generate(&mut a, 50, SampleFormat::S16Le);
        skipped.generate(&mut b, 50, SampleFormat::S16Le);
        assert_eq!(a, b);
    }

    #[test]
    fn stereo_routes_by_address_bit() {
        let mut pair = PokeyPair::new();
        pair.initialize(true);
        pair.write(0x10, 0x55, 0);
        assert_eq!(pair.extra.channels[0].audf, 0x55);
        assert_eq!(pair.base.channels[0].audf, 0);

        pair.initialize(false);
        pair.write(0x10, 0x55, 0);
        assert_eq!(pair.base.channels[0].audf, 0x55, "mono mirrors every 16 bytes");
    }

    #[test]
    fn high_mirrors_reach_the_addressed_chip() {
        let mut pair = PokeyPair::new();
        pair.initialize(true);
        pair.write(0xF3, 0xAF, 0);
        pair.write(0xE2, 0x40, 0);
        assert_eq!(pair.extra.channels[1].audc, 0xAF);
        assert_eq!(pair.base.channels[1].audf, 0x40);

        pair.initialize(false);
        pair.write(0xF3, 0xAF, 0);
        assert_eq!(pair.base.channels[1].audc, 0xAF);
    }

    #[test]
    fn silence_follows_volumes() {
        let mut pair = PokeyPair::new();
        pair.initialize(true);
        assert!(pair.is_silent());
        pair.write(0x13, 0x01, 0);
        assert!(!pair.is_silent());
        pair.write(0x13, 0xF0, 0);
        assert!(pair.is_silent(), "distortion without volume is silent");
    }

    #[test]
    fn observable_paths() {
        let mut pair = PokeyPair::new();
        pair.initialize(true);
        pair.write(0x18, 0x28, 0);
        assert_eq!(pair.query("extra.audctl"), Some(Value::U8(0x28)));
        assert_eq!(pair.query("audctl"), Some(Value::U8(0)));
        for path in pair.query_paths() {
            assert!(pair.query(path).is_some(), "{path} should resolve");
        }
    }
}
