//! Master clock and cycle-to-sample conversion.

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. Components may
/// run at divided rates, but everything derives from this frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal-derived CPU frequency in Hz (e.g. `1_773_447` for a PAL Atari).
    pub frequency_hz: u32,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u32) -> Self {
        Self { frequency_hz }
    }
}

/// Fixed-point converter from master clock cycles to output samples.
///
/// The clock rate is not a multiple of the sample rate, so each frame of
/// cycles covers a fractional number of samples. The fractional part is
/// carried over in `offset` (in units of `1 / frequency_hz` samples), which
/// keeps the long-run sample count exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleClock {
    clock: MasterClock,
    sample_rate: u32,
    offset: u32,
}

impl SampleClock {
    #[must_use]
    pub const fn new(clock: MasterClock, sample_rate: u32) -> Self {
        Self {
            clock,
            sample_rate,
            offset: 0,
        }
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub const fn clock(&self) -> MasterClock {
        self.clock
    }

    /// Fractional sample position at the start of the current frame.
    ///
    /// Always below `frequency_hz`.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Restart at sample position zero.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Sample index within the current frame that `cycle` falls on.
    ///
    /// Negative cycles map to sample zero.
    #[must_use]
    pub fn sample_at(&self, cycle: i32) -> usize {
        let scaled = i64::from(cycle) * i64::from(self.sample_rate) + i64::from(self.offset);
        (scaled / i64::from(self.clock.frequency_hz)).max(0) as usize
    }

    /// Close a frame of `cycles` and return the whole samples it produced.
    pub fn end_frame(&mut self, cycles: i32) -> usize {
        let freq = u64::from(self.clock.frequency_hz);
        let cycles = u64::try_from(cycles).unwrap_or(0);
        let total = u64::from(self.offset) + cycles * u64::from(self.sample_rate);
        self.offset = (total % freq) as u32;
        (total / freq) as usize
    }
}
