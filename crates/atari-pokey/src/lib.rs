//! Atari POKEY sound emulator.
//!
//! Register writes arrive stamped with the CPU cycle at which they happen.
//! Each chip turns them into a buffer of output level changes ("deltas")
//! indexed by output sample, and [`PokeyPair`] integrates those deltas
//! through a leaky integrator into PCM at 44.1 kHz. One frame at a time:
//! [`PokeyPair::start_frame`], register writes, [`PokeyPair::end_frame`],
//! then [`PokeyPair::generate`] until the frame's samples are used up.
//!
//! # Register map (write, $D200-$D20F)
//!
//! | Addr | Register |
//! |------|----------|
//! | $00  | AUDF1    |
//! | $01  | AUDC1    |
//! | $02  | AUDF2    |
//! | $03  | AUDC2    |
//! | $04  | AUDF3    |
//! | $05  | AUDC3    |
//! | $06  | AUDF4    |
//! | $07  | AUDC4    |
//! | $08  | AUDCTL   |
//! | $09  | STIMER   |
//! | $0F  | SKCTL    |
//!
//! RANDOM ($0A) is the only read handled here.
//!
//! # AUDCTL
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 7   | 9-bit instead of 17-bit polynomial |
//! | 6   | channel 1 clocked at 1.79 MHz |
//! | 5   | channel 3 clocked at 1.79 MHz |
//! | 4   | channels 1+2 joined into 16 bits |
//! | 3   | channels 3+4 joined into 16 bits |
//! | 2   | high-pass channel 1 by channel 3 |
//! | 1   | high-pass channel 2 by channel 4 |
//! | 0   | 15 kHz base clock instead of 64 kHz |

mod channel;
mod chip;
mod pair;
mod poly;

pub use channel::Channel;
pub use chip::Pokey;
pub use pair::PokeyPair;
pub use poly::{POLY9_PERIOD, POLY17_PERIOD, PolyTables};

/// Timestamp of an event that never happens.
pub const NEVER: i32 = i32::MAX;

/// PAL Atari machine clock in Hz.
pub const PAL_CLOCK: u32 = 1_773_447;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Entries in each chip's delta buffer. One PAL frame is at most 885
/// samples, with room for writes landing a few cycles past the frame end.
pub const DELTA_BUFFER_LEN: usize = 888;

/// Shift from a 4-bit POKEY volume to delta units.
pub const DELTA_SHIFT_POKEY: u32 = 20;

/// Shift from the 1-bit console speaker level to delta units.
pub const DELTA_SHIFT_GTIA: u32 = 20;

/// Shift from an 8-bit COVOX sample to delta units.
pub const DELTA_SHIFT_COVOX: u32 = 17;

/// Pure tones with a period at or below this many cycles are inaudible and
/// are muted.
pub const ULTRASOUND_CYCLES: i32 = 112;

/// Mute reason: ultrasonic pure tone.
pub const MUTE_FREQUENCY: u8 = 1;

/// Mute reason: channel stopped by SKCTL initialization mode.
pub const MUTE_INIT: u8 = 2;

/// Mute reason: muted by the user.
pub const MUTE_USER: u8 = 4;

/// Output sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    U8,
    /// Signed 16-bit, little-endian.
    #[default]
    S16Le,
    /// Signed 16-bit, big-endian.
    S16Be,
}

impl SampleFormat {
    /// Bytes per sample of one channel.
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16Le | Self::S16Be => 2,
        }
    }

    /// Bits per sample.
    #[must_use]
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            Self::U8 => 8,
            Self::S16Le | Self::S16Be => 16,
        }
    }

    /// Encode a sample already clamped to ±32767.
    pub fn store(self, out: &mut [u8], sample: i32) {
        match self {
            Self::U8 => out[0] = ((sample >> 8) + 128) as u8,
            Self::S16Le => out[..2].copy_from_slice(&(sample as i16).to_le_bytes()),
            Self::S16Be => out[..2].copy_from_slice(&(sample as i16).to_be_bytes()),
        }
    }
}
