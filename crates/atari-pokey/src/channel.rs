//! One POKEY audio channel.

use crate::{MUTE_FREQUENCY, MUTE_USER, NEVER};

/// Timing and output state of one of the four channels.
///
/// `delta` carries both the channel's volume and its output level: the
/// magnitude is the volume shifted into delta units, and the sign tells
/// whether the channel is currently high (positive) or low. Toggling the
/// output negates it and posts the new value, so the running sum of posted
/// deltas is the channel's output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// AUDFx: frequency divider.
    pub audf: u8,
    /// AUDCx: distortion (bits 5-7), volume-only (bit 4), volume (bits 0-3).
    pub audc: u8,
    /// Cycle of the next divider underflow, or [`NEVER`] while muted.
    pub tick_cycle: i32,
    /// Cycles between underflows.
    pub period_cycles: i32,
    /// Cycles after a linked channel's underflow until this one's first
    /// underflow. Only used for channels 1 and 3, the low halves of the
    /// 16-bit pairs.
    pub reload_cycles: i32,
    /// Current output bit.
    pub out: u8,
    /// Signed contribution; see the type documentation.
    pub delta: i32,
    /// Reasons this channel is muted (`MUTE_*` bits).
    pub mute: u8,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            audf: 0,
            audc: 0,
            tick_cycle: NEVER,
            period_cycles: 28,
            reload_cycles: 28,
            out: 0,
            delta: 0,
            mute: MUTE_FREQUENCY | MUTE_USER,
        }
    }

    /// Distortion selector: the upper nibble of AUDC.
    #[must_use]
    pub const fn distortion(&self) -> u8 {
        self.audc >> 4
    }

    /// Pure tone modes (no polynomial counter involved).
    #[must_use]
    pub const fn is_pure_tone(&self) -> bool {
        matches!(self.distortion(), 10 | 14)
    }

    /// Set or clear one mute reason.
    ///
    /// Muting disarms the channel. When the last reason goes away the
    /// channel is re-armed at `cycle`.
    pub fn set_mute(&mut self, muted: bool, mask: u8, cycle: i32) {
        if muted {
            self.mute |= mask;
            self.tick_cycle = NEVER;
        } else {
            self.mute &= !mask;
            if self.mute == 0 && self.tick_cycle == NEVER {
                self.tick_cycle = cycle;
            }
        }
    }

    /// Mute pure tones above the audible range.
    pub fn update_ultrasound(&mut self, cycle: i32, ultrasound_cycles: i32) {
        let muted = self.period_cycles <= ultrasound_cycles && self.is_pure_tone();
        self.set_mute(muted, MUTE_FREQUENCY, cycle);
    }
}
