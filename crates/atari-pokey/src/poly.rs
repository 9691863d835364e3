//! Polynomial counter sequences.
//!
//! POKEY clocks four linear feedback shift registers at the machine rate.
//! Channels sample them when they tick, so the value a channel sees is a
//! function of the absolute cycle only. The 4- and 5-bit sequences are
//! short enough to write out; the 9- and 17-bit ones are generated.

/// 4-bit polynomial, period 15.
pub(crate) const POLY4: [u8; 15] = [0, 0, 0, 0, 1, 1, 1, 0, 1, 1, 0, 0, 1, 0, 1];

/// 5-bit polynomial, period 31.
pub(crate) const POLY5: [u8; 31] = [
    0, 0, 1, 1, 0, 0, 0, 1, 1, 1, 1, 0, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 0, 0, 0, 0, 1,
];

/// Period of the 9-bit polynomial.
pub const POLY9_PERIOD: i32 = 511;

/// Period of the 17-bit polynomial.
pub const POLY17_PERIOD: i32 = 131_071;

/// Bytes in the packed 17-bit table (one spare so RANDOM can read a byte
/// straddling the end).
const POLY17_BYTES: usize = 16_385;

/// The 9-bit and 17-bit sequences, owned per emulator instance.
#[derive(Debug, Clone)]
pub struct PolyTables {
    /// One byte of shift register state per step.
    poly9: Box<[u8]>,
    /// Packed bits, eight steps per byte.
    poly17: Box<[u8]>,
}

impl Default for PolyTables {
    fn default() -> Self {
        Self::new()
    }
}

impl PolyTables {
    #[must_use]
    pub fn new() -> Self {
        let mut poly9 = vec![0u8; POLY9_PERIOD as usize];
        let mut reg: u32 = 0x1FF;
        for entry in &mut poly9 {
            reg = ((((reg >> 5) ^ reg) & 1) << 8) + (reg >> 1);
            *entry = reg as u8;
        }

        let mut poly17 = vec![0u8; POLY17_BYTES];
        let mut reg: u32 = 0x1_FFFF;
        for entry in &mut poly17 {
            reg = ((((reg >> 5) ^ reg) & 0xFF) << 9) + (reg >> 8);
            *entry = (reg >> 1) as u8;
        }

        Self {
            poly9: poly9.into_boxed_slice(),
            poly17: poly17.into_boxed_slice(),
        }
    }

    /// Output bit of the 9- or 17-bit polynomial at step `index`.
    pub(crate) fn bit(&self, index: i32, poly9: bool) -> u8 {
        if poly9 {
            self.poly9[index.rem_euclid(POLY9_PERIOD) as usize] & 1
        } else {
            let index = index.rem_euclid(POLY17_PERIOD) as usize;
            (self.poly17[index >> 3] >> (index & 7)) & 1
        }
    }

    /// Eight consecutive bits starting at step `index`, as read from RANDOM.
    pub(crate) fn byte(&self, index: i32, poly9: bool) -> u8 {
        if poly9 {
            self.poly9[index.rem_euclid(POLY9_PERIOD) as usize]
        } else {
            let index = index.rem_euclid(POLY17_PERIOD) as usize;
            let j = index >> 3;
            let shift = index & 7;
            let lo = u32::from(self.poly17[j]) >> shift;
            let hi = u32::from(self.poly17[j + 1]) << (8 - shift);
            (lo + hi) as u8
        }
    }
}

/// Bit of the 4-bit polynomial at step `index`.
pub(crate) fn poly4(index: i32) -> u8 {
    POLY4[index.rem_euclid(15) as usize]
}

/// Bit of the 5-bit polynomial at step `index`.
pub(crate) fn poly5(index: i32) -> u8 {
    POLY5[index.rem_euclid(31) as usize]
}
