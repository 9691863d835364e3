//! RIFF WAVE header for PCM output.

use atari_pokey::{SAMPLE_RATE, SampleFormat};

/// Size of the header [`wav_header`] produces.
pub const WAV_HEADER_LEN: usize = 44;

/// Canonical 44-byte PCM header for `blocks` blocks of `channels`
/// interleaved samples.
///
/// WAV data is little-endian, so [`SampleFormat::S16Be`] describes the same
/// header as [`SampleFormat::S16Le`].
#[must_use]
pub fn wav_header(channels: usize, format: SampleFormat, blocks: usize) -> [u8; WAV_HEADER_LEN] {
    let block_size = channels * format.bytes_per_sample();
    let data_len = u32::try_from(blocks * block_size).unwrap_or(u32::MAX - 36);
    let bytes_per_second = SAMPLE_RATE * block_size as u32;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(data_len.saturating_add(36)).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    // PCM
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&(channels as u16).to_le_bytes());
    header[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    header[28..32].copy_from_slice(&bytes_per_second.to_le_bytes());
    header[32..34].copy_from_slice(&(block_size as u16).to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample().to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_16bit_layout() {
        let header = wav_header(2, SampleFormat::S16Le, 44_100);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 176_400 + 36);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(header[22], 2);
        assert_eq!(u32::from_le_bytes([header[28], header[29], header[30], header[31]]), 176_400);
        assert_eq!(header[32], 4);
        assert_eq!(header[34], 16);
        assert_eq!(u32::from_le_bytes([header[40], header[41], header[42], header[43]]), 176_400);
    }

    #[test]
    fn mono_8bit_layout() {
        let header = wav_header(1, SampleFormat::U8, 100);
        assert_eq!(header[22], 1);
        assert_eq!(header[32], 1);
        assert_eq!(header[34], 8);
        assert_eq!(u32::from_le_bytes([header[40], header[41], header[42], header[43]]), 100);
    }
}
