//! Atari 8-bit music player for SAP modules.
//!
//! A SAP file is a text header followed by 6502 code and data in Atari
//! DOS binary blocks. Playing it means emulating just enough of the
//! machine: the 6502, 64K of RAM, one or two POKEYs with their timer
//! interrupts, WSYNC and VCOUNT, the console speaker and an optional
//! COVOX DAC. The player routine runs once per frame and its POKEY writes
//! become 44.1 kHz PCM.
//!
//! # Player types
//!
//! | Type | Init | Per frame |
//! |------|------|-----------|
//! | B | `INIT` with the song in A | call `PLAYER` |
//! | C | `PLAYER+3` twice (music address, then song) | call `PLAYER+6` |
//! | D | start at `INIT` with the song in A | interrupt into `PLAYER` |
//! | S | start at `INIT` with the song in A | count down `$45` |
//!
//! # Memory map
//!
//! | Address | Read | Write |
//! |---------|------|-------|
//! | $D01F   | RAM | console speaker (bit 3) |
//! | $D20A   | RANDOM | POKEY |
//! | $D20E   | IRQST | IRQEN |
//! | $D20F   | $FF | SKCTL |
//! | $D40A   | RAM | WSYNC |
//! | $D40B   | VCOUNT | RAM |
//! | $D600   | RAM | COVOX (when declared) |
//!
//! POKEY registers mirror every 16 bytes across page $D2, or every 32 in
//! stereo mode, where bit 4 selects the second chip.

mod bus;
mod duration;
mod error;
mod filename;
mod machine;
mod module_info;
mod player;
mod sap;
mod wav;

pub use atari_pokey::SampleFormat;
pub use bus::{AtariBus, DMA_STEAL_CYCLES, SCANLINE_CYCLES, SCANLINES_PER_FRAME};
pub use duration::{duration_to_string, parse_duration};
pub use error::{AsapError, Result};
pub use filename::{can_set_module_info, change_ext, is_our_ext, is_our_file};
pub use machine::Machine;
pub use module_info::{DEFAULT_FASTPLAY, ModuleInfo, ModuleType, SONGS_MAX};
pub use player::{Asap, blocks_to_ms, ms_to_blocks};
pub use sap::{header_for, module_info, set_module_info};
pub use wav::{WAV_HEADER_LEN, wav_header};
