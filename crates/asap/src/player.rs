//! The player: loads a module, calls its 6502 routines once per frame and
//! turns the POKEY output into PCM.
//!
//! # Timing
//!
//! A frame is `FASTPLAY` scanlines of 114 cycles. Each frame produces the
//! samples its cycles cover at 44100 Hz; [`Asap::generate`] hands them out
//! and runs the next frame when they are used up. Positions and durations
//! are counted in blocks, one sample per output channel.

use std::fs;
use std::path::Path;

use atari_pokey::{PAL_CLOCK, SAMPLE_RATE, SampleFormat};
use emu_core::{Bus, Cpu, Observable, Value};
use log::{debug, trace, warn};

use crate::bus::{SCANLINE_CYCLES, SCANLINES_PER_FRAME};
use crate::duration::duration_to_string;
use crate::error::{AsapError, Result};
use crate::machine::Machine;
use crate::module_info::{ModuleInfo, ModuleType};
use crate::sap;
use crate::wav::{WAV_HEADER_LEN, wav_header};

/// Frames an init routine may take before playback starts regardless.
const INIT_FRAMES: u32 = 50;

/// Where type D players return to.
const TYPE_D_RETURN: u16 = 0xD200;

/// OS frame counter decremented after every type S frame.
const TYPE_S_COUNTER: u16 = 0x45;

/// Incremented when [`TYPE_S_COUNTER`] reaches zero.
const TYPE_S_CARRY: u16 = 0xB07B;

/// Blocks in `ms` milliseconds.
#[must_use]
pub fn ms_to_blocks(ms: u32) -> usize {
    ms as usize * (SAMPLE_RATE as usize / 100) / 10
}

/// Milliseconds in `blocks` blocks, rounded down.
#[must_use]
pub fn blocks_to_ms(blocks: usize) -> u32 {
    (blocks * 10 / (SAMPLE_RATE as usize / 100)) as u32
}

/// A playback session.
///
/// ```no_run
/// use asap::{Asap, SampleFormat};
///
/// let module = std::fs::read("song.sap")?;
/// let mut asap = Asap::new();
/// asap.load("song.sap", &module)?;
/// asap.play_song(asap.module_info().default_song, Some(60_000))?;
/// let mut buffer = [0u8; 8192];
/// while asap.generate(&mut buffer, SampleFormat::S16Le) > 0 {}
/// # Ok::<(), asap::AsapError>(())
/// ```
pub struct Asap {
    machine: Machine,
    info: ModuleInfo,
    current_song: usize,
    /// Song length in milliseconds; `None` plays forever.
    current_duration: Option<u32>,
    blocks_played: usize,
    /// Cycles of silence that end the song, 0 to play through silence.
    silence_cycles: i64,
    silence_cycles_counter: i64,
    /// A song has been started since the last load.
    playing: bool,
}

impl Default for Asap {
    fn default() -> Self {
        Self::new()
    }
}

impl Asap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
            info: ModuleInfo::default(),
            current_song: 0,
            current_duration: None,
            blocks_played: 0,
            silence_cycles: 0,
            silence_cycles_counter: 0,
            playing: false,
        }
    }

    /// Load a module. The extension of `filename` selects the format.
    /// Silence detection is switched off.
    ///
    /// # Errors
    ///
    /// Fails for unsupported extensions, malformed headers and binary
    /// blocks that do not fit the file.
    pub fn load(&mut self, filename: &str, module: &[u8]) -> Result<()> {
        self.silence_cycles = 0;
        self.playing = false;
        let info = sap::module_info(filename, module)?;
        sap::load_blocks(self.machine.bus.memory_mut(), module, info.header_len)?;
        debug!(
            "Loaded {filename}: \"{}\" by \"{}\", type {}, {} song(s), {}",
            info.name,
            info.author,
            info.module_type.letter(),
            info.songs,
            if info.is_stereo() { "stereo" } else { "mono" }
        );
        self.info = info;
        Ok(())
    }

    /// Read and load the module at `path`.
    ///
    /// # Errors
    ///
    /// As [`Asap::load`], plus failures reading the file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let module = fs::read(path)?;
        self.load(&path.to_string_lossy(), &module)
    }

    #[must_use]
    pub fn module_info(&self) -> &ModuleInfo {
        &self.info
    }

    #[must_use]
    pub fn current_song(&self) -> usize {
        self.current_song
    }

    /// The emulated CPU and memory map.
    #[must_use]
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// End the song after `seconds` of silence. 0 switches detection off.
    pub fn detect_silence(&mut self, seconds: u32) {
        self.silence_cycles = i64::from(seconds) * i64::from(PAL_CLOCK);
        self.silence_cycles_counter = self.silence_cycles;
    }

    /// Start `song`, limited to `duration` milliseconds (`None` or 0 for
    /// no limit).
    ///
    /// # Errors
    ///
    /// Fails if the module has no such song.
    pub fn play_song(&mut self, song: usize, duration: Option<u32>) -> Result<()> {
        if song >= self.info.songs {
            return Err(AsapError::SongOutOfRange {
                song,
                songs: self.info.songs,
            });
        }
        self.current_song = song;
        self.current_duration = duration;
        self.start();
        debug!(
            "Song {}/{} started, {}",
            song + 1,
            self.info.songs,
            duration.map_or_else(|| "no time limit".to_string(), duration_to_string)
        );
        Ok(())
    }

    /// Restart the current song.
    fn start(&mut self) {
        self.blocks_played = 0;
        self.silence_cycles_counter = self.silence_cycles;
        self.playing = true;
        self.machine.reset(self.info.is_stereo(), self.info.covox_addr);

        let song = self.current_song as u8;
        let init = self.info.init.unwrap_or_default();
        let player = self.info.player.unwrap_or_default();
        match self.info.module_type {
            ModuleType::SapB => self.call_init(init, song, 0, 0),
            ModuleType::SapC => {
                let [lo, hi] = self.info.music.unwrap_or_default().to_le_bytes();
                self.call_init(player.wrapping_add(3), 0x70, lo, hi);
                self.call_init(player.wrapping_add(3), 0x00, song, 0);
            }
            ModuleType::SapD | ModuleType::SapS => {
                let regs = &mut self.machine.cpu.regs;
                regs.a = song;
                regs.x = 0;
                regs.y = 0;
                regs.s = 0xFF;
                regs.pc = init;
            }
        }
        self.mute_pokey_channels(0);
    }

    /// Run an initialization routine until it returns, frame by frame,
    /// discarding its sound.
    fn call_init(&mut self, addr: u16, a: u8, x: u8, y: u8) {
        let regs = &mut self.machine.cpu.regs;
        regs.a = a;
        regs.x = x;
        regs.y = y;
        self.machine.prepare_call(addr);
        for _ in 0..INIT_FRAMES {
            self.machine.bus.pokeys.start_frame();
            self.machine.run_scanlines(SCANLINES_PER_FRAME);
            let pokeys = &mut self.machine.bus.pokeys;
            pokeys.end_frame(SCANLINES_PER_FRAME * SCANLINE_CYCLES);
            let samples = pokeys.remaining_blocks();
            pokeys.skip(samples);
            if self.machine.cpu.is_halted() {
                return;
            }
        }
        warn!("Init routine at {addr:04X} did not return within {INIT_FRAMES} frames");
    }

    /// Mute POKEY channels: bits 0-3 for the base chip, 4-7 for the extra
    /// chip.
    pub fn mute_pokey_channels(&mut self, mask: u8) {
        let cycle = self.machine.bus.cycle;
        self.machine.bus.pokeys.mute(mask, cycle);
    }

    /// Run one frame of the player. Returns `false` once silence detection
    /// ends the song.
    fn play_frame(&mut self) -> bool {
        let fastplay = self.info.fastplay as i32;
        let player = self.info.player.unwrap_or_default();
        self.machine.bus.pokeys.start_frame();
        match self.info.module_type {
            ModuleType::SapB => self.machine.call(player, fastplay),
            ModuleType::SapC => self.machine.call(player.wrapping_add(6), fastplay),
            ModuleType::SapD => {
                self.machine.enter_interrupt_player(player, TYPE_D_RETURN);
                self.machine.run_scanlines(fastplay);
            }
            ModuleType::SapS => {
                self.machine.run_scanlines(fastplay);
                let bus = &mut self.machine.bus;
                let counter = bus.peek(TYPE_S_COUNTER).wrapping_sub(1);
                bus.poke(TYPE_S_COUNTER, counter);
                if counter == 0 {
                    let carry = bus.peek(TYPE_S_CARRY).wrapping_add(1);
                    bus.poke(TYPE_S_CARRY, carry);
                }
            }
        }
        let cycles = fastplay * SCANLINE_CYCLES;
        self.machine.bus.pokeys.end_frame(cycles);
        trace!(
            "Frame: {} samples, PC {:04X}",
            self.machine.bus.pokeys.samples(),
            self.machine.cpu.pc()
        );

        if self.silence_cycles > 0 {
            if self.machine.bus.pokeys.is_silent() {
                self.silence_cycles_counter -= i64::from(cycles);
                if self.silence_cycles_counter <= 0 {
                    debug!("Silence at {} ms, song ended", self.position());
                    return false;
                }
            } else {
                self.silence_cycles_counter = self.silence_cycles;
            }
        }
        true
    }

    /// Blocks left before the song's duration is reached, or `None` when
    /// the song has no duration.
    fn blocks_left(&self) -> Option<usize> {
        self.current_duration
            .filter(|&ms| ms > 0)
            .map(|ms| ms_to_blocks(ms).saturating_sub(self.blocks_played))
    }

    /// Fill `buffer` with interleaved samples. Returns the bytes written,
    /// which is less than the buffer size only at the end of the song.
    pub fn generate(&mut self, buffer: &mut [u8], format: SampleFormat) -> usize {
        if !self.playing || (self.silence_cycles > 0 && self.silence_cycles_counter <= 0) {
            return 0;
        }
        let block_shift =
            (self.machine.bus.pokeys.channels() - 1) + usize::from(format != SampleFormat::U8);
        let mut buffer_blocks = buffer.len() >> block_shift;
        if let Some(left) = self.blocks_left() {
            buffer_blocks = buffer_blocks.min(left);
        }

        let mut block = 0;
        loop {
            let blocks = self.machine.bus.pokeys.generate(
                &mut buffer[block << block_shift..],
                buffer_blocks - block,
                format,
            );
            self.blocks_played += blocks;
            block += blocks;
            if block >= buffer_blocks || !self.play_frame() {
                break;
            }
        }
        block << block_shift
    }

    /// Current position in milliseconds.
    #[must_use]
    pub fn position(&self) -> u32 {
        blocks_to_ms(self.blocks_played)
    }

    /// Move to `ms` milliseconds into the song. Going backwards replays
    /// the song from its start.
    pub fn seek(&mut self, ms: u32) {
        if !self.playing {
            return;
        }
        let block = ms_to_blocks(ms);
        if block < self.blocks_played {
            self.start();
        }
        loop {
            let remaining = self.machine.bus.pokeys.remaining_blocks();
            if self.blocks_played + remaining >= block {
                break;
            }
            self.blocks_played += self.machine.bus.pokeys.skip(remaining);
            self.play_frame();
        }
        self.machine.bus.pokeys.skip(block - self.blocks_played);
        self.blocks_played = block;
    }

    /// WAV header for the rest of the song. A song without a duration gets
    /// a header with no data length.
    #[must_use]
    pub fn wav_header(&self, format: SampleFormat) -> [u8; WAV_HEADER_LEN] {
        self.wav_header_for_part(format, usize::MAX)
    }

    /// WAV header for the next `blocks` blocks, limited to the rest of the
    /// song.
    #[must_use]
    pub fn wav_header_for_part(&self, format: SampleFormat, blocks: usize) -> [u8; WAV_HEADER_LEN] {
        let blocks = blocks.min(self.blocks_left().unwrap_or(0));
        wav_header(self.info.channels, format, blocks)
    }
}

/// Parse a `memory.<address>` path: decimal, `0x` hex or `$` hex.
fn parse_address(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

impl Observable for Asap {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.machine.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("pokey.") {
            self.machine.bus.pokeys.query(rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|addr| self.machine.bus.peek(addr).into())
        } else {
            match path {
                "song" => Some((self.current_song as u32).into()),
                "position" => Some(self.position().into()),
                "blocks_played" => Some((self.blocks_played as u32).into()),
                "scanline" => Some(self.machine.bus.scanline_number.into()),
                "irqst" => Some(self.machine.bus.irqst.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<6502_paths>",
            "pokey.<pokey_paths>",
            "memory.<address>",
            "song",
            "position",
            "blocks_played",
            "scanline",
            "irqst",
        ]
    }
}
