//! Metadata describing a loaded module.

/// Most songs a module can hold.
pub const SONGS_MAX: usize = 32;

/// Default frame length: one PAL frame of scanlines.
pub const DEFAULT_FASTPLAY: u32 = 312;

/// SAP player types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleType {
    /// `INIT` is called with the song in A, then `PLAYER` once per frame.
    #[default]
    SapB,
    /// CMC-style player: `PLAYER+3` initializes, `PLAYER+6` plays a frame.
    SapC,
    /// Free-running code; `PLAYER` is called as an interrupt each frame.
    SapD,
    /// Free-running code driven by the OS frame counter at `$45`.
    SapS,
}

impl ModuleType {
    /// The letter used in the `TYPE` tag.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::SapB => 'B',
            Self::SapC => 'C',
            Self::SapD => 'D',
            Self::SapS => 'S',
        }
    }
}

/// Author, title, song list and player entry points of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Empty when unknown.
    pub author: String,
    /// Defaults to the file name without extension.
    pub name: String,
    /// Empty when unknown.
    pub date: String,
    /// 1 for mono, 2 for stereo (two POKEYs or COVOX).
    pub channels: usize,
    pub songs: usize,
    pub default_song: usize,
    /// Per-song duration in milliseconds, `None` when unknown.
    pub durations: [Option<u32>; SONGS_MAX],
    /// Per-song flag: the song loops rather than ending.
    pub loops: [bool; SONGS_MAX],
    /// Scanlines between player calls.
    pub fastplay: u32,
    pub module_type: ModuleType,
    pub music: Option<u16>,
    pub init: Option<u16>,
    pub player: Option<u16>,
    /// Page of the COVOX DAC, if the module drives one.
    pub covox_addr: Option<u16>,
    /// Length of the text header, up to the `$FF $FF` marker.
    pub header_len: usize,
}

impl ModuleInfo {
    /// Defaults for a module loaded from `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            author: String::new(),
            name: name.to_string(),
            date: String::new(),
            channels: 1,
            songs: 1,
            default_song: 0,
            durations: [None; SONGS_MAX],
            loops: [false; SONGS_MAX],
            fastplay: DEFAULT_FASTPLAY,
            module_type: ModuleType::default(),
            music: None,
            init: None,
            player: None,
            covox_addr: None,
            header_len: 0,
        }
    }

    #[must_use]
    pub const fn is_stereo(&self) -> bool {
        self.channels > 1
    }

    /// Duration of `song` in milliseconds, if known.
    #[must_use]
    pub fn duration(&self, song: usize) -> Option<u32> {
        self.durations.get(song).copied().flatten()
    }

    /// Whether `song` loops.
    #[must_use]
    pub fn is_loop(&self, song: usize) -> bool {
        self.loops.get(song).copied().unwrap_or(false)
    }
}

impl Default for ModuleInfo {
    fn default() -> Self {
        Self::new("")
    }
}
