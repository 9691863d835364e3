//! Error types for module loading and playback.

/// Errors reported by the player.
#[derive(thiserror::Error, Debug)]
pub enum AsapError {
    /// The file extension names no supported format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A SAP header line is malformed, or a required tag is missing.
    #[error("Invalid SAP header: {0}")]
    InvalidHeader(String),

    /// A binary block is truncated, empty, or the data does not end on a
    /// block boundary.
    #[error("Invalid binary block at offset {offset}")]
    InvalidBlock {
        /// Byte offset of the block header in the file.
        offset: usize,
    },

    /// Song index beyond the module's song count.
    #[error("Song {song} out of range (module has {songs})")]
    SongOutOfRange {
        /// Requested song (0-based).
        song: usize,
        /// Songs in the module.
        songs: usize,
    },

    /// A duration string could not be parsed.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// IO error from the filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, AsapError>;
