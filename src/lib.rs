//! ASCII Codec - A compressing ASCII video codec with a seekable binary container
//!
//! This crate turns intensity frames into bounded-alphabet symbol grids, cleans
//! the grids up so they compress well, and packs them into a versioned `.txv`
//! container that can be decoded one frame at a time.

pub mod alphabet;
pub mod cleanup;
pub mod cli;
pub mod compressor;
pub mod config;
pub mod container;
pub mod encoder;
pub mod grid;
pub mod quantizer;
pub mod renderer;
pub mod rle;
pub mod source;

pub use alphabet::Alphabet;
pub use cleanup::{CleanupPipeline, CleanupReport, CleanupStage};
pub use cli::{Cli, Command, Preset};
pub use compressor::{
    ClipStatistics, CompressionRating, FrameCompressor, FrameRecord, FrameType, FrameTypeStats,
};
pub use config::{
    AlphabetConfig, CleanupConfig, CodecConfig, CompressionConfig, HysteresisConfig,
    PayloadFormat, Polarity,
};
pub use container::{
    Container, ContainerInfo, ContainerMetadata, ContainerReader, ValidationMode,
    ValidationReport,
};
pub use encoder::{ClipEncoder, EncodedClip};
pub use grid::SymbolGrid;
pub use quantizer::{IntensityFrame, QuantizerSession};
pub use renderer::{calculate_frame_delay, Renderer};
pub use rle::Segment;
pub use source::{parse_resolution, FrameSource, SourceConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Package description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default ASCII character ramp, darkest first
pub const DEFAULT_ASCII_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Block character ramp for a more solid appearance
pub const BLOCK_ASCII_RAMP: &[char] = &[' ', '░', '▒', '▓', '█'];

/// Symbols that spatial cleanup leaves alone by default
pub const DEFAULT_FEATURE_SYMBOLS: &[char] = &['#', '*', '%', '@'];

/// Problems with a container's structure.
///
/// `BadMagic` means the bytes are not a container of this format at all; every
/// other variant means "this format, but damaged or unsupported".
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("not a .txv container (bad magic {found:?})")]
    BadMagic { found: Vec<u8> },

    #[error("unsupported format version {found} (this build reads version {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("corrupt or truncated container: {0}")]
    Truncated(String),

    #[error("inconsistent container: {0}")]
    Inconsistent(String),

    #[error("invalid container metadata: {0}")]
    Metadata(#[source] serde_json::Error),

    #[error("unknown frame type tag {0:#04x}")]
    UnknownFrameType(u8),

    #[error("unsupported compression algorithm '{0}'")]
    UnsupportedAlgorithm(String),
}

/// Failure to turn one frame payload back into a symbol grid.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("payload failed to decompress: {0}")]
    Decompress(String),

    #[error("malformed segment stream: {0}")]
    Malformed(String),

    #[error("run lengths cover {actual} symbols but the grid needs {expected}")]
    SymbolCount { expected: usize, actual: usize },

    #[error("delta frame has no preceding intra frame to apply to")]
    MissingReference,
}

/// Error types used throughout the crate
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Frame {index} not found (total: {count})")]
    FrameOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Frame {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: DecodeError,
    },
}

impl CodecError {
    /// True when the data is not a container of this format at all.
    pub fn is_foreign_format(&self) -> bool {
        matches!(self, CodecError::Format(FormatError::BadMagic { .. }))
    }

    /// True when the data claims to be a container but is damaged or unsupported.
    pub fn is_damaged_container(&self) -> bool {
        matches!(self, CodecError::Format(e) if !matches!(e, FormatError::BadMagic { .. }))
    }
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, CodecError>;

/// Utility functions
pub mod utils {
    /// Format duration in a human-readable way
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }

    /// Format a byte count as KiB with one decimal
    pub fn format_kib(bytes: u64) -> String {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }

    /// Ratio of two sizes, 0 when the denominator is 0
    pub fn ratio(raw: u64, compressed: u64) -> f64 {
        if compressed == 0 {
            0.0
        } else {
            raw as f64 / compressed as f64
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        utils::*, Alphabet, CleanupConfig, CleanupPipeline, ClipEncoder, ClipStatistics,
        CodecConfig, CodecError, CompressionConfig, Container, ContainerMetadata,
        ContainerReader, FormatError, FrameCompressor, FrameRecord, FrameType,
        HysteresisConfig, IntensityFrame, QuantizerSession, Result, SymbolGrid,
        ValidationMode,
    };
}
