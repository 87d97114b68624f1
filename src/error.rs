//! Error types shared by the parsing stages and the configuration layer.

/// Fatal problems while decoding a Standard MIDI File.
///
/// Any of these aborts the whole parse; no partial result is produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MidiError {
    #[error("not a MIDI file: {0}")]
    InvalidHeader(&'static str),
    #[error("unsupported SMF format {0}")]
    UnsupportedFormat(u16),
    #[error("truncated input at byte {offset}: needed {needed}, {available} left")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("variable-length quantity at byte {offset} is longer than 4 bytes")]
    MalformedVarLength { offset: usize },
    #[error("unsupported time division 0x{0:04X} (only ticks per quarter note)")]
    UnsupportedTimeDivision(u16),
    #[error("track {track}: data byte at {offset} with no running status")]
    MissingRunningStatus { track: usize, offset: usize },
}

/// Problems with user-supplied visualization settings.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid track mask segment: {0:?}")]
    InvalidTrackMask(String),
}

pub type Result<T> = std::result::Result<T, MidiError>;
