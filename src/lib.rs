//! Compiles Standard MIDI Files into timed visual events.
//!
//! ```text
//! bytes -> smf::parse -> TempoMap -> Timeline -> notes -> VisualMapper -> events
//! ```

pub mod color;
pub mod config;
pub mod error;
pub mod notes;
pub mod pipeline;
pub mod reader;
pub mod smf;
pub mod tempo;
pub mod timeline;
pub mod tracks;
pub mod visual;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{AnimationPreset, ColorSource, MapperConfig, TrackMask};
pub use error::{ConfigError, MidiError};
pub use notes::{pair_notes, Note, NoteStats};
pub use pipeline::{compile, compile_file, default_audio, load_file, Animation, Compiled};
pub use smf::{parse, MidiFile};
pub use tempo::TempoMap;
pub use timeline::Timeline;
pub use tracks::TrackInfo;
pub use visual::{Style, VisualEvent, VisualMapper};
