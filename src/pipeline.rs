//! pipeline.rs
//!
//! Runs every stage over one file: parse, tempo map, merge, note pairing and
//! track description. The result can then be rendered in any style.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{MapperConfig, TrackMask};
use crate::error::MidiError;
use crate::notes::{pair_notes, Note, NoteStats};
use crate::smf::{parse, MidiFile};
use crate::tempo::TempoMap;
use crate::timeline::{format_duration, Timeline};
use crate::tracks::{split_tracks, TrackInfo};
use crate::visual::{Style, VisualEvent};

/// Everything derived from one MIDI file, independent of the visual style.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub file: MidiFile,
    pub tempo: TempoMap,
    pub timeline: Timeline,
    pub notes: Vec<Note>,
    pub stats: NoteStats,
    pub tracks: Vec<TrackInfo>,
}

/// The document handed to the animation host.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Animation {
    pub style: Style,
    pub duration_seconds: f64,
    /// Soundtrack to play alongside, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
    pub tracks: Vec<TrackInfo>,
    pub events: Vec<VisualEvent>,
}

pub fn compile(bytes: &[u8]) -> std::result::Result<Compiled, MidiError> {
    let file = parse(bytes)?;
    let tempo = TempoMap::build(&file);
    let timeline = Timeline::merge(&file, &tempo);
    let (notes, stats) = pair_notes(&timeline);
    let (notes, tracks) = split_tracks(&file, notes);

    info!(
        format = file.format.as_int(),
        tracks = file.tracks.len(),
        events = timeline.len(),
        notes = notes.len(),
        warnings = file.warnings.len(),
        length = %format_duration(timeline.end_seconds),
        "compiled MIDI file"
    );
    if stats != NoteStats::default() {
        debug!(?stats, "note stream irregularities");
    }

    Ok(Compiled {
        file,
        tempo,
        timeline,
        notes,
        stats,
        tracks,
    })
}

impl Compiled {
    pub fn duration_seconds(&self) -> f64 {
        self.timeline.end_seconds
    }

    /// Notes on the tracks selected by `mask`. For a format 0 file the mask
    /// indexes the per-channel tracks., in timeline order.
    pub fn selected_notes(&self, mask: &TrackMask) -> Vec<Note> {
        self.notes.iter().filter(|n| mask.contains(n.track)).cloned().collect()
    }

    pub fn render(&self, style: Style, config: &MapperConfig) -> Vec<VisualEvent> {
        let notes = self.selected_notes(&config.track_mask);
        if notes.len() < self.notes.len() {
            debug!(kept = notes.len(), total = self.notes.len(), mask = %config.track_mask, "track mask applied");
        }
        let events = style.mapper().generate(&notes, &self.tracks, config);
        info!(%style, events = events.len(), "generated visual events");
        events
    }

    pub fn animation(&self, style: Style, config: &MapperConfig, audio: Option<PathBuf>) -> Animation {
        Animation {
            style,
            duration_seconds: self.duration_seconds(),
            audio,
            tracks: self.tracks.clone(),
            events: self.render(style, config),
        }
    }
}

/// Read a whole file into memory.
pub fn load_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {:?}", path))
}

/// The soundtrack that sits next to `midi` under the same stem, if any.
pub fn default_audio(midi: &Path) -> Option<PathBuf> {
    let audio = midi.with_extension("mp3");
    (audio != midi && audio.is_file()).then_some(audio)
}

/// Load and compile in one step, for callers that only want an `anyhow` error.
pub fn compile_file(path: &Path) -> Result<Compiled> {
    let bytes = load_file(path)?;
    compile(&bytes).with_context(|| format!("parsing {:?}", path))
}
