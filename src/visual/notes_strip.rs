//! Piano-roll strip: one bar per note laid out along a time axis.

use std::collections::BTreeMap;

use crate::config::MapperConfig;
use crate::notes::Note;
use crate::tracks::TrackInfo;

use super::{
    finalize, note_color, note_look, note_ordinals, track_rows, Vec3, VisualEvent, VisualKind, VisualMapper,
    VisualParams,
};

/// Width of one pitch lane
pub(crate) const LANE: f32 = 0.5;
const COLUMN_GAP: f32 = 2.0;
const BAR_HEIGHT: f32 = 0.2;
const DIM: f32 = 0.3;

pub struct NotesStrip;

/// Where notes land on the strip.
pub(crate) struct StripLayout {
    speed: f32,
    pitch_min: u8,
    column_width: f32,
    rows: BTreeMap<usize, usize>,
}

impl StripLayout {
    pub(crate) fn new(notes: &[Note], config: &MapperConfig) -> Self {
        let pitch_min = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
        let pitch_max = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
        StripLayout {
            speed: config.layout_speed,
            pitch_min,
            column_width: f32::from(pitch_max - pitch_min + 1) * LANE + COLUMN_GAP,
            rows: track_rows(notes),
        }
    }

    pub(crate) fn x(&self, seconds: f64) -> f32 {
        seconds as f32 * self.speed
    }

    pub(crate) fn lane(&self, note: &Note) -> f32 {
        let column = self.rows.get(&note.track).copied().unwrap_or(0) as f32;
        column * self.column_width + f32::from(note.pitch - self.pitch_min) * LANE
    }

    /// Total width across all track columns.
    pub(crate) fn width(&self) -> f32 {
        self.rows.len() as f32 * self.column_width
    }

    /// Centre of the note's bar.
    pub(crate) fn centre(&self, note: &Note) -> Vec3 {
        [self.x(note.start_seconds + note.duration_seconds / 2.0), self.lane(note), 0.0]
    }
}

pub(crate) fn strip_events(notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
    let layout = StripLayout::new(notes, config);
    let mut events = Vec::with_capacity(notes.len() * 3);

    for (note, n) in notes.iter().zip(note_ordinals(notes)) {
        let id = format!("note-{}-{}-{}", note.track, note.pitch, n);
        let look = note_look(note, tracks, config);
        let color = look.color.unwrap_or_else(|| note_color(note, tracks, config));
        let end = note.end_seconds();
        let length = note.duration_seconds as f32 * layout.speed;

        events.push(VisualEvent::new(
            VisualKind::Spawn,
            id.clone(),
            note.start_seconds,
            VisualParams::new()
                .with_position(layout.centre(note))
                .with_scale([length, LANE * 0.8, BAR_HEIGHT * look.height])
                .with_color(color)
                .with_intensity(look.intensity),
        ));
        events.push(VisualEvent::new(
            VisualKind::ColorChange,
            id.clone(),
            end,
            VisualParams::new()
                .with_color(color.scaled(DIM))
                .with_intensity(look.intensity.min(1.0)),
        ));
        events.push(VisualEvent::new(
            VisualKind::Destroy,
            id,
            end + config.trail_duration.max(0.0),
            VisualParams::new(),
        ));
    }
    events
}

impl VisualMapper for NotesStrip {
    fn name(&self) -> &'static str {
        "notes-strip"
    }

    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
        finalize(strip_events(notes, tracks, config))
    }
}
