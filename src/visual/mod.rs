//! Visual mapping: turns note intervals into timed scene events.
//!
//! Every style implements [`VisualMapper`]. Styles only decide *what* happens
//! to which entity and when; the host that consumes the event list owns the
//! actual scene objects.

use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::{FRAC_PI_2, TAU};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::{channel_color, velocity_color, Rgb};
use crate::config::{AnimationPreset, ColorSource, MapperConfig};
use crate::notes::Note;
use crate::tracks::TrackInfo;

mod bar_graph;
mod fireworks;
mod fountain;
mod lightshow;
mod notes_strip;
mod waterfall;

pub use bar_graph::BarGraph;
pub use fireworks::Fireworks;
pub use fountain::Fountain;
pub use lightshow::Lightshow;
pub use notes_strip::NotesStrip;
pub use waterfall::Waterfall;

pub type Vec3 = [f32; 3];

/// Stable identifier of a scene entity, e.g. `bar-1-60` or `camera`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    Spawn,
    Move,
    ColorChange,
    /// Particle burst; see [`Burst`]
    Emit,
    Destroy,
}

/// Interpolation hint from the previous keyframe of the same entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    Step,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Burst {
    pub count: u32,
    pub speed: f32,
    pub lifetime: f64,
}

/// Properties set by an event. Unset fields keep their previous value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VisualParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst: Option<Burst>,
}

impl VisualParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_burst(mut self, burst: Burst) -> Self {
        self.burst = Some(burst);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisualEvent {
    pub entity: EntityId,
    pub kind: VisualKind,
    /// Seconds from the start of the file
    pub time: f64,
    pub params: VisualParams,
    pub curve: Curve,
}

impl VisualEvent {
    pub fn new(kind: VisualKind, entity: impl Into<EntityId>, time: f64, params: VisualParams) -> Self {
        VisualEvent {
            entity: entity.into(),
            kind,
            time,
            params,
            curve: Curve::default(),
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }
}

pub trait VisualMapper {
    fn name(&self) -> &'static str;

    /// Produce events ordered by (time, entity). `notes` are already filtered
    /// by the track mask; `tracks` describes every track of the file.
    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    #[default]
    BarGraph,
    NotesStrip,
    Waterfall,
    Fireworks,
    Fountain,
    Lightshow,
}

impl Style {
    pub fn mapper(self) -> Box<dyn VisualMapper> {
        match self {
            Style::BarGraph => Box::new(BarGraph),
            Style::NotesStrip => Box::new(NotesStrip),
            Style::Waterfall => Box::new(Waterfall),
            Style::Fireworks => Box::new(Fireworks),
            Style::Fountain => Box::new(Fountain),
            Style::Lightshow => Box::new(Lightshow),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mapper().name())
    }
}

/// Sort by time then entity. The sort is stable, so keyframes of one entity
/// at the same instant keep the order they were generated in.
pub fn finalize(mut events: Vec<VisualEvent>) -> Vec<VisualEvent> {
    events.sort_by(|a, b| a.time.total_cmp(&b.time).then_with(|| a.entity.cmp(&b.entity)));
    events
}

/// Light intensity for a normalized velocity: 5 at silence, 7 at full force.
pub fn brightness(velocity: f32) -> f32 {
    5.0 + 2.0 * (velocity.clamp(0.0, 1.0) * FRAC_PI_2).sin()
}

/// Attack/release ramp length of a pulse.
pub fn rise_time(note: &Note) -> f64 {
    (note.duration_seconds / 2.0).min(0.1)
}

pub fn note_color(note: &Note, tracks: &[TrackInfo], config: &MapperConfig) -> Rgb {
    match config.color_by {
        ColorSource::Track => tracks
            .iter()
            .find(|t| t.index == note.track)
            .map(|t| t.color)
            .unwrap_or(Rgb::GREY),
        ColorSource::Channel => channel_color(note.channel),
    }
}

/// How a sounding note shows under the configured [`AnimationPreset`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Look {
    /// Factor on the resting z scale
    pub height: f32,
    /// `None` keeps the resting color
    pub color: Option<Rgb>,
    pub intensity: f32,
}

pub fn note_look(note: &Note, tracks: &[TrackInfo], config: &MapperConfig) -> Look {
    let v = note.velocity_norm();
    match config.preset {
        AnimationPreset::ZScale => Look {
            height: 1.0 + 5.0 * v,
            color: None,
            intensity: 0.0,
        },
        AnimationPreset::B2rLight => {
            let (lo, hi) = tracks
                .iter()
                .find(|t| t.index == note.track && t.has_notes())
                .map_or((0, 127), |t| (t.velocity_min, t.velocity_max));
            Look {
                height: 1.0,
                color: Some(velocity_color(note.velocity, lo, hi)),
                intensity: brightness(v),
            }
        }
        AnimationPreset::MultiLight => Look {
            height: 1.0,
            color: Some(note_color(note, tracks, config)),
            intensity: brightness(v),
        },
    }
}

/// Row of each track that has notes, in track order.
pub fn track_rows(notes: &[Note]) -> BTreeMap<usize, usize> {
    let tracks: BTreeSet<usize> = notes.iter().map(|n| n.track).collect();
    tracks.into_iter().enumerate().map(|(row, t)| (t, row)).collect()
}

/// Point `i` of `n` spread evenly on a horizontal circle, rotated by `turns`.
pub fn circle_point(i: usize, n: usize, radius: f32, turns: f32) -> Vec3 {
    let angle = (i as f32 / n.max(1) as f32 + turns) * TAU;
    [radius * angle.cos(), radius * angle.sin(), 0.0]
}

/// Numbers notes per (track, pitch) in order: the `n` of `note-{track}-{pitch}-{n}`.
pub(crate) fn note_ordinals(notes: &[Note]) -> Vec<usize> {
    let mut seen: BTreeMap<(usize, u8), usize> = BTreeMap::new();
    notes
        .iter()
        .map(|n| {
            let slot = seen.entry((n.track, n.pitch)).or_insert(0);
            let ordinal = *slot;
            *slot += 1;
            ordinal
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::color::palette;

    pub fn note(track: usize, channel: u8, pitch: u8, velocity: u8, start: f64, duration: f64) -> Note {
        Note {
            track,
            channel,
            pitch,
            velocity,
            start_tick: (start * 960.0) as u64,
            end_tick: ((start + duration) * 960.0) as u64,
            start_seconds: start,
            duration_seconds: duration,
        }
    }

    /// Minimal track list covering `0..count`.
    pub fn tracks(count: usize) -> Vec<TrackInfo> {
        palette(count)
            .into_iter()
            .enumerate()
            .map(|(index, color)| TrackInfo {
                index,
                name: None,
                instrument: None,
                program: None,
                channels: vec![],
                note_count: 1,
                pitch_min: 0,
                pitch_max: 127,
                velocity_min: 0,
                velocity_max: 127,
                pitches: vec![],
                color,
            })
            .collect()
    }

    /// A small two-track phrase with a chord, a repeated pitch and a zero-length note.
    pub fn phrase() -> Vec<Note> {
        vec![
            note(0, 0, 60, 100, 0.0, 0.5),
            note(0, 0, 64, 80, 0.0, 0.5),
            note(1, 9, 36, 127, 0.25, 0.0),
            note(0, 0, 60, 60, 0.5, 1.0),
            note(1, 9, 38, 40, 1.0, 0.25),
        ]
    }

    pub fn assert_sorted(events: &[VisualEvent]) {
        for w in events.windows(2) {
            assert!(
                w[0].time < w[1].time || (w[0].time == w[1].time && w[0].entity <= w[1].entity),
                "out of order: {:?} then {:?}",
                w[0],
                w[1]
            );
        }
    }

    pub fn entities(events: &[VisualEvent], kind: VisualKind) -> BTreeSet<String> {
        events
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.entity.0.clone())
            .collect()
    }

    pub fn count(events: &[VisualEvent], kind: VisualKind) -> usize {
        events.iter().filter(|e| e.kind == kind).count()
    }
}
