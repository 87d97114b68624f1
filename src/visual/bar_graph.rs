//! One bar per (track, pitch) that pulses up while its note sounds.

use std::collections::BTreeSet;

use crate::color::{pitch_class_color, Rgb};
use crate::config::MapperConfig;
use crate::notes::Note;
use crate::tracks::TrackInfo;

use super::{finalize, note_look, rise_time, track_rows, Curve, VisualEvent, VisualKind, VisualMapper, VisualParams};

const PITCH_SPACING: f32 = 1.2;
const ROW_SPACING: f32 = 3.0;
const REST_SCALE: [f32; 3] = [1.0, 1.0, 1.0];
const REST_DIM: f32 = 0.5;

pub struct BarGraph;

fn bar_id(track: usize, pitch: u8) -> String {
    format!("bar-{}-{}", track, pitch)
}

/// Bars rest in their pitch-class hue.
fn rest_color(pitch: u8) -> Rgb {
    pitch_class_color(pitch).scaled(REST_DIM)
}

impl VisualMapper for BarGraph {
    fn name(&self) -> &'static str {
        "bar-graph"
    }

    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
        let (Some(lo), Some(hi)) = (
            notes.iter().map(|n| n.pitch).min(),
            notes.iter().map(|n| n.pitch).max(),
        ) else {
            return Vec::new();
        };
        let mid = (f32::from(lo) + f32::from(hi)) / 2.0;
        let rows = track_rows(notes);

        let bars: BTreeSet<(usize, u8)> = notes.iter().map(|n| (n.track, n.pitch)).collect();

        let mut events = Vec::with_capacity(bars.len() + notes.len() * 4);
        for &(track, pitch) in &bars {
            let row = rows.get(&track).copied().unwrap_or(0);
            let position = [(f32::from(pitch) - mid) * PITCH_SPACING, row as f32 * ROW_SPACING, 0.0];
            events.push(VisualEvent::new(
                VisualKind::Spawn,
                bar_id(track, pitch),
                0.0,
                VisualParams::new()
                    .with_position(position)
                    .with_scale(REST_SCALE)
                    .with_color(rest_color(pitch))
                    .with_intensity(0.0),
            ));
        }

        for note in notes {
            let id = bar_id(note.track, note.pitch);
            let look = note_look(note, tracks, config);
            let resting = rest_color(note.pitch);
            let rise = rise_time(note);
            let start = note.start_seconds;
            let end = note.end_seconds();

            let rest = VisualParams::new()
                .with_scale(REST_SCALE)
                .with_color(resting)
                .with_intensity(0.0);
            let lit = VisualParams::new()
                .with_scale([1.0, 1.0, look.height])
                .with_color(look.color.unwrap_or(resting))
                .with_intensity(look.intensity);

            events.push(VisualEvent::new(VisualKind::Move, id.clone(), start, rest.clone()));
            events.push(VisualEvent::new(VisualKind::Move, id.clone(), start + rise, lit.clone()).with_curve(Curve::EaseOut));
            events.push(VisualEvent::new(VisualKind::Move, id.clone(), end - rise, lit));
            events.push(VisualEvent::new(VisualKind::Move, id, end, rest).with_curve(Curve::EaseIn));
        }

        finalize(events)
    }
}
