//! The strip with drops falling onto each note and a camera scrolling along.

use crate::config::MapperConfig;
use crate::notes::Note;
use crate::tracks::TrackInfo;

use super::notes_strip::{strip_events, StripLayout};
use super::{
    finalize, note_color, note_ordinals, Curve, VisualEvent, VisualKind, VisualMapper, VisualParams,
};

const DROP_SIZE: f32 = 0.3;
const CAMERA_HEIGHT: f32 = 30.0;

pub struct Waterfall;

impl VisualMapper for Waterfall {
    fn name(&self) -> &'static str {
        "waterfall"
    }

    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
        let mut events = strip_events(notes, tracks, config);
        if notes.is_empty() {
            return events;
        }
        let layout = StripLayout::new(notes, config);

        for (note, n) in notes.iter().zip(note_ordinals(notes)) {
            let id = format!("drop-{}-{}-{}", note.track, note.pitch, n);
            let x = layout.x(note.start_seconds);
            let y = layout.lane(note);
            let end = note.end_seconds();

            events.push(VisualEvent::new(
                VisualKind::Spawn,
                id.clone(),
                note.start_seconds,
                VisualParams::new()
                    .with_position([x, y, config.fall_height])
                    .with_scale([DROP_SIZE; 3])
                    .with_color(note_color(note, tracks, config)),
            ));
            events.push(
                VisualEvent::new(VisualKind::Move, id.clone(), end, VisualParams::new().with_position([x, y, 0.0]))
                    .with_curve(Curve::EaseIn),
            );
            events.push(VisualEvent::new(VisualKind::Destroy, id, end, VisualParams::new()));
        }

        let first = notes
            .iter()
            .map(|n| n.start_seconds)
            .fold(f64::INFINITY, f64::min);
        let last = notes.iter().map(Note::end_seconds).fold(0.0, f64::max);
        let centre_y = layout.width() / 2.0;
        events.push(VisualEvent::new(
            VisualKind::Spawn,
            "camera",
            first,
            VisualParams::new().with_position([layout.x(first), centre_y, CAMERA_HEIGHT]),
        ));
        events.push(VisualEvent::new(
            VisualKind::Move,
            "camera",
            last,
            VisualParams::new().with_position([layout.x(last), centre_y, CAMERA_HEIGHT]),
        ));

        finalize(events)
    }
}
