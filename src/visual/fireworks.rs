//! A particle burst per note on a pitch-class by octave grid.

use crate::config::MapperConfig;
use crate::notes::Note;
use crate::tracks::TrackInfo;

use super::{
    brightness, finalize, note_color, note_ordinals, track_rows, Burst, VisualEvent, VisualKind, VisualMapper,
    VisualParams,
};

const GRID: f32 = 5.0;
/// Centres the twelve pitch classes around x = 0
const OFFSET_X: f32 = 5.5 * GRID;

pub struct Fireworks;

impl VisualMapper for Fireworks {
    fn name(&self) -> &'static str {
        "fireworks"
    }

    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
        let rows = track_rows(notes);
        let events = notes
            .iter()
            .zip(note_ordinals(notes))
            .map(|(note, n)| {
                let v = note.velocity_norm();
                let row = rows.get(&note.track).copied().unwrap_or(0);
                let position = [
                    f32::from(note.pitch_class()) * GRID - OFFSET_X,
                    row as f32 * GRID,
                    f32::from(note.octave()) * GRID,
                ];
                VisualEvent::new(
                    VisualKind::Emit,
                    format!("burst-{}-{}-{}", note.track, note.pitch, n),
                    note.start_seconds,
                    VisualParams::new()
                        .with_position(position)
                        .with_color(note_color(note, tracks, config))
                        .with_intensity(brightness(v))
                        .with_burst(Burst {
                            count: 20 + (80.0 * v).round() as u32,
                            speed: 2.0 + 8.0 * v,
                            lifetime: config.particle_lifetime,
                        }),
                )
            })
            .collect();
        finalize(events)
    }
}
