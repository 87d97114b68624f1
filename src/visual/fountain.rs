//! Rotating emitters throw a particle at each note's target so that it lands
//! exactly when the note starts.

use std::collections::BTreeSet;

use crate::config::MapperConfig;
use crate::notes::Note;
use crate::tracks::TrackInfo;

use super::{
    brightness, circle_point, finalize, note_color, track_rows, Burst, Vec3, VisualEvent, VisualKind,
    VisualMapper, VisualParams,
};

const GRAVITY_HALF: f32 = 4.905;
const EMITTER_RADIUS: f32 = 20.0;
/// Emitter revolutions per second
const EMITTER_SPIN: f32 = 0.05;
const RING_BASE: f32 = 2.0;
const RING_STEP: f32 = 1.5;
const DIM: f32 = 0.2;

pub struct Fountain;

fn target_position(pitch: u8) -> Vec3 {
    let radius = RING_BASE + f32::from(pitch / 12) * RING_STEP;
    circle_point(usize::from(pitch % 12), 12, radius, 0.0)
}

/// Launch velocity that carries a particle from `from` to `to` in `delay`
/// seconds under gravity.
fn ballistic(from: Vec3, to: Vec3, delay: f32) -> Vec3 {
    [
        (to[0] - from[0]) / delay,
        (to[1] - from[1]) / delay,
        (to[2] - from[2]) / delay + GRAVITY_HALF * delay,
    ]
}

impl VisualMapper for Fountain {
    fn name(&self) -> &'static str {
        "fountain"
    }

    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
        let pitches: BTreeSet<u8> = notes.iter().map(|n| n.pitch).collect();
        let rows = track_rows(notes);
        let emitters = rows.len();
        let emitter_at = |row: usize, seconds: f64| {
            circle_point(row, emitters, EMITTER_RADIUS, EMITTER_SPIN * seconds as f32)
        };

        let mut events = Vec::new();
        for &pitch in &pitches {
            events.push(VisualEvent::new(
                VisualKind::Spawn,
                format!("target-{}", pitch),
                0.0,
                VisualParams::new()
                    .with_position(target_position(pitch))
                    .with_intensity(0.0),
            ));
        }
        for (&track, &row) in &rows {
            events.push(VisualEvent::new(
                VisualKind::Spawn,
                format!("emitter-{}", track),
                0.0,
                VisualParams::new().with_position(emitter_at(row, 0.0)),
            ));
        }

        for note in notes {
            let color = note_color(note, tracks, config);
            let target_id = format!("target-{}", note.pitch);
            let emitter_id = format!("emitter-{}", note.track);
            let row = rows.get(&note.track).copied().unwrap_or(0);
            let target = target_position(note.pitch);

            let emit_time = (note.start_seconds - config.lead_time).max(0.0);
            let delay = (note.start_seconds - emit_time) as f32;
            let (from, velocity) = if delay > f32::EPSILON {
                let from = emitter_at(row, emit_time);
                (from, ballistic(from, target, delay))
            } else {
                // no time to fly: appear on the target
                (target, [0.0; 3])
            };

            events.push(VisualEvent::new(
                VisualKind::Move,
                emitter_id.clone(),
                emit_time,
                VisualParams::new().with_position(from),
            ));
            events.push(VisualEvent::new(
                VisualKind::Emit,
                emitter_id,
                emit_time,
                VisualParams::new()
                    .with_position(from)
                    .with_velocity(velocity)
                    .with_color(color)
                    .with_burst(Burst {
                        count: 1,
                        speed: velocity.iter().map(|c| c * c).sum::<f32>().sqrt(),
                        lifetime: f64::from(delay),
                    }),
            ));
            events.push(VisualEvent::new(
                VisualKind::ColorChange,
                target_id.clone(),
                note.start_seconds,
                VisualParams::new()
                    .with_color(color)
                    .with_intensity(brightness(note.velocity_norm())),
            ));
            events.push(VisualEvent::new(
                VisualKind::ColorChange,
                target_id,
                note.end_seconds(),
                VisualParams::new().with_color(color.scaled(DIM)).with_intensity(0.0),
            ));
        }

        finalize(events)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn targets_per_pitch_emits_per_note() {
        let notes = phrase();
        let events = Fountain.generate(&notes, &tracks(2), &MapperConfig::default());
        assert_sorted(&events);
        let spawns = entities(&events, VisualKind::Spawn);
        assert_eq!(spawns.iter().filter(|e| e.starts_with("target-")).count(), 4);
        assert_eq!(spawns.iter().filter(|e| e.starts_with("emitter-")).count(), 2);
        assert_eq!(count(&events, VisualKind::Emit), notes.len());
        assert_eq!(count(&events, VisualKind::ColorChange), notes.len() * 2);
    }

    #[test]
    fn emit_leads_the_note_and_lands_on_target() {
        let config = MapperConfig::default();
        let events = Fountain.generate(&[note(0, 0, 48, 100, 5.0, 1.0)], &tracks(1), &config);
        let emit = events.iter().find(|e| e.kind == VisualKind::Emit).unwrap();
        assert!((emit.time - 2.0).abs() < 1e-9);

        let from = emit.params.position.unwrap();
        let v = emit.params.velocity.unwrap();
        let t = 3.0_f32;
        let landed = [
            from[0] + v[0] * t,
            from[1] + v[1] * t,
            from[2] + v[2] * t - GRAVITY_HALF * t * t,
        ];
        let target = target_position(48);
        for axis in 0..3 {
            assert!((landed[axis] - target[axis]).abs() < 1e-3, "{landed:?} vs {target:?}");
        }
    }

    #[test]
    fn early_notes_clamp_emit_time() {
        let events = Fountain.generate(
            &[note(0, 0, 60, 100, 1.0, 1.0), note(0, 0, 62, 100, 0.0, 1.0)],
            &tracks(1),
            &MapperConfig::default(),
        );
        let emits: Vec<_> = events.iter().filter(|e| e.kind == VisualKind::Emit).collect();
        assert!(emits.iter().all(|e| e.time == 0.0));
        let at_zero = emits
            .iter()
            .find(|e| e.params.burst.unwrap().lifetime == 0.0)
            .unwrap();
        assert_eq!(at_zero.params.velocity, Some([0.0; 3]));
        assert_eq!(at_zero.params.position, Some(target_position(62)));
    }
}
