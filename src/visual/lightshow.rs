//! A ring of lights, one per track (or channel), keyed at every note start and end.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ColorSource, MapperConfig};
use crate::notes::Note;
use crate::tracks::TrackInfo;

use super::{
    brightness, circle_point, finalize, note_color, Curve, VisualEvent, VisualKind, VisualMapper, VisualParams,
};

const RING_RADIUS: f32 = 10.0;
const LIGHT_HEIGHT: f32 = 5.0;

pub struct Lightshow;

fn light_key(note: &Note, config: &MapperConfig) -> usize {
    match config.color_by {
        ColorSource::Track => note.track,
        ColorSource::Channel => usize::from(note.channel),
    }
}

/// Light state while `sounding` plays: loudest note sets the intensity, the
/// most recently started one the color. Silence turns the light off.
fn light_params(sounding: &BTreeSet<usize>, group: &[&Note], tracks: &[TrackInfo], config: &MapperConfig) -> VisualParams {
    let loudest = sounding.iter().map(|&s| group[s].velocity).max();
    let latest = sounding
        .iter()
        .max_by(|&&a, &&b| group[a].start_seconds.total_cmp(&group[b].start_seconds).then(a.cmp(&b)));
    match (loudest, latest) {
        (Some(velocity), Some(&idx)) => VisualParams::new()
            .with_color(note_color(group[idx], tracks, config))
            .with_intensity(brightness(f32::from(velocity) / 127.0)),
        _ => VisualParams::new().with_intensity(0.0),
    }
}

/// Key one light: every note start lights it and every note end releases
/// it, so each note shows up even when it has no length or shares its start
/// with a chord.
fn sweep(
    id: &str,
    group: &[&Note],
    tracks: &[TrackInfo],
    config: &MapperConfig,
    events: &mut Vec<VisualEvent>,
) {
    // (time, ends after starts at one instant, position in group)
    let mut boundaries: Vec<(f64, bool, usize)> = group
        .iter()
        .enumerate()
        .flat_map(|(i, n)| [(n.start_seconds, false, i), (n.end_seconds(), true, i)])
        .collect();
    boundaries.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut sounding: BTreeSet<usize> = BTreeSet::new();
    for (time, ending, idx) in boundaries {
        let params = if ending {
            sounding.remove(&idx);
            light_params(&sounding, group, tracks, config)
        } else {
            sounding.insert(idx);
            // the note that just started is the one in color
            let loudest = sounding.iter().map(|&s| group[s].velocity).max().unwrap_or(group[idx].velocity);
            VisualParams::new()
                .with_color(note_color(group[idx], tracks, config))
                .with_intensity(brightness(f32::from(loudest) / 127.0))
        };
        events.push(VisualEvent::new(VisualKind::ColorChange, id, time, params).with_curve(Curve::Step));
    }
}

impl VisualMapper for Lightshow {
    fn name(&self) -> &'static str {
        "lightshow"
    }

    fn generate(&self, notes: &[Note], tracks: &[TrackInfo], config: &MapperConfig) -> Vec<VisualEvent> {
        let mut groups: BTreeMap<usize, Vec<&Note>> = BTreeMap::new();
        for note in notes {
            groups.entry(light_key(note, config)).or_default().push(note);
        }

        let mut events = Vec::new();
        let lights = groups.len();
        for (slot, (key, group)) in groups.iter().enumerate() {
            let id = format!("light-{}", key);
            let [x, y, _] = circle_point(slot, lights, RING_RADIUS, 0.0);
            events.push(VisualEvent::new(
                VisualKind::Spawn,
                id.clone(),
                0.0,
                VisualParams::new()
                    .with_position([x, y, LIGHT_HEIGHT])
                    .with_color(note_color(group[0], tracks, config))
                    .with_intensity(0.0),
            ));
            sweep(&id, group, tracks, config, &mut events);
        }

        finalize(events)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn changes(events: &[VisualEvent], id: &str) -> Vec<(f64, Option<f32>)> {
        events
            .iter()
            .filter(|e| e.entity.0 == id && e.kind == VisualKind::ColorChange)
            .map(|e| (e.time, e.params.intensity))
            .collect()
    }

    #[test]
    fn one_light_per_track_or_channel() {
        let notes = vec![
            note(0, 0, 60, 1, 0.0, 1.0),
            note(0, 3, 61, 1, 0.0, 1.0),
            note(2, 3, 62, 1, 0.0, 1.0),
        ];
        let tracks = tracks(3);
        let by_track = Lightshow.generate(&notes, &tracks, &MapperConfig::default());
        assert_sorted(&by_track);
        assert_eq!(
            entities(&by_track, VisualKind::Spawn).into_iter().collect::<Vec<_>>(),
            vec!["light-0", "light-2"]
        );

        let config = MapperConfig {
            color_by: ColorSource::Channel,
            ..MapperConfig::default()
        };
        let by_channel = Lightshow.generate(&notes, &tracks, &config);
        assert_eq!(
            entities(&by_channel, VisualKind::Spawn).into_iter().collect::<Vec<_>>(),
            vec!["light-0", "light-3"]
        );
    }

    #[test]
    fn follows_the_sounding_set() {
        let notes = vec![
            note(0, 0, 60, 127, 0.0, 2.0),
            note(0, 0, 64, 10, 1.0, 2.0),
            note(0, 0, 67, 127, 2.5, 0.0),
        ];
        let events = Lightshow.generate(&notes, &tracks(1), &MapperConfig::default());
        let seen = changes(&events, "light-0");
        let times: Vec<f64> = seen.iter().map(|c| c.0).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 2.5, 2.5, 3.0]);

        // loudest wins while both sound, then the soft note alone
        assert!((seen[0].1.unwrap() - 7.0).abs() < 1e-6);
        assert!((seen[1].1.unwrap() - 7.0).abs() < 1e-6);
        assert!(seen[2].1.unwrap() < 5.5);
        // the blip flashes and falls back to the soft note
        assert!((seen[3].1.unwrap() - 7.0).abs() < 1e-6);
        assert!(seen[4].1.unwrap() < 5.5 && seen[4].1.unwrap() > 5.0);
        assert_eq!(seen[5].1, Some(0.0));
    }

    #[test]
    fn zero_length_hit_still_flashes() {
        let events = Lightshow.generate(&[note(0, 9, 36, 127, 1.0, 0.0)], &tracks(1), &MapperConfig::default());
        let seen = changes(&events, "light-0");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1.0);
        assert!((seen[0].1.unwrap() - 7.0).abs() < 1e-6);
        assert_eq!(seen[1], (1.0, Some(0.0)));
    }

    #[test]
    fn every_chord_note_is_keyed() {
        let config = MapperConfig {
            color_by: ColorSource::Channel,
            ..MapperConfig::default()
        };
        let notes = vec![
            note(0, 0, 60, 40, 0.0, 1.0),
            note(0, 0, 64, 90, 0.0, 1.0),
            note(0, 0, 67, 60, 0.0, 1.0),
        ];
        let events = Lightshow.generate(&notes, &tracks(1), &config);
        let seen = changes(&events, "light-0");
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.iter().filter(|c| c.0 == 0.0).count(), 3);
        // intensity never drops while the chord builds
        assert!(seen[0].1 < seen[1].1 && seen[1].1 == seen[2].1);
        assert_eq!(seen[5], (1.0, Some(0.0)));
    }

    #[test]
    fn back_to_back_notes_change_without_going_dark() {
        let notes = vec![note(0, 0, 60, 50, 0.0, 1.0), note(0, 0, 60, 100, 1.0, 1.0)];
        let events = Lightshow.generate(&notes, &tracks(1), &MapperConfig::default());
        let seen = changes(&events, "light-0");
        assert_eq!(seen.len(), 4);
        assert!(seen[1].1.unwrap() > seen[0].1.unwrap());
        assert!(seen[..3].iter().all(|c| c.1.unwrap() > 5.0));
        assert_eq!(seen[3], (2.0, Some(0.0)));
    }
}
