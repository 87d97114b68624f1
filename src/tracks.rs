//! Per-track metadata shared by every visualization style.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::color::{palette, Rgb};
use crate::notes::Note;
use crate::smf::{EventKind, Format, MidiFile, RawEvent, Track};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackInfo {
    pub index: usize,
    pub name: Option<String>,
    pub instrument: Option<String>,
    /// First program change seen on the track
    pub program: Option<u8>,
    /// Channels that carry notes, ascending
    pub channels: Vec<u8>,
    pub note_count: usize,
    pub pitch_min: u8,
    pub pitch_max: u8,
    pub velocity_min: u8,
    pub velocity_max: u8,
    /// Distinct pitches played, ascending
    pub pitches: Vec<u8>,
    pub color: Rgb,
}

impl TrackInfo {
    pub fn has_notes(&self) -> bool {
        self.note_count > 0
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("Track {}", self.index),
        }
    }
}

fn first_program<'a>(events: impl IntoIterator<Item = &'a RawEvent>) -> Option<u8> {
    events.into_iter().find_map(|ev| match ev.kind {
        EventKind::ProgramChange { program } => Some(program),
        _ => None,
    })
}

fn summarize(index: usize, track: &Track, program: Option<u8>, own: &[&Note]) -> TrackInfo {
    let pitches: BTreeSet<u8> = own.iter().map(|n| n.pitch).collect();
    let channels: BTreeSet<u8> = own.iter().map(|n| n.channel).collect();
    TrackInfo {
        index,
        name: track.name.clone(),
        instrument: track.instrument.clone(),
        program,
        channels: channels.into_iter().collect(),
        note_count: own.len(),
        pitch_min: pitches.first().copied().unwrap_or(0),
        pitch_max: pitches.last().copied().unwrap_or(0),
        velocity_min: own.iter().map(|n| n.velocity).min().unwrap_or(0),
        velocity_max: own.iter().map(|n| n.velocity).max().unwrap_or(0),
        pitches: pitches.into_iter().collect(),
        color: Rgb::GREY,
    }
}

/// Tracks that carry notes get evenly spaced hues, handed out so that
/// neighbouring tracks contrast. Note-less tracks (tempo maps, lyrics) are grey.
fn assign_colors(infos: &mut [TrackInfo]) {
    let used = infos.iter().filter(|t| t.has_notes()).count();
    let mut colors = palette(used).into_iter();
    for info in infos.iter_mut().filter(|t| t.has_notes()) {
        if let Some(c) = colors.next() {
            info.color = c;
        }
    }
}

/// Describe every track of `file`; `notes` must come from the same file.
pub fn describe_tracks(file: &MidiFile, notes: &[Note]) -> Vec<TrackInfo> {
    let mut infos: Vec<TrackInfo> = file
        .tracks
        .iter()
        .map(|track| {
            let own: Vec<&Note> = notes.iter().filter(|n| n.track == track.index).collect();
            summarize(track.index, track, first_program(&track.events), &own)
        })
        .collect();
    assign_colors(&mut infos);
    infos
}

/// The tracks a visualization works with.
///
/// A format 0 file keeps every part in one track, so there each channel that
/// plays notes becomes a track of its own, numbered in ascending channel order
/// and named `{name}-ch{channel}`. `notes` are renumbered to match. Other
/// formats are described as they are.
pub fn split_tracks(file: &MidiFile, mut notes: Vec<Note>) -> (Vec<Note>, Vec<TrackInfo>) {
    let (Format::SingleTrack, Some(track)) = (file.format, file.tracks.first()) else {
        let infos = describe_tracks(file, &notes);
        return (notes, infos);
    };
    if notes.is_empty() {
        let infos = describe_tracks(file, &notes);
        return (notes, infos);
    }

    let channels: BTreeSet<u8> = notes.iter().map(|n| n.channel).collect();
    let slots: BTreeMap<u8, usize> = channels.iter().enumerate().map(|(i, &c)| (c, i)).collect();
    for note in &mut notes {
        note.track = slots.get(&note.channel).copied().unwrap_or(0);
    }
    notes.sort_by_key(|n| (n.start_tick, n.track, n.channel, n.pitch, n.end_tick));

    let mut infos: Vec<TrackInfo> = channels
        .iter()
        .enumerate()
        .map(|(index, &channel)| {
            let own: Vec<&Note> = notes.iter().filter(|n| n.track == index).collect();
            let program = first_program(track.events.iter().filter(|ev| ev.channel == Some(channel)));
            let mut info = summarize(index, track, program, &own);
            info.name = Some(match &track.name {
                Some(name) if !name.trim().is_empty() => format!("{}-ch{}", name.trim(), channel),
                _ => format!("ch{}", channel),
            });
            info
        })
        .collect();
    assign_colors(&mut infos);
    debug!(channels = infos.len(), "split single-track file by channel");
    (notes, infos)
}
