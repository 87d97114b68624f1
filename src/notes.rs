//! notes.rs
//!
//! Pairs note-on and note-off events into note intervals.
//!
//! Each `(track, channel, pitch)` key is a two-state machine, Idle or
//! Sounding, driven in a single forward pass over the merged timeline:
//! - NoteOn with velocity > 0 while Idle starts a note.
//! - NoteOff, or NoteOn with velocity 0, while Sounding ends it.
//! - NoteOn while already Sounding closes the running note at that instant and
//!   starts a fresh one (re-trigger).
//! - NoteOff while Idle is ignored.
//! - Whatever is still Sounding when the stream ends is closed at the time of
//!   the last event, so every note has an end.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::smf::EventKind;
use crate::timeline::{TimedEvent, Timeline};

/// A resolved note interval.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Note {
    pub track: usize,
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub end_tick: u64,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl Note {
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    /// Velocity scaled to 0.0..=1.0
    pub fn velocity_norm(&self) -> f32 {
        f32::from(self.velocity) / 127.0
    }

    pub fn octave(&self) -> u8 {
        self.pitch / 12
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

/// Counters for the tolerated irregularities of a note stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NoteStats {
    pub orphan_offs: usize,
    pub retriggers: usize,
    pub force_closed: usize,
}

#[derive(Clone, Copy, Debug)]
struct Sounding {
    start_tick: u64,
    start_seconds: f64,
    velocity: u8,
}

type Key = (usize, u8, u8);

#[derive(Debug, Default)]
pub struct NoteTracker {
    sounding: BTreeMap<Key, Sounding>,
    notes: Vec<Note>,
    stats: NoteStats,
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, ev: &TimedEvent) {
        let Some(channel) = ev.event.channel else {
            return;
        };
        let (pitch, velocity, is_on) = match ev.event.kind {
            EventKind::NoteOn { key, velocity } if velocity > 0 => (key, velocity, true),
            // NoteOn with velocity 0 is equivalent to NoteOff
            EventKind::NoteOn { key, .. } | EventKind::NoteOff { key, .. } => (key, 0, false),
            _ => return,
        };
        let key = (ev.event.track, channel, pitch);

        if is_on {
            if let Some(prev) = self.sounding.remove(&key) {
                trace!(track = key.0, channel, pitch, tick = ev.tick(), "re-trigger while sounding");
                self.stats.retriggers += 1;
                self.close(key, prev, ev.tick(), ev.seconds);
            }
            self.sounding.insert(
                key,
                Sounding {
                    start_tick: ev.tick(),
                    start_seconds: ev.seconds,
                    velocity,
                },
            );
        } else if let Some(on) = self.sounding.remove(&key) {
            self.close(key, on, ev.tick(), ev.seconds);
        } else {
            debug!(track = key.0, channel, pitch, tick = ev.tick(), "note-off without a sounding note");
            self.stats.orphan_offs += 1;
        }
    }

    /// Close everything still sounding and return notes ordered by start.
    pub fn finish(mut self, end_tick: u64, end_seconds: f64) -> (Vec<Note>, NoteStats) {
        let pending = std::mem::take(&mut self.sounding);
        if !pending.is_empty() {
            debug!(count = pending.len(), "closing notes still sounding at end of file");
        }
        for (key, on) in pending {
            self.stats.force_closed += 1;
            self.close(key, on, end_tick.max(on.start_tick), end_seconds.max(on.start_seconds));
        }

        self.notes
            .sort_by_key(|n| (n.start_tick, n.track, n.channel, n.pitch, n.end_tick));
        (self.notes, self.stats)
    }

    fn close(&mut self, (track, channel, pitch): Key, on: Sounding, end_tick: u64, end_seconds: f64) {
        self.notes.push(Note {
            track,
            channel,
            pitch,
            velocity: on.velocity,
            start_tick: on.start_tick,
            end_tick,
            start_seconds: on.start_seconds,
            duration_seconds: (end_seconds - on.start_seconds).max(0.0),
        });
    }
}

/// Run the tracker over a whole timeline.
pub fn pair_notes(timeline: &Timeline) -> (Vec<Note>, NoteStats) {
    let mut tracker = NoteTracker::new();
    for ev in &timeline.events {
        tracker.feed(ev);
    }
    tracker.finish(timeline.end_tick, timeline.end_seconds)
}
