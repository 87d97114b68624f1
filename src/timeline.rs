//! timeline.rs
//!
//! Flattens every track of a parsed file into one chronological event list and
//! stamps each event with its absolute time in seconds.
//!
//! Ordering is decided here and only here: events sort by absolute tick, then
//! by track index, then by their position inside the track. The sort is
//! stable, so identical input always produces the identical sequence.

use crate::smf::{MidiFile, RawEvent};
use crate::tempo::TempoMap;

/// A raw event placed on the global timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    pub event: RawEvent,
    /// Index of the event within its own track
    pub seq: usize,
    pub seconds: f64,
}

impl TimedEvent {
    pub fn tick(&self) -> u64 {
        self.event.absolute_tick
    }

    pub fn track(&self) -> usize {
        self.event.track
    }
}

/// The merged result of a MIDI file.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    /// All events from all tracks, ordered by time
    pub events: Vec<TimedEvent>,
    /// Tick of the last event
    pub end_tick: u64,
    /// Time of the last event (seconds)
    pub end_seconds: f64,
    /// Pulses per quarter note (from header)
    pub ticks_per_quarter: u16,
    /// Tempo at tick 0
    pub initial_micros_per_quarter: u32,
}

impl Timeline {
    pub fn merge(file: &MidiFile, tempo: &TempoMap) -> Self {
        let mut events: Vec<TimedEvent> = file
            .tracks
            .iter()
            .flat_map(|track| {
                track.events.iter().enumerate().map(|(seq, ev)| TimedEvent {
                    seconds: tempo.ticks_to_seconds(ev.absolute_tick),
                    event: ev.clone(),
                    seq,
                })
            })
            .collect();

        events.sort_by_key(|e| (e.event.absolute_tick, e.event.track, e.seq));

        let (end_tick, end_seconds) = events
            .last()
            .map(|e| (e.event.absolute_tick, e.seconds))
            .unwrap_or((0, 0.0));

        Timeline {
            events,
            end_tick,
            end_seconds,
            ticks_per_quarter: file.ticks_per_quarter,
            initial_micros_per_quarter: tempo.initial_micros_per_quarter(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Format a time in seconds as MM:SS for summaries and logs.
pub fn format_duration(seconds: f64) -> String {
    let total_secs = seconds.max(0.0) as u64;
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}", mins, secs)
}
