//! Tempo map: tick → seconds conversion under tempo changes.
//!
//! Tempo meta events may sit on any track. They are gathered into breakpoints
//! sorted by tick, each carrying the elapsed seconds at that tick, so a lookup
//! is a binary search plus one linear step.

use tracing::debug;

use crate::smf::{EventKind, MidiFile};

/// 500,000 µs per quarter note = 120 BPM, the SMF default.
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoBreakpoint {
    pub tick: u64,
    pub micros_per_quarter: u32,
    /// Elapsed seconds at `tick`
    pub seconds: f64,
}

impl TempoBreakpoint {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.micros_per_quarter.max(1))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    ticks_per_quarter: u16,
    /// Never empty, first entry at tick 0
    breakpoints: Vec<TempoBreakpoint>,
}

impl TempoMap {
    /// Collect tempo events from every track of `file`.
    pub fn build(file: &MidiFile) -> Self {
        let mut changes: Vec<(u64, usize, usize, u32)> = Vec::new();
        for track in &file.tracks {
            for (seq, ev) in track.events.iter().enumerate() {
                if let EventKind::MetaTempo { micros_per_quarter } = ev.kind {
                    changes.push((ev.absolute_tick, track.index, seq, micros_per_quarter));
                }
            }
        }
        if changes.is_empty() {
            debug!("no tempo events, assuming 120 BPM");
        }
        changes.sort_by_key(|&(tick, track, seq, _)| (tick, track, seq));

        let pairs: Vec<(u64, u32)> = changes.into_iter().map(|(tick, _, _, us)| (tick, us)).collect();
        Self::from_changes(file.ticks_per_quarter, &pairs)
    }

    /// Build from `(tick, µs per quarter)` pairs already in merge order.
    ///
    /// Equal ticks keep the last value; a default breakpoint is inserted at
    /// tick 0 when the first change comes later.
    pub fn from_changes(ticks_per_quarter: u16, changes: &[(u64, u32)]) -> Self {
        let mut points: Vec<(u64, u32)> = Vec::with_capacity(changes.len() + 1);
        let mut sorted = changes.to_vec();
        sorted.sort_by_key(|&(tick, _)| tick);

        for (tick, us) in sorted {
            match points.last_mut() {
                Some(last) if last.0 == tick => last.1 = us,
                _ => points.push((tick, us)),
            }
        }
        if points.first().is_none_or(|&(tick, _)| tick > 0) {
            points.insert(0, (0, DEFAULT_MICROS_PER_QUARTER));
        }

        let tpq = f64::from(ticks_per_quarter.max(1));
        let mut breakpoints = Vec::with_capacity(points.len());
        let mut seconds = 0.0;
        let mut prev: Option<(u64, u32)> = None;
        for (tick, us) in points {
            if let Some((prev_tick, prev_us)) = prev {
                seconds += span_seconds(tick - prev_tick, prev_us, tpq);
            }
            breakpoints.push(TempoBreakpoint {
                tick,
                micros_per_quarter: us,
                seconds,
            });
            prev = Some((tick, us));
        }

        Self {
            ticks_per_quarter,
            breakpoints,
        }
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn breakpoints(&self) -> &[TempoBreakpoint] {
        &self.breakpoints
    }

    /// Tempo in effect at tick 0.
    pub fn initial_micros_per_quarter(&self) -> u32 {
        self.breakpoints[0].micros_per_quarter
    }

    pub fn bpm_at(&self, tick: u64) -> f64 {
        self.breakpoint_at(tick).bpm()
    }

    /// Absolute seconds at `tick`.
    pub fn ticks_to_seconds(&self, tick: u64) -> f64 {
        let bp = self.breakpoint_at(tick);
        bp.seconds
            + span_seconds(
                tick - bp.tick,
                bp.micros_per_quarter,
                f64::from(self.ticks_per_quarter.max(1)),
            )
    }

    fn breakpoint_at(&self, tick: u64) -> &TempoBreakpoint {
        // breakpoints[0].tick == 0, so the partition point is at least 1
        let idx = self.breakpoints.partition_point(|bp| bp.tick <= tick);
        &self.breakpoints[idx.saturating_sub(1)]
    }
}

fn span_seconds(ticks: u64, micros_per_quarter: u32, tpq: f64) -> f64 {
    ticks as f64 * f64::from(micros_per_quarter) / tpq / 1_000_000.0
}
