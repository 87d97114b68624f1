//! smf.rs
//!
//! Decoder for Standard MIDI Files (SMF formats 0, 1 and 2).
//!
//! ### File layout
//! - A header chunk `MThd`: format, number of track chunks, and the time
//!   division. Only metrical division (ticks per quarter note) is supported.
//! - One `MTrk` chunk per track. Each holds a stream of `(delta, event)` pairs
//!   where `delta` is a variable-length tick count since the previous event of
//!   the same track.
//! - Other chunk types may appear; they are skipped by their declared length.
//!
//! ### Running status
//! A channel message may omit its status byte when it repeats the previous
//! one. The decoder keeps the last channel status per track; it is reset for
//! every chunk so it never leaks from one track into the next.
//!
//! Events we don't interpret are kept (as `MetaOther`, `SysEx` or
//! `ChannelOther`) so the merged timeline stays complete.

use tracing::{debug, warn};

use crate::error::{MidiError, Result};
use crate::reader::ByteCursor;

const META_TRACK_NAME: u8 = 0x03;
const META_INSTRUMENT_NAME: u8 = 0x04;
pub const META_END_OF_TRACK: u8 = 0x2F;
const META_TEMPO: u8 = 0x51;

/// SMF container format from the header chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Format 0: one multi-channel track
    SingleTrack,
    /// Format 1: simultaneous tracks sharing one timeline
    Parallel,
    /// Format 2: independent sequential patterns
    Sequential,
}

impl Format {
    fn from_raw(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(Format::SingleTrack),
            1 => Ok(Format::Parallel),
            2 => Ok(Format::Sequential),
            other => Err(MidiError::UnsupportedFormat(other)),
        }
    }

    pub fn as_int(self) -> u16 {
        match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        }
    }
}

/// Decoded event payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Velocity 0 is left as-is here; the note tracker treats it as a release.
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    /// Aftertouch, channel pressure, pitch bend: `command` is the status high nibble.
    ChannelOther { command: u8, data: Vec<u8> },
    MetaTempo { micros_per_quarter: u32 },
    MetaTrackName(String),
    MetaInstrumentName(String),
    /// Any other meta event (end of track included), or a stray system message.
    MetaOther { meta_type: u8, data: Vec<u8> },
    SysEx(Vec<u8>),
}

/// One event as stored in its track, before cross-track merging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub track: usize,
    pub delta_ticks: u32,
    /// Running sum of deltas within the track
    pub absolute_tick: u64,
    /// 0..=15 for channel messages
    pub channel: Option<u8>,
    pub kind: EventKind,
}

impl RawEvent {
    pub fn is_end_of_track(&self) -> bool {
        matches!(
            self.kind,
            EventKind::MetaOther { meta_type: META_END_OF_TRACK, .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub index: usize,
    pub events: Vec<RawEvent>,
    /// First track-name meta event
    pub name: Option<String>,
    /// First instrument-name meta event
    pub instrument: Option<String>,
}

impl Track {
    /// Tick of the last event in the track.
    pub fn end_tick(&self) -> u64 {
        self.events.last().map(|e| e.absolute_tick).unwrap_or(0)
    }
}

/// Conditions the parser tolerated.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ParseWarning {
    #[error("skipped {length}-byte chunk {:?} at byte {offset}", String::from_utf8_lossy(.tag))]
    UnexpectedChunkType {
        tag: [u8; 4],
        offset: usize,
        length: usize,
    },
    #[error("track {track}: {bytes} bytes after end-of-track ignored")]
    TrailingTrackData { track: usize, bytes: usize },
    #[error("track {track}: no end-of-track event")]
    MissingEndOfTrack { track: usize },
    #[error("track {track}: status byte {byte:#04x} at byte {offset} where data was expected")]
    StatusByteAsData { track: usize, offset: usize, byte: u8 },
    #[error("track {track}: tempo event at byte {offset} has {len} data bytes, kept uninterpreted")]
    MalformedTempo {
        track: usize,
        offset: usize,
        len: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiFile {
    pub format: Format,
    pub ticks_per_quarter: u16,
    pub tracks: Vec<Track>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a complete SMF held in memory.
pub fn parse(bytes: &[u8]) -> Result<MidiFile> {
    let mut cur = ByteCursor::new(bytes);

    // Header: "MThd", length, format, ntrks, division
    let magic = cur.read_tag()?;
    if &magic != b"MThd" {
        return Err(MidiError::InvalidHeader("missing MThd chunk"));
    }
    let header_len = cur.read_u32()? as usize;
    if header_len < 6 {
        return Err(MidiError::InvalidHeader("header chunk shorter than 6 bytes"));
    }
    let format = Format::from_raw(cur.read_u16()?)?;
    let declared_tracks = cur.read_u16()? as usize;
    let division = cur.read_u16()?;
    cur.skip(header_len - 6)?;

    // High bit set means SMPTE frames/ticks-per-frame
    if division & 0x8000 != 0 || division == 0 {
        return Err(MidiError::UnsupportedTimeDivision(division));
    }

    let mut tracks = Vec::with_capacity(declared_tracks);
    let mut warnings = Vec::new();

    while tracks.len() < declared_tracks {
        let offset = cur.position();
        let tag = cur.read_tag()?;
        let length = cur.read_u32()? as usize;
        let body = cur.read_bytes(length)?;

        if &tag != b"MTrk" {
            let w = ParseWarning::UnexpectedChunkType { tag, offset, length };
            warn!("{w}");
            warnings.push(w);
            continue;
        }

        let index = tracks.len();
        let base = offset + 8;
        let track = decode_track(index, body, base, &mut warnings).map_err(|e| rebase(e, base))?;
        tracks.push(track);
    }

    if !cur.is_empty() {
        debug!(bytes = cur.remaining(), "ignoring data after the last declared track");
    }

    debug!(
        format = format.as_int(),
        ticks_per_quarter = division,
        tracks = tracks.len(),
        "parsed SMF"
    );

    Ok(MidiFile {
        format,
        ticks_per_quarter: division,
        tracks,
        warnings,
    })
}

/// Errors from a track body carry chunk-relative offsets; make them file-relative.
fn rebase(err: MidiError, base: usize) -> MidiError {
    match err {
        MidiError::TruncatedInput { offset, needed, available } => MidiError::TruncatedInput {
            offset: offset + base,
            needed,
            available,
        },
        MidiError::MalformedVarLength { offset } => MidiError::MalformedVarLength {
            offset: offset + base,
        },
        MidiError::MissingRunningStatus { track, offset } => MidiError::MissingRunningStatus {
            track,
            offset: offset + base,
        },
        other => other,
    }
}

/// Per-track decoding state.
struct TrackDecoder<'a> {
    cur: ByteCursor<'a>,
    index: usize,
    base: usize,
    running_status: Option<u8>,
}

fn decode_track(
    index: usize,
    body: &[u8],
    base: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Result<Track> {
    let mut dec = TrackDecoder {
        cur: ByteCursor::new(body),
        index,
        base,
        running_status: None,
    };

    let mut track = Track {
        index,
        events: Vec::new(),
        name: None,
        instrument: None,
    };
    let mut tick: u64 = 0;
    let mut ended = false;

    while !dec.cur.is_empty() {
        let delta = dec.cur.read_var_len()?;
        tick += u64::from(delta);
        let (channel, kind) = dec.next_event(warnings)?;

        match &kind {
            EventKind::MetaTrackName(name) if track.name.is_none() => {
                track.name = Some(name.clone());
            }
            EventKind::MetaInstrumentName(name) if track.instrument.is_none() => {
                track.instrument = Some(name.clone());
            }
            _ => {}
        }

        let event = RawEvent {
            track: index,
            delta_ticks: delta,
            absolute_tick: tick,
            channel,
            kind,
        };
        ended = event.is_end_of_track();
        track.events.push(event);
        if ended {
            break;
        }
    }

    if ended && !dec.cur.is_empty() {
        let w = ParseWarning::TrailingTrackData { track: index, bytes: dec.cur.remaining() };
        warn!("{w}");
        warnings.push(w);
    } else if !ended {
        let w = ParseWarning::MissingEndOfTrack { track: index };
        debug!("{w}");
        warnings.push(w);
    }

    Ok(track)
}

impl TrackDecoder<'_> {
    fn next_event(&mut self, warnings: &mut Vec<ParseWarning>) -> Result<(Option<u8>, EventKind)> {
        let offset = self.cur.position();
        let first = self.cur.peek()?;

        let status = if first & 0x80 != 0 {
            self.cur.read_u8()?;
            first
        } else {
            self.running_status.ok_or(MidiError::MissingRunningStatus {
                track: self.index,
                offset,
            })?
        };

        match status {
            0x80..=0xEF => {
                self.running_status = Some(status);
                let kind = self.channel_message(status, warnings)?;
                Ok((Some(status & 0x0F), kind))
            }
            0xFF => self.meta_event(warnings).map(|k| (None, k)),
            0xF0 | 0xF7 => {
                let len = self.cur.read_var_len()? as usize;
                let data = self.cur.read_bytes(len)?;
                Ok((None, EventKind::SysEx(data.to_vec())))
            }
            _ => {
                // System common/realtime bytes have no business in a file, but
                // their size is fixed so we can step over them.
                let len = match status {
                    0xF2 => 2,
                    0xF1 | 0xF3 => 1,
                    _ => 0,
                };
                let data = self.cur.read_bytes(len)?;
                Ok((
                    None,
                    EventKind::MetaOther {
                        meta_type: status,
                        data: data.to_vec(),
                    },
                ))
            }
        }
    }

    fn channel_message(&mut self, status: u8, warnings: &mut Vec<ParseWarning>) -> Result<EventKind> {
        let command = status & 0xF0;
        let kind = match command {
            0x80 => EventKind::NoteOff {
                key: self.data_byte(warnings)?,
                velocity: self.data_byte(warnings)?,
            },
            0x90 => EventKind::NoteOn {
                key: self.data_byte(warnings)?,
                velocity: self.data_byte(warnings)?,
            },
            0xB0 => EventKind::ControlChange {
                controller: self.data_byte(warnings)?,
                value: self.data_byte(warnings)?,
            },
            0xC0 => EventKind::ProgramChange {
                program: self.data_byte(warnings)?,
            },
            0xD0 => EventKind::ChannelOther {
                command,
                data: vec![self.data_byte(warnings)?],
            },
            // 0xA0 poly aftertouch, 0xE0 pitch bend
            _ => EventKind::ChannelOther {
                command,
                data: vec![self.data_byte(warnings)?, self.data_byte(warnings)?],
            },
        };
        Ok(kind)
    }

    fn meta_event(&mut self, warnings: &mut Vec<ParseWarning>) -> Result<EventKind> {
        let meta_type = self.cur.read_u8()?;
        let len = self.cur.read_var_len()? as usize;
        let offset = self.cur.position();
        let data = self.cur.read_bytes(len)?;

        let kind = match meta_type {
            META_TEMPO if data.len() == 3 => EventKind::MetaTempo {
                micros_per_quarter: ByteCursor::new(data).read_u24()?,
            },
            META_TEMPO => {
                let w = ParseWarning::MalformedTempo {
                    track: self.index,
                    offset: self.base + offset,
                    len,
                };
                warn!("{w}");
                warnings.push(w);
                EventKind::MetaOther {
                    meta_type,
                    data: data.to_vec(),
                }
            }
            META_TRACK_NAME => EventKind::MetaTrackName(latin1(data)),
            META_INSTRUMENT_NAME => EventKind::MetaInstrumentName(latin1(data)),
            _ => EventKind::MetaOther {
                meta_type,
                data: data.to_vec(),
            },
        };
        Ok(kind)
    }

    /// Data bytes are 7-bit. A set top bit is masked off and reported.
    fn data_byte(&mut self, warnings: &mut Vec<ParseWarning>) -> Result<u8> {
        let offset = self.cur.position();
        let byte = self.cur.read_u8()?;
        if byte & 0x80 != 0 {
            let w = ParseWarning::StatusByteAsData {
                track: self.index,
                offset: self.base + offset,
                byte,
            };
            warn!("{w}");
            warnings.push(w);
        }
        Ok(byte & 0x7F)
    }
}

/// Text meta events have no declared encoding; Latin-1 maps every byte.
fn latin1(data: &[u8]) -> String {
    data.iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end_matches('\0')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chunk, header, smf, TrackBytes};

    #[test]
    fn parses_header_and_tracks() {
        let bytes = smf(
            1,
            480,
            &[
                TrackBytes::new().tempo(0, 400_000).meta_text(0, 0x03, "Conductor").end(0),
                TrackBytes::new()
                    .meta_text(0, 0x03, "Piano")
                    .meta_text(0, 0x04, "Grand")
                    .note_on(0, 0, 60, 100)
                    .note_off(480, 0, 60)
                    .end(0),
            ],
        );
        let file = parse(&bytes).unwrap();
        assert_eq!(file.format, Format::Parallel);
        assert_eq!(file.ticks_per_quarter, 480);
        assert_eq!(file.tracks.len(), 2);
        assert!(file.warnings.is_empty());

        assert_eq!(file.tracks[0].name.as_deref(), Some("Conductor"));
        assert_eq!(
            file.tracks[0].events[0].kind,
            EventKind::MetaTempo { micros_per_quarter: 400_000 }
        );

        let piano = &file.tracks[1];
        assert_eq!(piano.name.as_deref(), Some("Piano"));
        assert_eq!(piano.instrument.as_deref(), Some("Grand"));
        assert_eq!(piano.events[2].channel, Some(0));
        assert_eq!(piano.events[2].kind, EventKind::NoteOn { key: 60, velocity: 100 });
        assert_eq!(piano.events[3].absolute_tick, 480);
        assert!(piano.events[4].is_end_of_track());
        assert_eq!(piano.end_tick(), 480);
    }

    #[test]
    fn running_status_reuses_previous_channel_status() {
        // 90 3C 64, then two data-only events, the last one a velocity-0 release
        let body = TrackBytes::new()
            .event(0, &[0x91, 0x3C, 0x64])
            .event(0x60, &[0x3E, 0x50])
            .event(0x60, &[0x3C, 0x00])
            .end(0);
        let file = parse(&smf(0, 96, &[body])).unwrap();
        let kinds: Vec<_> = file.tracks[0].events.iter().map(|e| (e.channel, e.kind.clone())).collect();
        assert_eq!(kinds[1], (Some(1), EventKind::NoteOn { key: 0x3E, velocity: 0x50 }));
        assert_eq!(kinds[2], (Some(1), EventKind::NoteOn { key: 0x3C, velocity: 0 }));
        assert_eq!(file.tracks[0].events[2].absolute_tick, 0xC0);
    }

    #[test]
    fn running_status_survives_meta_events() {
        let body = TrackBytes::new()
            .note_on(0, 2, 64, 90)
            .meta_text(0, 0x01, "cue")
            .event(10, &[64, 0])
            .end(0);
        let file = parse(&smf(0, 96, &[body])).unwrap();
        assert_eq!(
            file.tracks[0].events[2].kind,
            EventKind::NoteOn { key: 64, velocity: 0 }
        );
        assert_eq!(file.tracks[0].events[1].kind, EventKind::MetaOther { meta_type: 0x01, data: b"cue".to_vec() });
    }

    #[test]
    fn running_status_does_not_leak_across_tracks() {
        let first = TrackBytes::new().note_on(0, 0, 60, 100).end(0);
        let second = TrackBytes::new().event(0, &[0x3C, 0x40]).end(0);
        let bytes = smf(1, 480, &[first.clone(), second]);
        let err = parse(&bytes).unwrap_err();
        // header (14) + first chunk + 8-byte chunk header + 1-byte delta
        let offset = 14 + first.len() + 8 + 1;
        assert_eq!(err, MidiError::MissingRunningStatus { track: 1, offset });
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let mut bytes = header(0, 1, 480);
        bytes.extend(chunk(b"XFIH", &[1, 2, 3, 4, 5]));
        bytes.extend(TrackBytes::new().note_on(0, 0, 60, 1).end(10));
        let file = parse(&bytes).unwrap();
        assert_eq!(file.tracks.len(), 1);
        assert_eq!(
            file.warnings,
            vec![ParseWarning::UnexpectedChunkType { tag: *b"XFIH", offset: 14, length: 5 }]
        );
        assert_eq!(file.tracks[0].events.len(), 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = smf(0, 480, &[TrackBytes::new().end(0)]);
        bytes[0] = b'R';
        assert!(matches!(parse(&bytes), Err(MidiError::InvalidHeader(_))));
    }

    #[test]
    fn rejects_smpte_division() {
        let bytes = smf(0, 0xE728, &[TrackBytes::new().end(0)]);
        assert_eq!(parse(&bytes), Err(MidiError::UnsupportedTimeDivision(0xE728)));
    }

    #[test]
    fn rejects_unknown_format() {
        let bytes = smf(3, 480, &[]);
        assert_eq!(parse(&bytes), Err(MidiError::UnsupportedFormat(3)));
    }

    #[test]
    fn truncated_track_is_fatal() {
        let mut bytes = smf(0, 480, &[TrackBytes::new().note_on(0, 0, 60, 100).end(0)]);
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(parse(&bytes), Err(MidiError::TruncatedInput { .. })));
    }

    #[test]
    fn missing_declared_track_is_fatal() {
        let mut bytes = header(1, 2, 480);
        bytes.extend(TrackBytes::new().end(0));
        assert!(matches!(parse(&bytes), Err(MidiError::TruncatedInput { .. })));
    }

    #[test]
    fn event_cut_inside_chunk_is_fatal() {
        // Chunk length is honest but the note-on lacks its velocity byte.
        let body = TrackBytes::new().event(0, &[0x90, 0x3C]).chunk();
        let err = parse(&smf(0, 480, &[body])).unwrap_err();
        assert_eq!(err, MidiError::TruncatedInput { offset: 14 + 8 + 3, needed: 1, available: 0 });
    }

    #[test]
    fn keeps_sysex_and_other_channel_messages() {
        let body = TrackBytes::new()
            .event(0, &[0xF0, 0x03, 0x7E, 0x7F, 0xF7])
            .event(0, &[0xE0, 0x00, 0x40])
            .event(0, &[0xD3, 0x22])
            .event(0, &[0xB0, 0x07, 0x64])
            .end(0);
        let file = parse(&smf(0, 480, &[body])).unwrap();
        let events = &file.tracks[0].events;
        assert_eq!(events[0].kind, EventKind::SysEx(vec![0x7E, 0x7F, 0xF7]));
        assert_eq!(events[0].channel, None);
        assert_eq!(events[1].kind, EventKind::ChannelOther { command: 0xE0, data: vec![0x00, 0x40] });
        assert_eq!(events[2].kind, EventKind::ChannelOther { command: 0xD0, data: vec![0x22] });
        assert_eq!(events[2].channel, Some(3));
        assert_eq!(events[3].kind, EventKind::ControlChange { controller: 7, value: 100 });
    }

    #[test]
    fn short_tempo_is_kept_as_other() {
        let body = TrackBytes::new().event(0, &[0xFF, 0x51, 0x02, 0x07, 0xA1]).end(0);
        let file = parse(&smf(0, 480, &[body])).unwrap();
        assert!(matches!(file.tracks[0].events[0].kind, EventKind::MetaOther { meta_type: 0x51, .. }));
        assert!(matches!(file.warnings[0], ParseWarning::MalformedTempo { track: 0, len: 2, .. }));
    }

    #[test]
    fn data_after_end_of_track_is_ignored() {
        let body = TrackBytes::new()
            .event(0, &[0xFF, 0x2F, 0x00])
            .note_on(0, 0, 60, 100)
            .chunk();
        let file = parse(&smf(0, 480, &[body])).unwrap();
        assert_eq!(file.tracks[0].events.len(), 1);
        assert_eq!(file.warnings, vec![ParseWarning::TrailingTrackData { track: 0, bytes: 4 }]);
    }

    #[test]
    fn high_bit_in_data_byte_is_masked_and_reported() {
        let body = TrackBytes::new().event(0, &[0x90, 0x3C, 0xE4]).end(0);
        let file = parse(&smf(0, 480, &[body])).unwrap();
        assert_eq!(file.tracks[0].events[0].kind, EventKind::NoteOn { key: 0x3C, velocity: 0x64 });
        assert_eq!(
            file.warnings,
            vec![ParseWarning::StatusByteAsData { track: 0, offset: 14 + 8 + 3, byte: 0xE4 }]
        );
        assert_eq!(
            file.warnings[0].to_string(),
            "track 0: status byte 0xe4 at byte 25 where data was expected"
        );
    }

    #[test]
    fn track_names_decode_as_latin1() {
        let body = TrackBytes::new().event(0, &[0xFF, 0x03, 0x04, b'C', 0xE9, b'l', 0x00]).end(0);
        let file = parse(&smf(0, 480, &[body])).unwrap();
        assert_eq!(file.tracks[0].name.as_deref(), Some("C\u{e9}l"));
    }
}
