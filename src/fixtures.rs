//! Hand-assembled SMF bytes for unit tests.

pub(crate) fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut groups = [0u8; 4];
    let mut n = 0;
    loop {
        groups[n] = (value & 0x7F) as u8;
        n += 1;
        value >>= 7;
        if value == 0 || n == groups.len() {
            break;
        }
    }
    for i in (0..n).rev() {
        let more = if i == 0 { 0 } else { 0x80 };
        buf.push(groups[i] | more);
    }
}

pub(crate) fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(tag);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

pub(crate) fn header(format: u16, ntrks: u16, division: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(6);
    body.extend_from_slice(&format.to_be_bytes());
    body.extend_from_slice(&ntrks.to_be_bytes());
    body.extend_from_slice(&division.to_be_bytes());
    chunk(b"MThd", &body)
}

/// A complete file whose declared track count matches `tracks`.
pub(crate) fn smf(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = header(format, tracks.len() as u16, division);
    for t in tracks {
        out.extend_from_slice(t);
    }
    out
}

/// Builds the body of an `MTrk` chunk event by event.
#[derive(Default)]
pub(crate) struct TrackBytes {
    bytes: Vec<u8>,
}

impl TrackBytes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn event(mut self, delta: u32, data: &[u8]) -> Self {
        write_vlq(&mut self.bytes, delta);
        self.bytes.extend_from_slice(data);
        self
    }

    pub(crate) fn note_on(self, delta: u32, channel: u8, key: u8, velocity: u8) -> Self {
        self.event(delta, &[0x90 | channel, key, velocity])
    }

    pub(crate) fn note_off(self, delta: u32, channel: u8, key: u8) -> Self {
        self.event(delta, &[0x80 | channel, key, 0x40])
    }

    pub(crate) fn program(self, delta: u32, channel: u8, program: u8) -> Self {
        self.event(delta, &[0xC0 | channel, program])
    }

    pub(crate) fn tempo(self, delta: u32, micros_per_quarter: u32) -> Self {
        let b = micros_per_quarter.to_be_bytes();
        self.event(delta, &[0xFF, 0x51, 0x03, b[1], b[2], b[3]])
    }

    pub(crate) fn meta_text(self, delta: u32, meta_type: u8, text: &str) -> Self {
        let mut data = vec![0xFF, meta_type];
        write_vlq(&mut data, text.len() as u32);
        data.extend_from_slice(text.as_bytes());
        self.event(delta, &data)
    }

    /// Append end-of-track and wrap everything in an `MTrk` chunk.
    pub(crate) fn end(self, delta: u32) -> Vec<u8> {
        self.event(delta, &[0xFF, 0x2F, 0x00]).chunk()
    }

    pub(crate) fn chunk(self) -> Vec<u8> {
        chunk(b"MTrk", &self.bytes)
    }
}
