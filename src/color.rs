//! Display colors for tracks, channels and pitch classes.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const GREY: Rgb = Rgb { r: 0.5, g: 0.5, b: 0.5 };

    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let h = h.rem_euclid(1.0) * 6.0;
        let sector = h.floor() as u8;
        let f = h - h.floor();
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match sector {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Rgb { r, g, b }
    }

    pub fn scaled(self, k: f32) -> Self {
        Rgb {
            r: self.r * k,
            g: self.g * k,
            b: self.b * k,
        }
    }
}

/// Vivid but not saturated to the edge.
const SATURATION: f32 = 0.8;
const VALUE: f32 = 0.9;

/// Order `0..n` so neighbours in the result are far apart: middle first, then
/// alternating from the low and high ends.
pub fn max_gap_order(n: usize) -> Vec<usize> {
    let mut rest: std::collections::VecDeque<usize> = (0..n).collect();
    let mut out = Vec::with_capacity(n);
    if let Some(mid) = rest.remove(n / 2) {
        out.push(mid);
    }
    let mut front = true;
    while !rest.is_empty() {
        let next = if front { rest.pop_front() } else { rest.pop_back() };
        out.extend(next);
        front = !front;
    }
    out
}

/// `n` evenly spaced hues, handed out in max-gap order.
pub fn palette(n: usize) -> Vec<Rgb> {
    max_gap_order(n)
        .into_iter()
        .map(|i| Rgb::from_hsv(i as f32 / n as f32, SATURATION, VALUE))
        .collect()
}

pub fn channel_color(channel: u8) -> Rgb {
    let order = max_gap_order(16);
    let slot = order.get(usize::from(channel & 0x0F)).copied().unwrap_or(0);
    Rgb::from_hsv(slot as f32 / 16.0, SATURATION, VALUE)
}

/// One hue per semitone, C at red.
pub fn pitch_class_color(pitch: u8) -> Rgb {
    Rgb::from_hsv(f32::from(pitch % 12) / 12.0, SATURATION, VALUE)
}

/// Blue at the softest velocity of a track, shading to red at the loudest.
pub fn velocity_color(velocity: u8, min: u8, max: u8) -> Rgb {
    let span = f32::from(max.saturating_sub(min)) + 1.0;
    let t = (f32::from(velocity.saturating_sub(min)) / span).clamp(0.0, 1.0);
    Rgb::from_hsv((1.0 - t) * 2.0 / 3.0, SATURATION, VALUE)
}
