//! Visualization settings: what the caller may tune per style.
//!
//! Settings come from defaults, optionally overlaid by a TOML file, optionally
//! overlaid by command-line flags (see `main.rs`).

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which attribute of a note picks its color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ColorSource {
    #[default]
    Track,
    Channel,
}

/// How bar-like styles (bar graph, strip, waterfall) show a sounding note.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AnimationPreset {
    /// Grow along z with velocity
    #[default]
    ZScale,
    /// Light up in a hue from blue (softest on the track) to red (loudest)
    B2rLight,
    /// Light up in the note's track or channel color
    MultiLight,
}

/// Selection of tracks to visualize: `*`, or indices and inclusive ranges
/// such as `0-5,7,9-12`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrackMask {
    #[default]
    All,
    Only(BTreeSet<usize>),
}

impl TrackMask {
    pub fn contains(&self, track: usize) -> bool {
        match self {
            TrackMask::All => true,
            TrackMask::Only(set) => set.contains(&track),
        }
    }
}

impl FromStr for TrackMask {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(TrackMask::All);
        }
        let invalid = |seg: &str| ConfigError::InvalidTrackMask(seg.to_string());
        let mut set = BTreeSet::new();
        for seg in s.split(',').map(str::trim) {
            match seg.split_once('-') {
                Some((lo, hi)) => {
                    let lo: usize = lo.trim().parse().map_err(|_| invalid(seg))?;
                    let hi: usize = hi.trim().parse().map_err(|_| invalid(seg))?;
                    if lo > hi {
                        return Err(invalid(seg));
                    }
                    set.extend(lo..=hi);
                }
                None => {
                    set.insert(seg.parse().map_err(|_| invalid(seg))?);
                }
            }
        }
        Ok(TrackMask::Only(set))
    }
}

impl TryFrom<String> for TrackMask {
    type Error = ConfigError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for TrackMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackMask::All => f.write_str("*"),
            TrackMask::Only(set) => {
                let parts: Vec<String> = set.iter().map(|i| i.to_string()).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl From<TrackMask> for String {
    fn from(mask: TrackMask) -> Self {
        mask.to_string()
    }
}

/// Settings consumed by the visual mappers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Scene units per second along the time axis (strip, waterfall)
    pub layout_speed: f32,
    pub color_by: ColorSource,
    pub preset: AnimationPreset,
    /// Seconds a finished note stays visible before it is destroyed
    pub trail_duration: f64,
    pub track_mask: TrackMask,
    /// Fountain: flight time from emitter to target, in seconds
    pub lead_time: f64,
    /// Fireworks: particle lifetime, in seconds
    pub particle_lifetime: f64,
    /// Waterfall: height the falling drops start from
    pub fall_height: f32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            layout_speed: 4.0,
            color_by: ColorSource::Track,
            preset: AnimationPreset::ZScale,
            trail_duration: 2.0,
            track_mask: TrackMask::All,
            lead_time: 3.0,
            particle_lifetime: 2.0,
            fall_height: 10.0,
        }
    }
}

impl MapperConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parsing visualization config")
    }

    /// Load a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {:?}", path))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {:?}", path))
    }
}
