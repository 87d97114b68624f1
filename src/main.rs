use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use midiviz::timeline::format_duration;
use midiviz::{compile_file, default_audio, AnimationPreset, ColorSource, Compiled, MapperConfig, Style, TrackMask};

#[derive(Parser, Debug)]
#[command(version, about = "Compile a MIDI file into a timeline of visual events")]
struct Opt {
    /// Standard MIDI File (.mid)
    midi: PathBuf,
    #[arg(short, long, value_enum, default_value_t = Style::BarGraph)]
    style: Style,
    /// TOML file with visualization settings
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Scene units per second along the time axis
    #[arg(long)]
    speed: Option<f32>,
    #[arg(long, value_enum)]
    color_by: Option<ColorSource>,
    /// How bars show a sounding note
    #[arg(long, value_enum)]
    preset: Option<AnimationPreset>,
    /// Seconds a finished note stays visible
    #[arg(long)]
    trail: Option<f64>,
    /// Tracks to visualize: `*` or a list such as `0-5,7`
    #[arg(long)]
    tracks: Option<TrackMask>,
    /// Soundtrack path recorded in the output document; defaults to a `.mp3`
    /// next to the MIDI file when one exists
    #[arg(long)]
    audio: Option<PathBuf>,
    /// Write the JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print what the file contains and exit
    #[arg(long)]
    summary: bool,
}

/// Defaults, then the config file, then flags.
fn settings(opt: &Opt) -> Result<MapperConfig> {
    let mut config = match &opt.config {
        Some(path) => MapperConfig::load(path)?,
        None => MapperConfig::default(),
    };
    if let Some(speed) = opt.speed {
        config.layout_speed = speed;
    }
    if let Some(color_by) = opt.color_by {
        config.color_by = color_by;
    }
    if let Some(preset) = opt.preset {
        config.preset = preset;
    }
    if let Some(trail) = opt.trail {
        config.trail_duration = trail;
    }
    if let Some(mask) = &opt.tracks {
        config.track_mask = mask.clone();
    }
    Ok(config)
}

fn print_summary(c: &Compiled) {
    let initial = c.tempo.initial_micros_per_quarter();
    println!("Format: SMF {}", c.file.format.as_int());
    println!("PPQ: {}", c.file.ticks_per_quarter);
    println!(
        "Initial tempo: {} µs/qn (~{:.1} BPM)",
        initial,
        60_000_000.0 / f64::from(initial)
    );
    if c.tempo.breakpoints().len() > 1 {
        println!("Tempo changes: {}", c.tempo.breakpoints().len() - 1);
    }
    println!("Total events parsed: {}", c.timeline.len());
    println!("Notes: {}", c.notes.len());
    println!("Estimated track length: {}", format_duration(c.duration_seconds()));
    for w in &c.file.warnings {
        println!("Warning: {}", w);
    }

    println!("\nTracks:");
    for t in &c.tracks {
        if t.has_notes() {
            println!(
                "  {:>2} {:<24} {:>5} notes  pitch {}-{}  ch {:?}",
                t.index,
                t.display_name(),
                t.note_count,
                t.pitch_min,
                t.pitch_max,
                t.channels
            );
        } else {
            println!("  {:>2} {:<24}     - no notes", t.index, t.display_name());
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::parse();
    let config = settings(&opt)?;
    let compiled = compile_file(&opt.midi)?;

    if opt.summary {
        print_summary(&compiled);
        return Ok(());
    }

    let audio = opt.audio.clone().or_else(|| {
        let found = default_audio(&opt.midi);
        if let Some(path) = &found {
            info!("using soundtrack {:?}", path);
        }
        found
    });
    let doc = compiled.animation(opt.style, &config, audio);
    let out: Box<dyn Write> = match &opt.output {
        Some(path) => Box::new(File::create(path).with_context(|| format!("creating {:?}", path))?),
        None => Box::new(stdout().lock()),
    };
    let mut out = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut out, &doc).context("writing animation JSON")?;
    writeln!(out)?;
    out.flush()?;

    if let Some(path) = &opt.output {
        info!(events = doc.events.len(), "wrote {:?}", path);
    }
    Ok(())
}
