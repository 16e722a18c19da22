//! soundbed - audio-bed mixing for short-form video.
//!
//! Command-line front end for the mixing engine. It can list the built-in
//! frequency presets, render a preset to a WAV file, and run an offline mix
//! that lays music and tone beds under a video via the external `ffmpeg`
//! binary.
//!
//! # Usage
//!
//! ```bash
//! soundbed presets
//! soundbed tone --preset binaural-alpha --duration 30 --output alpha.wav
//! soundbed mix --video clip.mp4 --output mixed.mp4 --music bed.mp3 \
//!     --preset solfeggio-528 --music-volume 0.2 --fade-in 2 --fade-out 3
//! soundbed mix --job job.json
//! ```

use anyhow::{Context, Result};
use soundbed::mix::{mix, probe_duration, MixRequest};
use soundbed::tone::{self, catalog, find_option};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

fn main() -> Result<()> {
    // Initialize logging (optional, for debugging)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("presets") => run_presets(),
        Some("tone") => run_tone(&args[2..]),
        Some("mix") => run_mix(&args[2..]),
        Some("--help") | Some("-h") | None => {
            print_usage(&args);
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    }
}

fn print_usage(args: &[String]) {
    eprintln!("soundbed - audio-bed mixing for short-form video");
    eprintln!();
    eprintln!(
        "Usage: {} <command> [OPTIONS]",
        args.first().map(String::as_str).unwrap_or("soundbed")
    );
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  presets                List the built-in frequency presets");
    eprintln!("  tone                   Render a preset to a WAV file");
    eprintln!("    --preset ID          Preset id (see `presets`)");
    eprintln!("    --duration SECONDS   Length to render (default 30)");
    eprintln!("    --output PATH        Output WAV path");
    eprintln!("  mix                    Mix beds under a video (needs ffmpeg)");
    eprintln!("    --job PATH           Load the whole job from a JSON file");
    eprintln!("    --video PATH         Source video");
    eprintln!("    --output PATH        Output video");
    eprintln!("    --music PATH         Background music file (optional)");
    eprintln!("    --preset ID          Frequency preset to lay under (optional)");
    eprintln!("    --music-volume V     Music volume 0..1 (default 0.3)");
    eprintln!("    --tone-volume V      Tone volume 0..1 (default 0.15)");
    eprintln!("    --video-volume V     Source audio volume 0..1 (default 1)");
    eprintln!("    --fade-in SECONDS    Bed fade-in (default 0)");
    eprintln!("    --fade-out SECONDS   Bed fade-out (default 0)");
}

fn run_presets() -> Result<()> {
    for option in catalog() {
        let detail = match option.kind {
            tone::ToneKind::None => "-".to_string(),
            tone::ToneKind::Pure { frequency_hz } => format!("pure {} Hz", frequency_hz),
            tone::ToneKind::Binaural { base_hz, offset_hz } => {
                format!("binaural {} Hz / {} Hz", base_hz, base_hz + offset_hz)
            }
        };
        println!("{:<16} {:<28} {}", option.id, option.label, detail);
    }
    Ok(())
}

fn run_tone(args: &[String]) -> Result<()> {
    let mut preset: Option<String> = None;
    let mut duration = 30.0f64;
    let mut output: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--preset" => {
                i += 1;
                preset = Some(require_value(args, i, "--preset")?);
            }
            "--duration" => {
                i += 1;
                duration = require_value(args, i, "--duration")?
                    .parse()
                    .context("--duration must be a number of seconds")?;
            }
            "--output" => {
                i += 1;
                output = Some(PathBuf::from(require_value(args, i, "--output")?));
            }
            other => {
                eprintln!("Unknown option: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let preset = preset.context("--preset is required (see `soundbed presets`)")?;
    let output = output.context("--output is required")?;
    let option =
        find_option(&preset).with_context(|| format!("unknown preset '{}'", preset))?;

    let buffer = tone::from_option(option, duration, tone::SAMPLE_RATE)?
        .with_context(|| format!("preset '{}' is the no-tone sentinel", preset))?;
    tone::write_wav(&buffer, &output)?;
    println!(
        "Rendered {} ({:.1}s) to {}",
        option.label,
        buffer.duration_seconds(),
        output.display()
    );
    Ok(())
}

fn run_mix(args: &[String]) -> Result<()> {
    let mut job: Option<PathBuf> = None;
    let mut video: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut music: Option<PathBuf> = None;
    let mut preset: Option<String> = None;
    let mut music_volume: Option<f32> = None;
    let mut tone_volume: Option<f32> = None;
    let mut video_volume: Option<f32> = None;
    let mut fade_in: Option<f64> = None;
    let mut fade_out: Option<f64> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--job" => {
                i += 1;
                job = Some(PathBuf::from(require_value(args, i, "--job")?));
            }
            "--video" => {
                i += 1;
                video = Some(PathBuf::from(require_value(args, i, "--video")?));
            }
            "--output" => {
                i += 1;
                output = Some(PathBuf::from(require_value(args, i, "--output")?));
            }
            "--music" => {
                i += 1;
                music = Some(PathBuf::from(require_value(args, i, "--music")?));
            }
            "--preset" => {
                i += 1;
                preset = Some(require_value(args, i, "--preset")?);
            }
            "--music-volume" => {
                i += 1;
                music_volume = Some(parse_number(args, i, "--music-volume")?);
            }
            "--tone-volume" => {
                i += 1;
                tone_volume = Some(parse_number(args, i, "--tone-volume")?);
            }
            "--video-volume" => {
                i += 1;
                video_volume = Some(parse_number(args, i, "--video-volume")?);
            }
            "--fade-in" => {
                i += 1;
                fade_in = Some(parse_number(args, i, "--fade-in")?);
            }
            "--fade-out" => {
                i += 1;
                fade_out = Some(parse_number(args, i, "--fade-out")?);
            }
            other => {
                eprintln!("Unknown option: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut request = match job {
        Some(path) => MixRequest::load_from_file(&path)
            .with_context(|| format!("failed to load job file {}", path.display()))?,
        None => {
            let video = video.context("--video is required (or use --job)")?;
            let output = output.context("--output is required (or use --job)")?;
            MixRequest::new(video, output)
        }
    };

    if let Some(path) = music {
        request.music_path = Some(path);
    }
    if let Some(v) = music_volume {
        request.music_volume = v;
    }
    if let Some(v) = tone_volume {
        request.tone_volume = v;
    }
    if let Some(v) = video_volume {
        request.video_volume = v;
    }
    if let Some(v) = fade_in {
        request.fade_in = v;
    }
    if let Some(v) = fade_out {
        request.fade_out = v;
    }

    // A preset bed is synthesized into a throwaway WAV matched to the
    // video's length; the temp directory must outlive the mix call.
    let mut _temp_dir = None;
    if let Some(preset) = preset {
        let option =
            find_option(&preset).with_context(|| format!("unknown preset '{}'", preset))?;
        let duration = probe_duration(&request.video_path)?;
        if let Some(buffer) = tone::from_option(option, duration, tone::SAMPLE_RATE)? {
            let dir = tempfile::tempdir().context("failed to create temp directory")?;
            let tone_path = dir.path().join(format!("tone-{}.wav", Uuid::new_v4()));
            tone::write_wav(&buffer, &tone_path)?;
            request.tone_path = Some(tone_path);
            _temp_dir = Some(dir);
        }
    }

    let summary = mix(
        &request,
        Some(|progress: f32| {
            print!("\rMixing... {:3.0}%", progress * 100.0);
            let _ = std::io::stdout().flush();
        }),
    )?;
    println!();

    if summary.copied {
        println!(
            "Copied source unchanged to {}",
            summary.output_path.display()
        );
    } else {
        println!("Mixed to {}", summary.output_path.display());
    }
    println!(
        "{} bytes in {:.1}s{}",
        summary.output_bytes,
        summary.elapsed.as_secs_f64(),
        summary
            .duration_seconds
            .map(|d| format!(" ({:.2}s of audio)", d))
            .unwrap_or_default()
    );
    Ok(())
}

fn require_value(args: &[String], index: usize, flag: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .with_context(|| format!("{} requires a value", flag))
}

fn parse_number<T: std::str::FromStr>(args: &[String], index: usize, flag: &str) -> Result<T> {
    require_value(args, index, flag)?
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a number", flag))
}
