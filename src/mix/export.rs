//! The export pipeline: fast copy path, degraded mixes, and the `ffmpeg`
//! process itself.

use super::filter::{self, AuxInput};
use super::probe::probe_duration;
use super::{MixError, MixRequest, MixSummary};
use crate::audio::clamp_volume;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{info, warn};

/// Progress is held below this fraction until the output file is confirmed
/// on disk, then reported as exactly 1.0.
const PROGRESS_CAP: f32 = 0.99;

/// Mixes the configured beds into a video's audio track.
///
/// The video stream is always stream-copied. When no bed survives the
/// existence check and the video volume is exactly 1.0, the input is copied
/// byte-for-byte without spawning any process, an explicit fast path.
///
/// Missing *optional* beds are logged and skipped; the export still
/// succeeds with whatever inputs remain. Only a missing source video, a
/// probe failure, or a failing `ffmpeg` run produce an error, and every
/// error is returned as a [`MixError`] value; nothing panics across this
/// boundary.
///
/// # Arguments
///
/// * `request` - The export job
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Errors
///
/// Returns [`MixError`] describing the first fatal failure.
pub fn mix<F>(request: &MixRequest, mut progress_callback: Option<F>) -> Result<MixSummary, MixError>
where
    F: FnMut(f32),
{
    let started = Instant::now();

    if !request.video_path.is_file() {
        return Err(MixError::MissingVideo(request.video_path.clone()));
    }

    let aux = resolve_beds(request);
    let video_volume = clamp_volume(request.video_volume);

    if aux.is_empty() && video_volume == 1.0 {
        // Nothing to mix: copy the file byte-for-byte instead of running a
        // do-nothing encode.
        fs::copy(&request.video_path, &request.output_path)?;
        let output_bytes = fs::metadata(&request.output_path)?.len();
        if let Some(cb) = progress_callback.as_mut() {
            cb(1.0);
        }
        info!(
            output = %request.output_path.display(),
            "no beds and unity volume, copied source unchanged"
        );
        return Ok(MixSummary {
            output_path: request.output_path.clone(),
            duration_seconds: None,
            output_bytes,
            elapsed: started.elapsed(),
            copied: true,
        });
    }

    let duration = probe_duration(&request.video_path)?;
    let plan = filter::plan(
        duration,
        video_volume,
        &aux,
        request.fade_in,
        request.fade_out,
    );

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]);
    cmd.arg("-i").arg(&request.video_path);
    for input in &plan.inputs {
        cmd.arg("-i").arg(input);
    }
    cmd.arg("-filter_complex").arg(&plan.filter_complex);
    cmd.args(&plan.output_args);
    cmd.args(["-progress", "pipe:1"]);
    cmd.arg(&request.output_path);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| MixError::Spawn {
        binary: "ffmpeg".to_string(),
        source: e,
    })?;

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if let Some(fraction) = parse_progress_line(&line, duration) {
                if let Some(cb) = progress_callback.as_mut() {
                    cb(fraction.min(PROGRESS_CAP));
                }
            }
        }
    }

    let mut stderr_text = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut stderr_text);
    }
    let status = child.wait()?;

    if !status.success() {
        return Err(MixError::Process {
            binary: "ffmpeg".to_string(),
            status: status.to_string(),
            message: stderr_text.trim().to_string(),
        });
    }

    let output_bytes = fs::metadata(&request.output_path)
        .map_err(|_| MixError::MissingOutput(request.output_path.clone()))?
        .len();
    if let Some(cb) = progress_callback.as_mut() {
        cb(1.0);
    }
    info!(
        output = %request.output_path.display(),
        beds = aux.len(),
        duration,
        "mix export finished"
    );

    Ok(MixSummary {
        output_path: request.output_path.clone(),
        duration_seconds: Some(duration),
        output_bytes,
        elapsed: started.elapsed(),
        copied: false,
    })
}

/// Keeps only the beds that actually exist on disk.
///
/// A configured bed whose file is missing is a warning, never a failure:
/// the export degrades to the remaining inputs.
fn resolve_beds(request: &MixRequest) -> Vec<AuxInput> {
    let mut beds = Vec::new();
    let configured = [
        ("music", &request.music_path, request.music_volume),
        ("tone", &request.tone_path, request.tone_volume),
    ];
    for (what, path, volume) in configured {
        let Some(path) = path else {
            continue;
        };
        if path.is_file() {
            beds.push(AuxInput {
                path: path.clone(),
                volume,
            });
        } else {
            warn!(bed = what, path = %path.display(), "bed file not found, mixing without it");
        }
    }
    beds
}

/// Extracts a completion fraction from one `-progress pipe:1` line.
///
/// ffmpeg's `out_time_ms` key carries microseconds despite its name, so
/// both keys are scaled identically.
fn parse_progress_line(line: &str, duration: f64) -> Option<f32> {
    let micros: f64 = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?
        .trim()
        .parse()
        .ok()?;
    if duration <= 0.0 || micros < 0.0 {
        return None;
    }
    Some(((micros / 1_000_000.0) / duration) as f32)
}

/// Convenience wrapper for callers without a progress observer.
pub fn mix_silent(request: &MixRequest) -> Result<MixSummary, MixError> {
    mix(request, None::<fn(f32)>)
}
