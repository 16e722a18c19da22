//! Offline mix export.
//!
//! Produces a new video file whose audio is the original track mixed with
//! optional looped and faded music/tone beds, by driving the externally
//! installed `ffmpeg` binary with a generated filter graph. The video stream
//! is always stream-copied, never re-encoded.

mod export;
mod filter;
mod probe;

pub use export::{mix, mix_silent};
pub use probe::probe_duration;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Audio bitrate for the re-encoded mixed track.
pub const AUDIO_BITRATE: &str = "192k";

/// One export job: where the inputs live and how loud each of them is.
///
/// Constructed once per export and never mutated afterwards. Serializable so
/// jobs can be described in JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixRequest {
    /// Source video whose audio gets the bed mixed in.
    pub video_path: PathBuf,

    /// Where the mixed video is written.
    pub output_path: PathBuf,

    /// Optional background-music file, looped and faded to the video length.
    #[serde(default)]
    pub music_path: Option<PathBuf>,

    /// Optional frequency-tone file, looped and faded like the music.
    #[serde(default)]
    pub tone_path: Option<PathBuf>,

    /// Music bed volume, clamped to [0, 1] before use.
    #[serde(default = "default_music_volume")]
    pub music_volume: f32,

    /// Tone bed volume, clamped to [0, 1] before use.
    #[serde(default = "default_tone_volume")]
    pub tone_volume: f32,

    /// Multiplier for the video's own audio. 1.0 leaves it untouched.
    #[serde(default = "default_video_volume")]
    pub video_volume: f32,

    /// Linear fade-in applied to each bed at the start, in seconds.
    #[serde(default)]
    pub fade_in: f64,

    /// Linear fade-out ending exactly at the video's end, in seconds.
    #[serde(default)]
    pub fade_out: f64,
}

fn default_music_volume() -> f32 {
    0.3
}

fn default_tone_volume() -> f32 {
    0.15
}

fn default_video_volume() -> f32 {
    1.0
}

impl MixRequest {
    /// Creates a request with no beds and default volumes.
    pub fn new(video_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            output_path: output_path.into(),
            music_path: None,
            tone_path: None,
            music_volume: default_music_volume(),
            tone_volume: default_tone_volume(),
            video_volume: default_video_volume(),
            fade_in: 0.0,
            fade_out: 0.0,
        }
    }

    /// Loads a job description from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading or parsing fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves the job description to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

/// What a successful export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MixSummary {
    /// The written output file.
    pub output_path: PathBuf,

    /// Output duration in seconds. `None` when the fast copy path skipped
    /// probing.
    pub duration_seconds: Option<f64>,

    /// Output file size in bytes.
    pub output_bytes: u64,

    /// Wall-clock processing time.
    pub elapsed: Duration,

    /// True when the output is a byte-for-byte copy of the input.
    pub copied: bool,
}

/// Errors from the export pipeline.
///
/// Every failure surfaces as one of these values; nothing panics across the
/// [`mix`] call boundary. A missing *optional* bed is not an error: it is
/// logged and the export proceeds without that input.
#[derive(Error, Debug)]
pub enum MixError {
    #[error("source video not found: {0}")]
    MissingVideo(PathBuf),

    #[error("failed to probe {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with {status}: {message}")]
    Process {
        binary: String,
        status: String,
        message: String,
    },

    #[error("output file was not written: {0}")]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_round_trip() {
        let mut request = MixRequest::new("in.mp4", "out.mp4");
        request.music_path = Some(PathBuf::from("bed.mp3"));
        request.music_volume = 0.1;
        request.fade_in = 2.0;
        request.fade_out = 3.0;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        request.save_to_file(&path).unwrap();
        let loaded = MixRequest::load_from_file(&path).unwrap();
        assert_eq!(loaded, request);
    }

    #[test]
    fn test_request_defaults_from_minimal_json() {
        let json = r#"{ "video_path": "in.mp4", "output_path": "out.mp4" }"#;
        let request: MixRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.music_path, None);
        assert_eq!(request.tone_path, None);
        assert_eq!(request.video_volume, 1.0);
        assert_eq!(request.fade_in, 0.0);
        assert_eq!(request.fade_out, 0.0);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(MixRequest::load_from_file(&path).is_err());
    }
}
