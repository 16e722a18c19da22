//! Source media probing via `ffprobe`.

use super::MixError;
use std::path::Path;
use std::process::Command;

/// Probes a media file's duration in seconds.
///
/// Loop, trim, and fade points for the beds are all derived from this value.
///
/// # Errors
///
/// Returns [`MixError::Spawn`] if `ffprobe` is not installed, or
/// [`MixError::Probe`] if it fails or reports an unusable duration.
pub fn probe_duration<P: AsRef<Path>>(path: P) -> Result<f64, MixError> {
    let path = path.as_ref();
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| MixError::Spawn {
            binary: "ffprobe".to_string(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(MixError::Probe {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_duration(&text).ok_or_else(|| MixError::Probe {
        path: path.to_path_buf(),
        message: format!("unusable duration {:?}", text.trim()),
    })
}

/// Parses ffprobe's duration output into positive, finite seconds.
fn parse_duration(text: &str) -> Option<f64> {
    let seconds: f64 = text.trim().parse().ok()?;
    (seconds > 0.0 && seconds.is_finite()).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10.045000\n"), Some(10.045));
        assert_eq!(parse_duration("  3.5  "), Some(3.5));
        assert_eq!(parse_duration("0.0"), None);
        assert_eq!(parse_duration("-2.0"), None);
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    #[ignore] // Requires ffprobe on PATH and a real media file
    fn test_probe_duration_real_file() {
        let duration = probe_duration("assets/sample.mp4").unwrap();
        assert!(duration > 0.0);
    }
}
