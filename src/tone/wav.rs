//! WAV rendering for generated tones.
//!
//! The offline export path feeds the external mixer from files on disk, so
//! synthesized beds are written out as plain 16-bit stereo WAV.

use super::StereoBuffer;
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Writes a stereo buffer as a 16-bit PCM WAV file.
///
/// # Errors
///
/// Returns error if the output file cannot be created or written.
pub fn write_wav<P: AsRef<Path>>(buffer: &StereoBuffer, path: P) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec).with_context(|| {
        format!(
            "Failed to create output WAV file: {}",
            path.as_ref().display()
        )
    })?;

    for i in 0..buffer.frames() {
        // Convert f32 (-1.0 to 1.0) to i16
        let left = (buffer.left()[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
        let right = (buffer.right()[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(left)?;
        writer.write_sample(right)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
