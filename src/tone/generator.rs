//! Deterministic tone synthesis.
//!
//! Fills stereo sample buffers with pure sine tones or binaural pairs.
//! Identical inputs always produce bit-identical output, so generated beds
//! can be cached and compared across runs.

use super::{FrequencyOption, ToneKind};
use std::f64::consts::TAU;
use std::sync::Arc;
use thiserror::Error;

/// Errors from invalid synthesis parameters.
///
/// Synthesis fails fast on bad input; it never produces an empty or NaN
/// buffer.
#[derive(Error, Debug, PartialEq)]
pub enum ToneError {
    #[error("frequency must be positive, got {0} Hz")]
    InvalidFrequency(f32),

    #[error("duration must be positive, got {0} s")]
    InvalidDuration(f64),

    #[error("sample rate must be positive")]
    InvalidSampleRate,
}

/// Decoded or synthesized stereo waveform data.
///
/// Channels are stored separately; playback interleaves them. Buffers are
/// shared into the playback layer behind an `Arc`, so whoever creates one
/// remains its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    sample_rate: u32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBuffer {
    /// Creates a buffer from separate channel data.
    ///
    /// The longer channel is truncated so both channels always hold the same
    /// number of frames.
    pub fn new(sample_rate: u32, mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let frames = left.len().min(right.len());
        left.truncate(frames);
        right.truncate(frames);
        Self {
            sample_rate,
            left,
            right,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Buffer length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Sample pair at a frame index, wrapping past the end (for looping
    /// playback).
    pub fn frame_wrapped(&self, frame: usize) -> (f32, f32) {
        if self.is_empty() {
            return (0.0, 0.0);
        }
        let i = frame % self.frames();
        (self.left[i], self.right[i])
    }
}

/// Shared handle to a decoded buffer, as handed to the playback layer.
pub type SharedBuffer = Arc<StereoBuffer>;

fn validate(frequency_hz: f32, duration: f64, sample_rate: u32) -> Result<(), ToneError> {
    if !(frequency_hz > 0.0) || !frequency_hz.is_finite() {
        return Err(ToneError::InvalidFrequency(frequency_hz));
    }
    if !(duration > 0.0) || !duration.is_finite() {
        return Err(ToneError::InvalidDuration(duration));
    }
    if sample_rate == 0 {
        return Err(ToneError::InvalidSampleRate);
    }
    Ok(())
}

fn sine_channel(frequency_hz: f32, frames: usize, sample_rate: u32) -> Vec<f32> {
    let step = TAU * frequency_hz as f64 / sample_rate as f64;
    (0..frames).map(|n| (step * n as f64).sin() as f32).collect()
}

/// Generates a pure sine tone on both channels.
///
/// Sample `n` of each channel is `sin(2π·f·n/sample_rate)`. Deterministic:
/// identical arguments yield bit-identical buffers.
///
/// # Errors
///
/// Returns [`ToneError`] if frequency, duration, or sample rate are not
/// positive.
pub fn pure_tone(
    frequency_hz: f32,
    duration: f64,
    sample_rate: u32,
) -> Result<StereoBuffer, ToneError> {
    validate(frequency_hz, duration, sample_rate)?;
    let frames = (duration * sample_rate as f64).round() as usize;
    let left = sine_channel(frequency_hz, frames, sample_rate);
    let right = left.clone();
    Ok(StereoBuffer::new(sample_rate, left, right))
}

/// Generates a binaural pair: `base_hz` on the left channel and
/// `base_hz + offset_hz` on the right.
///
/// The perceived beat at `offset_hz` exists only in the listener's binaural
/// processing; neither channel's spectrum contains a component at the
/// offset frequency, so don't go looking for one in the samples.
///
/// # Errors
///
/// Returns [`ToneError`] if either resulting frequency, the duration, or the
/// sample rate are not positive.
pub fn binaural(
    base_hz: f32,
    offset_hz: f32,
    duration: f64,
    sample_rate: u32,
) -> Result<StereoBuffer, ToneError> {
    validate(base_hz, duration, sample_rate)?;
    let right_hz = base_hz + offset_hz;
    if !(right_hz > 0.0) || !right_hz.is_finite() {
        return Err(ToneError::InvalidFrequency(right_hz));
    }
    let frames = (duration * sample_rate as f64).round() as usize;
    let left = sine_channel(base_hz, frames, sample_rate);
    let right = sine_channel(right_hz, frames, sample_rate);
    Ok(StereoBuffer::new(sample_rate, left, right))
}

/// Synthesizes the waveform a preset describes.
///
/// Dispatches exhaustively on [`ToneKind`]; the `None` sentinel yields
/// `Ok(None)` rather than an empty buffer.
pub fn from_option(
    option: &FrequencyOption,
    duration: f64,
    sample_rate: u32,
) -> Result<Option<StereoBuffer>, ToneError> {
    match option.kind {
        ToneKind::None => Ok(None),
        ToneKind::Pure { frequency_hz } => {
            pure_tone(frequency_hz, duration, sample_rate).map(Some)
        }
        ToneKind::Binaural { base_hz, offset_hz } => {
            binaural(base_hz, offset_hz, duration, sample_rate).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::{find_option, SAMPLE_RATE};

    #[test]
    fn test_pure_tone_deterministic() {
        let a = pure_tone(440.0, 0.5, SAMPLE_RATE).unwrap();
        let b = pure_tone(440.0, 0.5, SAMPLE_RATE).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.frames(), 22050);
    }

    #[test]
    fn test_pure_tone_matches_formula() {
        let buf = pure_tone(440.0, 0.01, SAMPLE_RATE).unwrap();
        for n in 0..buf.frames() {
            let expected = (TAU * 440.0 * n as f64 / SAMPLE_RATE as f64).sin() as f32;
            assert!((buf.left()[n] - expected).abs() < 1e-6);
            assert_eq!(buf.left()[n], buf.right()[n]);
        }
    }

    #[test]
    fn test_binaural_channel_separation() {
        let buf = binaural(200.0, 10.0, 0.01, SAMPLE_RATE).unwrap();
        for n in 0..buf.frames() {
            let left = (TAU * 200.0 * n as f64 / SAMPLE_RATE as f64).sin() as f32;
            let right = (TAU * 210.0 * n as f64 / SAMPLE_RATE as f64).sin() as f32;
            assert!((buf.left()[n] - left).abs() < 1e-6);
            assert!((buf.right()[n] - right).abs() < 1e-6);
        }
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        assert_eq!(
            pure_tone(0.0, 1.0, SAMPLE_RATE),
            Err(ToneError::InvalidFrequency(0.0))
        );
        assert_eq!(
            pure_tone(-440.0, 1.0, SAMPLE_RATE),
            Err(ToneError::InvalidFrequency(-440.0))
        );
        assert_eq!(
            pure_tone(440.0, 0.0, SAMPLE_RATE),
            Err(ToneError::InvalidDuration(0.0))
        );
        assert_eq!(
            pure_tone(440.0, 1.0, 0),
            Err(ToneError::InvalidSampleRate)
        );
        // Negative offset may not push the right channel to or below 0 Hz.
        assert!(binaural(10.0, -10.0, 1.0, SAMPLE_RATE).is_err());
    }

    #[test]
    fn test_from_option_none_sentinel() {
        let none = find_option("none").unwrap();
        assert_eq!(from_option(none, 1.0, SAMPLE_RATE).unwrap(), None);

        let pure = find_option("solfeggio-528").unwrap();
        let buf = from_option(pure, 1.0, SAMPLE_RATE).unwrap().unwrap();
        assert_eq!(buf.frames(), SAMPLE_RATE as usize);
    }

    #[test]
    fn test_frame_wrapped_loops() {
        let buf = pure_tone(440.0, 0.01, SAMPLE_RATE).unwrap();
        let frames = buf.frames();
        assert_eq!(buf.frame_wrapped(0), buf.frame_wrapped(frames));
        assert_eq!(buf.frame_wrapped(3), buf.frame_wrapped(frames + 3));
    }

    #[test]
    fn test_duration_seconds() {
        let buf = pure_tone(440.0, 2.0, SAMPLE_RATE).unwrap();
        assert!((buf.duration_seconds() - 2.0).abs() < 1e-6);
    }
}
