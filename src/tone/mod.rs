//! Frequency-tone presets and synthesis.
//!
//! This module provides the tone side of the audio bed: a catalog of named
//! frequency presets (pure tones and binaural pairs), deterministic waveform
//! synthesis into stereo buffers, and WAV rendering for the export path.

pub mod generator;
pub mod wav;

pub use generator::{binaural, from_option, pure_tone, StereoBuffer, ToneError};
pub use wav::write_wav;

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Sample rate used for tone synthesis and previews (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// The waveform a frequency preset describes.
///
/// Exhaustively matched everywhere it is consumed, so adding a new tone
/// type is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToneKind {
    /// No tone at all. Selecting this preset silences the tone channel.
    None,
    /// A single sine tone played identically on both channels.
    Pure { frequency_hz: f32 },
    /// Two sine tones, `base_hz` on the left channel and
    /// `base_hz + offset_hz` on the right.
    ///
    /// The perceived low-frequency "beat" is produced by the listener's
    /// binaural processing; it is not present in either channel's samples.
    Binaural { base_hz: f32, offset_hz: f32 },
}

impl ToneKind {
    /// Returns true for the `None` sentinel.
    pub fn is_none(&self) -> bool {
        matches!(self, ToneKind::None)
    }
}

/// A named tone preset selectable by identifier at playback or export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyOption {
    /// Stable identifier, e.g. `"solfeggio-528"`.
    pub id: String,
    /// Human-readable label for display.
    pub label: String,
    /// The waveform this preset produces.
    pub kind: ToneKind,
}

impl FrequencyOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: ToneKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

static CATALOG: OnceLock<Vec<FrequencyOption>> = OnceLock::new();

/// Returns the built-in preset catalog.
///
/// The catalog is immutable; presets are selected by id. The first entry is
/// always the `None` sentinel so UIs can offer "no tone" as a plain choice.
pub fn catalog() -> &'static [FrequencyOption] {
    CATALOG.get_or_init(|| {
        vec![
            FrequencyOption::new("none", "No tone", ToneKind::None),
            FrequencyOption::new(
                "solfeggio-432",
                "432 Hz - Grounding",
                ToneKind::Pure { frequency_hz: 432.0 },
            ),
            FrequencyOption::new(
                "solfeggio-528",
                "528 Hz - Harmony",
                ToneKind::Pure { frequency_hz: 528.0 },
            ),
            FrequencyOption::new(
                "solfeggio-639",
                "639 Hz - Connection",
                ToneKind::Pure { frequency_hz: 639.0 },
            ),
            FrequencyOption::new(
                "solfeggio-741",
                "741 Hz - Expression",
                ToneKind::Pure { frequency_hz: 741.0 },
            ),
            FrequencyOption::new(
                "solfeggio-852",
                "852 Hz - Intuition",
                ToneKind::Pure { frequency_hz: 852.0 },
            ),
            FrequencyOption::new(
                "binaural-delta",
                "Delta 2 Hz - Deep rest",
                ToneKind::Binaural {
                    base_hz: 100.0,
                    offset_hz: 2.0,
                },
            ),
            FrequencyOption::new(
                "binaural-theta",
                "Theta 6 Hz - Meditation",
                ToneKind::Binaural {
                    base_hz: 200.0,
                    offset_hz: 6.0,
                },
            ),
            FrequencyOption::new(
                "binaural-alpha",
                "Alpha 10 Hz - Focus",
                ToneKind::Binaural {
                    base_hz: 200.0,
                    offset_hz: 10.0,
                },
            ),
            FrequencyOption::new(
                "binaural-beta",
                "Beta 18 Hz - Alertness",
                ToneKind::Binaural {
                    base_hz: 250.0,
                    offset_hz: 18.0,
                },
            ),
        ]
    })
}

/// Looks up a preset by id in the built-in catalog.
pub fn find_option(id: &str) -> Option<&'static FrequencyOption> {
    catalog().iter().find(|o| o.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_none_sentinel_first() {
        let options = catalog();
        assert!(!options.is_empty());
        assert_eq!(options[0].id, "none");
        assert!(options[0].kind.is_none());
    }

    #[test]
    fn test_catalog_ids_unique() {
        let options = catalog();
        for (i, a) in options.iter().enumerate() {
            for b in &options[i + 1..] {
                assert_ne!(a.id, b.id, "duplicate preset id {}", a.id);
            }
        }
    }

    #[test]
    fn test_find_option() {
        let opt = find_option("binaural-alpha").unwrap();
        match opt.kind {
            ToneKind::Binaural { base_hz, offset_hz } => {
                assert_eq!(base_hz, 200.0);
                assert_eq!(offset_hz, 10.0);
            }
            _ => panic!("expected binaural preset"),
        }
        assert!(find_option("does-not-exist").is_none());
    }

    #[test]
    fn test_tone_kind_serde_round_trip() {
        let kind = ToneKind::Binaural {
            base_hz: 200.0,
            offset_hz: 10.0,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("binaural"));
        let back: ToneKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
