//! Filter-graph construction for the export mix.
//!
//! Builds the `-filter_complex` expression and output flags handed to
//! `ffmpeg`. Everything here is pure string assembly, so the exact graph
//! shape is unit-testable without spawning a process.

use super::AUDIO_BITRATE;
use crate::audio::clamp_volume;
use std::path::PathBuf;

/// Samples per `aloop` period: effectively "loop forever" for any real bed.
const LOOP_SIZE_SAMPLES: u64 = 2_000_000_000;

/// Crossover window `amix` uses when an input ends early, in seconds.
/// Keeps the mix terminating cleanly when rounding makes a bed run short.
const DROPOUT_TRANSITION_SECS: u32 = 2;

/// An auxiliary bed that exists on disk and participates in the mix.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AuxInput {
    pub path: PathBuf,
    pub volume: f32,
}

/// Everything the exporter needs to assemble the `ffmpeg` command line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MixPlan {
    /// Bed input paths in stream-index order. The exporter passes the video
    /// as input 0 ahead of these.
    pub inputs: Vec<PathBuf>,
    /// The `-filter_complex` expression.
    pub filter_complex: String,
    /// Mapping and codec flags: video stream-copied, audio re-encoded at a
    /// fixed bitrate.
    pub output_args: Vec<String>,
}

/// Clamps one fade so fade-in and fade-out can never overlap: each may take
/// at most half the video.
pub(crate) fn clamp_fade(fade: f64, video_duration: f64) -> f64 {
    if !fade.is_finite() || fade <= 0.0 {
        return 0.0;
    }
    fade.min(video_duration / 2.0)
}

/// Builds the mix plan for a probed video duration.
///
/// Each bed is looped indefinitely, trimmed to the video's exact duration,
/// faded in from t=0 and out so the fade ends exactly at the video's end,
/// then scaled by its volume. The base audio gets a volume filter only when
/// the multiplier differs from 1.0. All streams are combined with `amix`
/// following the first (video) stream's duration.
pub(crate) fn plan(
    video_duration: f64,
    video_volume: f32,
    aux: &[AuxInput],
    fade_in: f64,
    fade_out: f64,
) -> MixPlan {
    let fade_in = clamp_fade(fade_in, video_duration);
    let fade_out = clamp_fade(fade_out, video_duration);

    let mut inputs = vec![];
    let mut parts: Vec<String> = Vec::new();
    let mut labels: Vec<String> = Vec::new();

    let video_volume = clamp_volume(video_volume);
    if video_volume != 1.0 {
        parts.push(format!("[0:a:0]volume={:.3}[base]", video_volume));
        labels.push("[base]".to_string());
    } else {
        labels.push("[0:a:0]".to_string());
    }

    for (i, input) in aux.iter().enumerate() {
        // Input 0 is the video; beds follow in order.
        let stream = i + 1;
        let label = format!("[bed{}]", i);

        let mut chain = format!(
            "[{}:a]aloop=loop=-1:size={},atrim=duration={:.3}",
            stream, LOOP_SIZE_SAMPLES, video_duration
        );
        if fade_in > 0.0 {
            chain.push_str(&format!(",afade=t=in:st=0:d={:.3}", fade_in));
        }
        if fade_out > 0.0 {
            chain.push_str(&format!(
                ",afade=t=out:st={:.3}:d={:.3}",
                video_duration - fade_out,
                fade_out
            ));
        }
        chain.push_str(&format!(",volume={:.3}{}", clamp_volume(input.volume), label));

        parts.push(chain);
        labels.push(label);
        inputs.push(input.path.clone());
    }

    let amix = format!(
        "{}amix=inputs={}:duration=first:dropout_transition={}[aout]",
        labels.concat(),
        labels.len(),
        DROPOUT_TRANSITION_SECS
    );
    parts.push(amix);

    MixPlan {
        inputs,
        filter_complex: parts.join(";"),
        output_args: vec![
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_graph_with_both_beds() {
        let aux = vec![
            AuxInput {
                path: PathBuf::from("music.mp3"),
                volume: 0.1,
            },
            AuxInput {
                path: PathBuf::from("tone.wav"),
                volume: 0.15,
            },
        ];
        let plan = plan(10.0, 1.0, &aux, 2.0, 3.0);

        assert_eq!(
            plan.filter_complex,
            "[1:a]aloop=loop=-1:size=2000000000,atrim=duration=10.000,\
             afade=t=in:st=0:d=2.000,afade=t=out:st=7.000:d=3.000,volume=0.100[bed0];\
             [2:a]aloop=loop=-1:size=2000000000,atrim=duration=10.000,\
             afade=t=in:st=0:d=2.000,afade=t=out:st=7.000:d=3.000,volume=0.150[bed1];\
             [0:a:0][bed0][bed1]amix=inputs=3:duration=first:dropout_transition=2[aout]"
        );
        assert_eq!(
            plan.inputs,
            vec![PathBuf::from("music.mp3"), PathBuf::from("tone.wav")]
        );
    }

    #[test]
    fn test_video_volume_filter_only_when_not_unity() {
        let aux = vec![AuxInput {
            path: PathBuf::from("music.mp3"),
            volume: 0.5,
        }];

        let unity = plan(10.0, 1.0, &aux, 0.0, 0.0);
        assert!(!unity.filter_complex.contains("[base]"));
        assert!(unity.filter_complex.contains("[0:a:0][bed0]amix=inputs=2"));

        let scaled = plan(10.0, 0.5, &aux, 0.0, 0.0);
        assert!(scaled
            .filter_complex
            .starts_with("[0:a:0]volume=0.500[base];"));
        assert!(scaled.filter_complex.contains("[base][bed0]amix=inputs=2"));
    }

    #[test]
    fn test_zero_fades_are_omitted() {
        let aux = vec![AuxInput {
            path: PathBuf::from("music.mp3"),
            volume: 1.0,
        }];
        let plan = plan(10.0, 1.0, &aux, 0.0, 0.0);
        assert!(!plan.filter_complex.contains("afade"));
    }

    #[test]
    fn test_fades_clamped_to_half_duration() {
        assert_eq!(clamp_fade(3.0, 4.0), 2.0);
        assert_eq!(clamp_fade(1.0, 4.0), 1.0);
        assert_eq!(clamp_fade(-1.0, 4.0), 0.0);

        let aux = vec![AuxInput {
            path: PathBuf::from("music.mp3"),
            volume: 1.0,
        }];
        let plan = plan(4.0, 1.0, &aux, 10.0, 10.0);
        // Both fades shrink to 2s; fade-out still ends exactly at the video
        // end.
        assert!(plan.filter_complex.contains("afade=t=in:st=0:d=2.000"));
        assert!(plan.filter_complex.contains("afade=t=out:st=2.000:d=2.000"));
    }

    #[test]
    fn test_bed_volumes_are_clamped() {
        let aux = vec![AuxInput {
            path: PathBuf::from("music.mp3"),
            volume: 2.5,
        }];
        let plan = plan(10.0, 1.0, &aux, 0.0, 0.0);
        assert!(plan.filter_complex.contains("volume=1.000[bed0]"));
    }

    #[test]
    fn test_base_only_graph_still_mixes() {
        // No beds, but the base needs scaling: a one-input amix keeps the
        // output-label contract identical for the exporter.
        let plan = plan(8.0, 0.25, &[], 0.0, 0.0);
        assert_eq!(
            plan.filter_complex,
            "[0:a:0]volume=0.250[base];[base]amix=inputs=1:duration=first:dropout_transition=2[aout]"
        );
        assert!(plan.inputs.is_empty());
        assert_eq!(plan.output_args[plan.output_args.len() - 1], "192k");
    }
}
