//! Real-time preview playback of the audio bed.
//!
//! The [`PreviewMixer`] drives up to two independent channels (background
//! music and a frequency tone) in sync with an externally-owned video
//! transport. The video element owns the clock; this mixer is told the
//! transport position on every play and seek and derives loop offsets from
//! it.
//!
//! Per channel there is at most one live source at any time: starting a
//! channel always tears down the previous source first. Oscillator and
//! buffer sources are single-use, so pause/resume always recreates them.

use crate::audio::clamp_volume;
use crate::audio::loader::{MusicLoader, TrackSource};
use crate::audio::output::AudioOutput;
use crate::tone::generator::SharedBuffer;
use crate::tone::{FrequencyOption, ToneKind};
use anyhow::Result;
use rodio::{Sink, Source};
use std::f64::consts::TAU;
use std::time::Duration;
use tracing::{debug, warn};

/// The two independent preview channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Music,
    Tone,
}

/// Lifecycle state of one channel.
///
/// The transient start (resolve buffer, build source, attach sink) happens
/// synchronously inside a single call, so externally a channel is only ever
/// stopped or playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Stopped,
    Playing,
}

/// Configuration for the music channel: which asset to lay under the video.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicTrack {
    /// Track identifier, also the loader cache key.
    pub id: String,
    /// Where the asset lives.
    pub source: TrackSource,
}

/// Offset into a looping buffer for a given transport position.
///
/// Looping content re-seeks with `position mod duration`, never a linear
/// offset.
pub(crate) fn loop_offset(position: f64, duration: f64) -> f64 {
    if duration <= 0.0 || !duration.is_finite() {
        return 0.0;
    }
    position.max(0.0).rem_euclid(duration)
}

/// Two-channel preview mixer synchronized to an external transport.
///
/// Owns the output device (injected at construction), the music loader
/// cache, and the per-channel sinks. All operations are synchronous;
/// the only blocking step is the loader's fetch/decode on a cache miss.
pub struct PreviewMixer {
    output: AudioOutput,
    loader: MusicLoader,
    music: Option<MusicTrack>,
    tone: Option<FrequencyOption>,
    music_volume: f32,
    tone_volume: f32,
    muted: bool,
    playing: bool,
    position: f64,
    music_sink: Option<Sink>,
    tone_sink: Option<Sink>,
}

impl PreviewMixer {
    /// Creates a mixer around an (unopened) output device.
    pub fn new(output: AudioOutput) -> Self {
        Self {
            output,
            loader: MusicLoader::new(),
            music: None,
            tone: None,
            music_volume: 1.0,
            tone_volume: 1.0,
            muted: false,
            playing: false,
            position: 0.0,
            music_sink: None,
            tone_sink: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Last transport position handed to the mixer, in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn channel_state(&self, channel: Channel) -> ChannelState {
        let sink = match channel {
            Channel::Music => &self.music_sink,
            Channel::Tone => &self.tone_sink,
        };
        if sink.is_some() {
            ChannelState::Playing
        } else {
            ChannelState::Stopped
        }
    }

    /// Number of live sources across both channels.
    pub fn active_sources(&self) -> usize {
        self.music_sink.is_some() as usize + self.tone_sink.is_some() as usize
    }

    /// The volume configured for a channel, regardless of mute.
    pub fn configured_volume(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Music => self.music_volume,
            Channel::Tone => self.tone_volume,
        }
    }

    /// The gain actually applied: 0 while muted, the configured volume
    /// otherwise.
    pub fn effective_volume(&self, channel: Channel) -> f32 {
        if self.muted {
            0.0
        } else {
            self.configured_volume(channel)
        }
    }

    /// Selects the music track, or clears it with `None`.
    ///
    /// Changing track identity while playing restarts the music channel from
    /// the current transport position.
    pub fn set_music(&mut self, track: Option<MusicTrack>) {
        if self.music == track {
            return;
        }
        self.music = track;
        if self.playing {
            self.start_music();
        } else {
            self.stop_channel(Channel::Music);
        }
    }

    /// Selects the tone preset, or clears it with `None`.
    ///
    /// A preset whose kind is [`ToneKind::None`] behaves exactly like `None`.
    pub fn set_tone(&mut self, option: Option<FrequencyOption>) {
        if self.tone == option {
            return;
        }
        self.tone = option;
        if self.playing {
            self.start_tone();
        } else {
            self.stop_channel(Channel::Tone);
        }
    }

    /// Sets a channel volume, clamped to [0, 1].
    ///
    /// Applies to the live sink immediately; the source keeps playing, so
    /// there is no restart glitch.
    pub fn set_volume(&mut self, channel: Channel, volume: f32) {
        let volume = clamp_volume(volume);
        match channel {
            Channel::Music => self.music_volume = volume,
            Channel::Tone => self.tone_volume = volume,
        }
        self.apply_volume(channel);
    }

    /// Mutes or unmutes both channels.
    ///
    /// Muting forces the applied gain to 0 without touching the configured
    /// volumes, so unmuting restores the exact previous levels.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume(Channel::Music);
        self.apply_volume(Channel::Tone);
    }

    /// Starts playback from a transport position.
    ///
    /// Opens the output device on first use. Each configured channel is
    /// (re)started; a music load failure degrades to a silent music channel
    /// and never stops the tone.
    ///
    /// # Errors
    ///
    /// Returns error only if the output device cannot be opened.
    pub fn play(&mut self, position: f64) -> Result<()> {
        self.output.ensure_started()?;
        self.position = position.max(0.0);
        self.playing = true;
        self.start_music();
        self.start_tone();
        debug!(position = self.position, "preview playing");
        Ok(())
    }

    /// Pauses playback, tearing down all live sources.
    ///
    /// Sources are single-use; resuming recreates them at the position the
    /// next [`play`](Self::play) call supplies.
    pub fn pause(&mut self) {
        self.playing = false;
        self.stop_channel(Channel::Music);
        self.stop_channel(Channel::Tone);
        debug!("preview paused");
    }

    /// Moves the transport position.
    ///
    /// While playing, both channels restart at the new offset. While paused
    /// nothing starts; the position is consumed by the next play.
    pub fn seek(&mut self, position: f64) {
        self.position = position.max(0.0);
        if self.playing {
            self.start_music();
            self.start_tone();
        }
    }

    /// Stops everything and closes the output device.
    ///
    /// Idempotent; also runs on drop, so double-teardown is harmless.
    pub fn close(&mut self) {
        self.playing = false;
        self.stop_channel(Channel::Music);
        self.stop_channel(Channel::Tone);
        self.output.close();
    }

    fn apply_volume(&mut self, channel: Channel) {
        let volume = self.effective_volume(channel);
        let sink = match channel {
            Channel::Music => &self.music_sink,
            Channel::Tone => &self.tone_sink,
        };
        if let Some(sink) = sink {
            sink.set_volume(volume);
        }
    }

    fn stop_channel(&mut self, channel: Channel) {
        let sink = match channel {
            Channel::Music => self.music_sink.take(),
            Channel::Tone => self.tone_sink.take(),
        };
        if let Some(sink) = sink {
            sink.stop();
        }
    }

    /// (Re)starts the music channel at the current transport position.
    /// Any prior music source is torn down first.
    fn start_music(&mut self) {
        self.stop_channel(Channel::Music);

        let Some(track) = self.music.clone() else {
            return;
        };
        let buffer = match self.loader.load(&track.id, &track.source) {
            Ok(buffer) => buffer,
            Err(e) => {
                // Degrade to no music; the tone channel keeps playing.
                warn!(track = %track.id, error = %e, "music unavailable for this session");
                return;
            }
        };
        if buffer.is_empty() {
            warn!(track = %track.id, "decoded track is empty, skipping music");
            return;
        }

        let offset = loop_offset(self.position, buffer.duration_seconds());
        let source = LoopingBufferSource::starting_at(buffer, offset);
        let volume = self.effective_volume(Channel::Music);
        let Some(handle) = self.output.handle() else {
            return;
        };
        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.set_volume(volume);
                sink.append(source);
                self.music_sink = Some(sink);
            }
            Err(e) => warn!(error = %e, "failed to start music sink"),
        }
    }

    /// (Re)starts the tone channel. Oscillators cannot be reused once
    /// stopped, so a fresh source is built every time.
    fn start_tone(&mut self) {
        self.stop_channel(Channel::Tone);

        let Some(option) = self.tone.clone() else {
            return;
        };
        let source = match ToneSource::from_kind(option.kind) {
            Some(source) => source,
            None => {
                if !option.kind.is_none() {
                    warn!(preset = %option.id, "invalid tone parameters, skipping tone");
                }
                return;
            }
        };

        let volume = self.effective_volume(Channel::Tone);
        let Some(handle) = self.output.handle() else {
            return;
        };
        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.set_volume(volume);
                sink.append(source);
                self.tone_sink = Some(sink);
            }
            Err(e) => warn!(error = %e, "failed to start tone sink"),
        }
    }
}

impl Drop for PreviewMixer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Infinite source looping a decoded buffer from an arbitrary offset.
///
/// Emits interleaved stereo samples and wraps back to frame 0 at the end of
/// the buffer, so the bed loops seamlessly under videos longer than the
/// track.
struct LoopingBufferSource {
    buffer: SharedBuffer,
    frame: usize,
    /// 0 = left sample next, 1 = right.
    channel: usize,
}

impl LoopingBufferSource {
    fn starting_at(buffer: SharedBuffer, offset_seconds: f64) -> Self {
        let frames = buffer.frames();
        let frame = if frames == 0 {
            0
        } else {
            (offset_seconds.max(0.0) * buffer.sample_rate() as f64) as usize % frames
        };
        Self {
            buffer,
            frame,
            channel: 0,
        }
    }
}

impl Iterator for LoopingBufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buffer.is_empty() {
            return None;
        }
        let (left, right) = self.buffer.frame_wrapped(self.frame);
        let sample = if self.channel == 0 { left } else { right };
        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.frame = (self.frame + 1) % self.buffer.frames();
        }
        Some(sample)
    }
}

impl Source for LoopingBufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Loops forever
    }
}

/// Infinite sine oscillator source.
///
/// A pure tone runs one phase on both channels; a binaural pair runs
/// independent left/right phases. Single-use: once its sink stops, a new
/// source must be built.
struct ToneSource {
    sample_rate: u32,
    left_step: f64,
    right_step: f64,
    left_phase: f64,
    right_phase: f64,
    /// 0 = left sample next, 1 = right.
    channel: usize,
}

impl ToneSource {
    /// Builds the oscillator a preset kind describes, or `None` for the
    /// no-tone sentinel and for non-positive frequencies.
    fn from_kind(kind: ToneKind) -> Option<Self> {
        let sample_rate = crate::tone::SAMPLE_RATE;
        match kind {
            ToneKind::None => None,
            ToneKind::Pure { frequency_hz } => {
                if frequency_hz > 0.0 && frequency_hz.is_finite() {
                    Some(Self::with_frequencies(frequency_hz, frequency_hz, sample_rate))
                } else {
                    None
                }
            }
            ToneKind::Binaural { base_hz, offset_hz } => {
                let right_hz = base_hz + offset_hz;
                if base_hz > 0.0 && right_hz > 0.0 && right_hz.is_finite() {
                    Some(Self::with_frequencies(base_hz, right_hz, sample_rate))
                } else {
                    None
                }
            }
        }
    }

    fn with_frequencies(left_hz: f32, right_hz: f32, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            left_step: left_hz as f64 / sample_rate as f64,
            right_step: right_hz as f64 / sample_rate as f64,
            left_phase: 0.0,
            right_phase: 0.0,
            channel: 0,
        }
    }
}

impl Iterator for ToneSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = if self.channel == 0 {
            (self.left_phase * TAU).sin() as f32
        } else {
            (self.right_phase * TAU).sin() as f32
        };
        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.left_phase += self.left_step;
            if self.left_phase >= 1.0 {
                self.left_phase -= 1.0;
            }
            self.right_phase += self.right_step;
            if self.right_phase >= 1.0 {
                self.right_phase -= 1.0;
            }
        }
        Some(sample)
    }
}

impl Source for ToneSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Runs until the sink is stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::{find_option, pure_tone, SAMPLE_RATE};
    use std::sync::Arc;

    fn mixer() -> PreviewMixer {
        PreviewMixer::new(AudioOutput::new())
    }

    #[test]
    fn test_loop_offset_wraps_modulo_duration() {
        assert_eq!(loop_offset(12.5, 5.0), 2.5);
        assert_eq!(loop_offset(5.0, 5.0), 0.0);
        assert_eq!(loop_offset(3.0, 5.0), 3.0);
        assert_eq!(loop_offset(-1.0, 5.0), 0.0);
        assert_eq!(loop_offset(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_volume_clamped_on_set() {
        let mut mixer = mixer();
        mixer.set_volume(Channel::Music, 1.7);
        assert_eq!(mixer.configured_volume(Channel::Music), 1.0);
        mixer.set_volume(Channel::Tone, -0.4);
        assert_eq!(mixer.configured_volume(Channel::Tone), 0.0);
    }

    #[test]
    fn test_mute_unmute_round_trip() {
        let mut mixer = mixer();
        mixer.set_volume(Channel::Music, 0.73);
        mixer.set_volume(Channel::Tone, 0.25);

        mixer.set_muted(true);
        assert_eq!(mixer.effective_volume(Channel::Music), 0.0);
        assert_eq!(mixer.effective_volume(Channel::Tone), 0.0);
        // Configured volumes survive the mute untouched.
        assert_eq!(mixer.configured_volume(Channel::Music), 0.73);

        mixer.set_muted(false);
        assert_eq!(mixer.effective_volume(Channel::Music), 0.73);
        assert_eq!(mixer.effective_volume(Channel::Tone), 0.25);
    }

    #[test]
    fn test_seek_while_paused_starts_nothing() {
        let mut mixer = mixer();
        mixer.set_tone(find_option("binaural-alpha").cloned());
        mixer.seek(5.0);

        assert_eq!(mixer.position(), 5.0);
        assert!(!mixer.is_playing());
        assert_eq!(mixer.channel_state(Channel::Tone), ChannelState::Stopped);
        assert_eq!(mixer.active_sources(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut mixer = mixer();
        mixer.close();
        mixer.close();
        assert_eq!(mixer.active_sources(), 0);
    }

    #[test]
    fn test_looping_source_wraps_at_buffer_end() {
        let buffer = Arc::new(pure_tone(440.0, 0.001, SAMPLE_RATE).unwrap());
        let frames = buffer.frames();

        let samples: Vec<f32> = LoopingBufferSource::starting_at(Arc::clone(&buffer), 0.0)
            .take(frames * 4)
            .collect();

        // Second pass through the loop repeats the first exactly.
        assert_eq!(&samples[..frames * 2], &samples[frames * 2..]);
        // Interleaving: even indices left, odd indices right.
        assert_eq!(samples[0], buffer.left()[0]);
        assert_eq!(samples[1], buffer.right()[0]);
    }

    #[test]
    fn test_looping_source_offset_is_modular() {
        let buffer = Arc::new(pure_tone(440.0, 0.001, SAMPLE_RATE).unwrap());
        let frames = buffer.frames() as f64;

        // An offset one full loop past `t` lands on the same frame as `t`.
        // Target the middle of a frame so float rounding cannot change the
        // resulting index.
        let t = 11.5 / SAMPLE_RATE as f64;
        let one_loop = frames / SAMPLE_RATE as f64;
        let a: Vec<f32> = LoopingBufferSource::starting_at(Arc::clone(&buffer), t)
            .take(8)
            .collect();
        let b: Vec<f32> = LoopingBufferSource::starting_at(Arc::clone(&buffer), t + one_loop)
            .take(8)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tone_source_matches_sine_formula() {
        let mut source = ToneSource::from_kind(ToneKind::Binaural {
            base_hz: 200.0,
            offset_hz: 10.0,
        })
        .unwrap();

        for n in 0..64u32 {
            let left = source.next().unwrap();
            let right = source.next().unwrap();
            let expected_left = (TAU * 200.0 * n as f64 / SAMPLE_RATE as f64).sin() as f32;
            let expected_right = (TAU * 210.0 * n as f64 / SAMPLE_RATE as f64).sin() as f32;
            assert!((left - expected_left).abs() < 1e-5);
            assert!((right - expected_right).abs() < 1e-5);
        }
    }

    #[test]
    fn test_tone_source_rejects_sentinel_and_bad_frequencies() {
        assert!(ToneSource::from_kind(ToneKind::None).is_none());
        assert!(ToneSource::from_kind(ToneKind::Pure { frequency_hz: 0.0 }).is_none());
        assert!(ToneSource::from_kind(ToneKind::Binaural {
            base_hz: 10.0,
            offset_hz: -10.0,
        })
        .is_none());
    }

    #[test]
    #[ignore] // Requires an audio output device
    fn test_single_active_source_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bed.wav");
        let buffer = pure_tone(440.0, 0.2, SAMPLE_RATE).unwrap();
        crate::tone::write_wav(&buffer, &path).unwrap();

        let mut mixer = mixer();
        mixer.set_music(Some(MusicTrack {
            id: "bed".to_string(),
            source: TrackSource::File { path },
        }));
        mixer.set_tone(find_option("binaural-alpha").cloned());

        // Starting twice in succession must leave exactly one source per
        // channel.
        mixer.play(0.0).unwrap();
        mixer.play(1.0).unwrap();
        assert_eq!(mixer.active_sources(), 2);
        assert_eq!(mixer.channel_state(Channel::Music), ChannelState::Playing);
        assert_eq!(mixer.channel_state(Channel::Tone), ChannelState::Playing);

        mixer.pause();
        assert_eq!(mixer.active_sources(), 0);

        mixer.close();
    }
}
