//! The polyphonic tone engine.
//!
//! Owns one voice per currently sounding pitch. An attack on an
//! already-sounding pitch is a no-op (never double-voices); a release
//! removes the pitch from the voice map immediately while the audio fade
//! runs out on the mixer thread, so a fresh attack during the fade starts a
//! new voice. Every attack and release is mirrored to the visual layer.

use super::voice::{TriangleVoice, VoiceControl};
use super::KeyboardView;
use crate::midi::Rgb;
use rodio::{OutputStream, OutputStreamHandle};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Default master gain applied to every voice.
const DEFAULT_MASTER_GAIN: f32 = 0.2;

/// Device-safe ceiling for a single voice's amplitude, before master gain.
const MAX_VOICE_AMPLITUDE: f32 = 0.75;

/// The audio output device could not be initialized.
#[derive(Debug, Error)]
#[error("audio output unavailable: {0}")]
pub struct AudioUnavailable(String);

/// Audio output stream, kept alive for the life of the engine.
struct AudioOutput {
    // Dropping the stream stops all playback.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

/// One active voice as the engine sees it: just the shared control block;
/// the source itself lives on the mixer thread.
struct Voice {
    control: Arc<VoiceControl>,
}

/// The main tone engine: voice allocation, release, and master gain.
pub struct ToneEngine {
    /// None when running muted (no device requested) - voice bookkeeping
    /// and visual notifications still behave normally.
    output: Option<AudioOutput>,
    /// At most one entry per pitch at any instant.
    voices: HashMap<u8, Voice>,
    master_gain: f32,
}

impl ToneEngine {
    /// Creates an engine talking to the default audio output device.
    ///
    /// # Errors
    ///
    /// Returns [`AudioUnavailable`] if no output stream can be opened. The
    /// caller decides whether to keep running without audio.
    pub fn new() -> Result<Self, AudioUnavailable> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioUnavailable(e.to_string()))?;
        Ok(Self {
            output: Some(AudioOutput {
                _stream: stream,
                handle,
            }),
            voices: HashMap::new(),
            master_gain: DEFAULT_MASTER_GAIN,
        })
    }

    /// Creates an engine with no output device.
    ///
    /// Voice tracking and the visual notifications behave exactly as with a
    /// device; only sound is skipped. Used by `--mute` and headless tests.
    pub fn muted() -> Self {
        Self {
            output: None,
            voices: HashMap::new(),
            master_gain: DEFAULT_MASTER_GAIN,
        }
    }

    /// Starts a voice for a pitch.
    ///
    /// No-op if the pitch is already sounding. Amplitude is a linear map of
    /// velocity, clamped to a device-safe range; `color` only tints the
    /// cosmetic lowpass filter. Marks the key active on the view.
    pub fn attack(&mut self, pitch: u8, velocity: f32, color: Rgb, view: &mut dyn KeyboardView) {
        if self.voices.contains_key(&pitch) {
            return;
        }

        let amplitude = (0.15 + velocity.clamp(0.0, 1.0) * 0.6).min(MAX_VOICE_AMPLITUDE)
            * self.master_gain;
        let control = VoiceControl::new();

        if let Some(output) = &self.output {
            let source =
                TriangleVoice::new(pitch, amplitude, color.brightness(), Arc::clone(&control));
            if let Err(e) = output.handle.play_raw(source) {
                tracing::warn!("failed to start voice for pitch {}: {}", pitch, e);
            }
        }

        self.voices.insert(pitch, Voice { control });
        view.set_active(pitch, true);
    }

    /// Releases a pitch's voice.
    ///
    /// The voice leaves the map immediately; its audio ramps to silence on
    /// the mixer thread over a few tens of milliseconds and may overlap a
    /// fresh attack on the same pitch. The key is marked inactive right
    /// away, regardless of the fade.
    pub fn release(&mut self, pitch: u8, view: &mut dyn KeyboardView) {
        if let Some(voice) = self.voices.remove(&pitch) {
            voice.control.release();
        }
        view.set_active(pitch, false);
    }

    /// Releases every sounding voice. Idempotent; safe with none active.
    pub fn release_all(&mut self, view: &mut dyn KeyboardView) {
        let pitches: Vec<u8> = self.voices.keys().copied().collect();
        for pitch in pitches {
            self.release(pitch, view);
        }
    }

    /// Number of currently sounding voices.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Whether a pitch currently has a voice.
    pub fn is_sounding(&self, pitch: u8) -> bool {
        self.voices.contains_key(&pitch)
    }

    /// Master gain in [0.0, 1.0]; applied to voices started afterwards.
    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.clamp(0.0, 1.0);
    }
}
