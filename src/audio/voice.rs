//! A single synthesizer voice.
//!
//! Each voice is a self-terminating rodio source: a triangle oscillator
//! through a one-pole lowpass, with a short linear fade-out once released.
//! The engine keeps only the control block; the mixer thread consumes the
//! source and drops it when the fade completes.

use super::{pitch_to_freq, SAMPLE_RATE};
use rodio::Source;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Length of the release fade, in seconds.
const RELEASE_SECONDS: f32 = 0.07;

/// Shared handle the engine uses to release a voice that is already owned
/// by the audio mixer.
#[derive(Debug, Default)]
pub struct VoiceControl {
    released: AtomicBool,
}

impl VoiceControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Flags the voice for ramp-down. Idempotent.
    pub fn release(&self) {
        self.released.store(true, Ordering::Relaxed);
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}

/// Triangle-wave voice source.
///
/// The lowpass cutoff follows the original tone model,
/// `1200 + (pitch - 36) * 20` Hz, scaled slightly by the track color's
/// brightness. Purely cosmetic filtering.
pub struct TriangleVoice {
    /// Oscillator phase in [0, 1).
    phase: f32,
    phase_incr: f32,
    amplitude: f32,
    /// One-pole lowpass state and coefficient.
    filter_state: f32,
    filter_coeff: f32,
    /// Samples left in the release ramp; None while sustaining.
    ramp_remaining: Option<u32>,
    ramp_total: u32,
    control: Arc<VoiceControl>,
}

impl TriangleVoice {
    /// Creates a voice for a pitch at a fixed amplitude.
    ///
    /// `tint` in [0.0, 1.0] nudges the filter cutoff (derived from the
    /// track color upstream).
    pub fn new(pitch: u8, amplitude: f32, tint: f32, control: Arc<VoiceControl>) -> Self {
        let freq = pitch_to_freq(pitch);
        let cutoff = (1200.0 + (pitch as f32 - 36.0) * 20.0) * (0.8 + 0.4 * tint.clamp(0.0, 1.0));
        let cutoff = cutoff.clamp(100.0, SAMPLE_RATE as f32 / 2.0);
        let filter_coeff =
            1.0 - (-2.0 * std::f32::consts::PI * cutoff / SAMPLE_RATE as f32).exp();

        Self {
            phase: 0.0,
            phase_incr: freq / SAMPLE_RATE as f32,
            amplitude,
            filter_state: 0.0,
            filter_coeff,
            ramp_remaining: None,
            ramp_total: (RELEASE_SECONDS * SAMPLE_RATE as f32) as u32,
            control,
        }
    }
}

impl Iterator for TriangleVoice {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        // Enter the ramp once the engine flags release.
        if self.ramp_remaining.is_none() && self.control.is_released() {
            self.ramp_remaining = Some(self.ramp_total);
        }

        let gain = match self.ramp_remaining {
            Some(0) => return None, // fade complete, end the stream
            Some(n) => {
                self.ramp_remaining = Some(n - 1);
                n as f32 / self.ramp_total as f32
            }
            None => 1.0,
        };

        // Triangle in [-1, 1].
        let raw = if self.phase < 0.5 {
            4.0 * self.phase - 1.0
        } else {
            3.0 - 4.0 * self.phase
        };
        self.phase += self.phase_incr;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        self.filter_state += self.filter_coeff * (raw - self.filter_state);

        Some(self.filter_state * self.amplitude * gain)
    }
}

impl Source for TriangleVoice {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous until the ramp ends
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
