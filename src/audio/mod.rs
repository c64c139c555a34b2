//! Audio synthesis and output.
//!
//! The tone engine owns one triangle-wave voice per sounding pitch and
//! plays them through rodio. Every audio state change is mirrored to the
//! visual layer through the [`KeyboardView`] callback interface, so the
//! engine (and everything above it) runs headlessly under test.

pub mod engine;
mod voice;

pub use engine::{AudioUnavailable, ToneEngine};

use crate::midi::NoteOverlay;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// The visual collaborator: a piano-style keyboard widget.
///
/// The playback core never manipulates visual primitives directly; key
/// lighting and note overlays go through this interface.
pub trait KeyboardView {
    /// Marks a key lit (a voice attacked) or unlit (released).
    fn set_active(&mut self, pitch: u8, active: bool);

    /// Adds a static note bar to a key. Called once per visible note when a
    /// new timeline is loaded.
    fn add_overlay(&mut self, pitch: u8, overlay: &NoteOverlay);

    /// Removes all note bars (a new timeline is about to be loaded).
    fn clear_overlays(&mut self);
}

/// Converts a MIDI note number to its frequency in Hz (A4 = 440 Hz equal
/// temperament).
#[inline]
pub fn pitch_to_freq(pitch: u8) -> f32 {
    440.0 * 2f32.powf((pitch as f32 - 69.0) / 12.0)
}
