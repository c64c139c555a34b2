//! midiplay - A terminal MIDI file player.
//!
//! This library provides the core playback machinery for the player app:
//! MIDI import, the event timeline, the polyphonic tone engine, and the
//! transport scheduler.

pub mod app;
pub mod audio;
pub mod midi;
pub mod playback;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use audio::engine::ToneEngine;
pub use midi::{load_sequence, LoadError, Sequence, Timeline};
pub use playback::{format_clock, Phase, PlaybackStore, TransportScheduler};
