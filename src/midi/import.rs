//! Standard MIDI File (SMF) import.
//!
//! Parses .mid and .midi files into the per-track note lists the timeline
//! is built from. Supports SMF Format 0 (single track) and Format 1
//! (multi-track) files.
//!
//! # Limitations
//!
//! - Only note on/off events become notes
//! - The first tempo event governs the whole file (no tempo map)
//! - Other MIDI events (program change, controllers, pitch bend, ...) are
//!   ignored; the player synthesizes a single timbre
//!
//! Import is all-or-nothing: a malformed file yields a [`LoadError`] and no
//! state is touched.

use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a sequence file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// MIDI parsing failed
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// Unsupported MIDI format or timing
    #[error("unsupported format: {0}")]
    Unsupported(String),
}

/// A single note with timing in seconds, relative to sequence start.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,
    /// Normalized velocity (0.0-1.0).
    pub velocity: f32,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds. Zero-duration notes are kept; the visual layer
    /// decides whether they are worth drawing.
    pub duration: f64,
}

/// The notes belonging to one source track.
#[derive(Debug, Clone, Default)]
pub struct TrackNotes {
    pub notes: Vec<Note>,
}

/// A parsed multi-track sequence: the importer's whole output.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    pub tracks: Vec<TrackNotes>,
    /// Total duration in seconds: the maximum `start + duration` across all
    /// tracks, 0.0 for an empty file.
    pub duration: f64,
}

impl Sequence {
    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(|t| t.notes.is_empty())
    }
}

/// Default tempo when the file carries no tempo event: 120 BPM.
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// Loads and parses a sequence file from disk.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or parsed. On error
/// nothing has been applied anywhere.
pub fn load_sequence<P: AsRef<Path>>(path: P) -> Result<Sequence, LoadError> {
    let data = fs::read(path.as_ref())?;
    parse_sequence(&data)
}

/// Parses a sequence from raw SMF bytes.
pub fn parse_sequence(data: &[u8]) -> Result<Sequence, LoadError> {
    let smf = Smf::parse(data).map_err(|e| LoadError::Parse(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(_, _) => {
            return Err(LoadError::Unsupported(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(LoadError::Parse("zero ticks-per-beat division".to_string()));
    }

    if smf.header.format == Format::Sequential {
        return Err(LoadError::Unsupported(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    // Single-tempo simplification: the first tempo event in track order
    // governs the whole file.
    let usec_per_beat = first_tempo(&smf.tracks).unwrap_or(DEFAULT_USEC_PER_BEAT);
    let seconds_per_tick = usec_per_beat as f64 / 1_000_000.0 / ticks_per_beat as f64;

    let mut tracks = Vec::new();
    for track in &smf.tracks {
        let notes = collect_notes(track, seconds_per_tick);
        // Tempo/meta-only tracks contribute nothing audible; dropping them
        // keeps the track legend aligned with what actually plays.
        if !notes.is_empty() {
            tracks.push(TrackNotes { notes });
        }
    }

    let duration = tracks
        .iter()
        .flat_map(|t| t.notes.iter())
        .map(|n| n.start + n.duration)
        .fold(0.0_f64, f64::max);

    Ok(Sequence { tracks, duration })
}

/// Finds the first tempo meta event across all tracks, in track order.
fn first_tempo(tracks: &[Vec<TrackEvent>]) -> Option<u32> {
    for track in tracks {
        for event in track {
            if let TrackEventKind::Meta(MetaMessage::Tempo(t)) = event.kind {
                let usec = t.as_int();
                if usec > 0 {
                    return Some(usec);
                }
            }
        }
    }
    None
}

/// Walks one MIDI track and pairs note-on/note-off events into notes.
///
/// Pairing is per (channel, pitch); a NoteOn with velocity 0 counts as a
/// NoteOff. Notes still sounding at end of track are closed there.
fn collect_notes(track: &[TrackEvent], seconds_per_tick: f64) -> Vec<Note> {
    // Key is (channel, pitch), value is (start_tick, velocity).
    let mut active: HashMap<(u8, u8), (u64, u8)> = HashMap::new();
    let mut notes = Vec::new();
    let mut current_tick: u64 = 0;

    let close = |notes: &mut Vec<Note>, pitch: u8, start: u64, vel: u8, end: u64| {
        let start_secs = start as f64 * seconds_per_tick;
        let duration = end.saturating_sub(start) as f64 * seconds_per_tick;
        notes.push(Note {
            pitch,
            velocity: vel as f32 / 127.0,
            start: start_secs,
            duration,
        });
    };

    for event in track {
        current_tick += event.delta.as_int() as u64;

        let TrackEventKind::Midi { channel, message } = event.kind else {
            continue;
        };
        let ch = channel.as_int();

        match message {
            MidiMessage::NoteOn { key, vel } => {
                let pitch = key.as_int();
                if vel.as_int() > 0 {
                    // A retrigger before the matching off keeps the first
                    // start; the original sounding note wins.
                    active
                        .entry((ch, pitch))
                        .or_insert((current_tick, vel.as_int()));
                } else if let Some((start, v)) = active.remove(&(ch, pitch)) {
                    close(&mut notes, pitch, start, v, current_tick);
                }
            }
            MidiMessage::NoteOff { key, .. } => {
                let pitch = key.as_int();
                if let Some((start, v)) = active.remove(&(ch, pitch)) {
                    close(&mut notes, pitch, start, v, current_tick);
                }
            }
            _ => {}
        }
    }

    // Close any notes the file never terminated.
    for ((_, pitch), (start, vel)) in active {
        close(&mut notes, pitch, start, vel, current_tick);
    }

    notes.sort_by(|a, b| a.start.total_cmp(&b.start));
    notes
}
