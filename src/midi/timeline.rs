//! The playback timeline: every note from every track, flattened into one
//! time-ordered event list tagged with its track's display color, plus the
//! precomputed visual overlays the keyboard draws per key.
//!
//! Built wholesale on every file load and never mutated afterwards.

use super::import::Sequence;

/// A plain RGB display color. Kept UI-toolkit-agnostic so the playback core
/// stays headless; the terminal layer converts to its own color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Rough perceived brightness in [0.0, 1.0], used for the cosmetic
    /// per-voice filter tint.
    pub fn brightness(&self) -> f32 {
        (self.r as f32 + self.g as f32 + self.b as f32) / 765.0
    }
}

/// Display colors assigned to tracks, wrapping around when a file has more
/// tracks than palette entries.
pub const TRACK_PALETTE: [Rgb; 16] = [
    Rgb::new(0xf4, 0x43, 0x36),
    Rgb::new(0xe9, 0x1e, 0x63),
    Rgb::new(0x9c, 0x27, 0xb0),
    Rgb::new(0x3f, 0x51, 0xb5),
    Rgb::new(0x03, 0xa9, 0xf4),
    Rgb::new(0x00, 0x96, 0x88),
    Rgb::new(0x4c, 0xaf, 0x50),
    Rgb::new(0xcd, 0xdc, 0x39),
    Rgb::new(0xff, 0xeb, 0x3b),
    Rgb::new(0xff, 0x98, 0x00),
    Rgb::new(0x79, 0x55, 0x48),
    Rgb::new(0x60, 0x7d, 0x8b),
    Rgb::new(0x8b, 0xc3, 0x4a),
    Rgb::new(0x00, 0xbc, 0xd4),
    Rgb::new(0xff, 0x57, 0x22),
    Rgb::new(0x67, 0x3a, 0xb7),
];

/// Returns the palette color for a track index.
#[inline]
pub fn track_color(track_index: usize) -> Rgb {
    TRACK_PALETTE[track_index % TRACK_PALETTE.len()]
}

/// Notes shorter than this are scheduled for playback but not drawn as
/// overlays.
pub const MIN_OVERLAY_DURATION: f64 = 0.02;

/// One playback event: a note with its track tag and display color.
///
/// Immutable once the timeline is built.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// MIDI note number (0-127).
    pub pitch: u8,
    /// Normalized velocity (0.0-1.0).
    pub velocity: f32,
    /// Start time in seconds from sequence start.
    pub start_time: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Index of the source track.
    pub track_index: usize,
    /// Display color derived from the track index.
    pub color: Rgb,
}

impl NoteEvent {
    /// End time in seconds (start + duration).
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// A static colored bar drawn on one key, sized by note duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOverlay {
    /// Monotonic in duration, clamped to the original pixel range [2, 18].
    pub height_hint: f32,
    /// Monotonic in duration, clamped to [0.5, 1.0].
    pub opacity_hint: f32,
    pub color: Rgb,
}

/// The flattened, time-ordered playback timeline.
pub struct Timeline {
    /// All events, sorted ascending by start time. Ties keep input/track
    /// order (stable sort).
    events: Vec<NoteEvent>,
    /// Precomputed overlays per pitch, in event order.
    overlays: [Vec<NoteOverlay>; 128],
    total_duration: f64,
    track_count: usize,
}

impl Timeline {
    /// Flattens a parsed sequence into a timeline.
    ///
    /// Pure function of its input: tags each note with its track's palette
    /// color, sorts stably by start time, and precomputes the per-key
    /// overlays. Nothing is filtered out of the event list; even
    /// zero-duration notes stay schedulable.
    pub fn build(sequence: &Sequence) -> Self {
        let mut events: Vec<NoteEvent> = Vec::new();
        for (track_index, track) in sequence.tracks.iter().enumerate() {
            let color = track_color(track_index);
            for note in &track.notes {
                events.push(NoteEvent {
                    pitch: note.pitch.min(127),
                    velocity: note.velocity.clamp(0.0, 1.0),
                    start_time: note.start,
                    duration: note.duration,
                    track_index,
                    color,
                });
            }
        }
        // Vec::sort_by is stable; simultaneous notes keep track order.
        events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut overlays: [Vec<NoteOverlay>; 128] = std::array::from_fn(|_| Vec::new());
        for event in &events {
            if event.duration < MIN_OVERLAY_DURATION {
                continue;
            }
            overlays[event.pitch as usize].push(NoteOverlay {
                height_hint: (event.duration * 80.0).clamp(2.0, 18.0) as f32,
                opacity_hint: event.duration.clamp(0.5, 1.0) as f32,
                color: event.color,
            });
        }

        Self {
            events,
            overlays,
            total_duration: sequence.duration,
            track_count: sequence.tracks.len(),
        }
    }

    /// An empty timeline (nothing loaded).
    pub fn empty() -> Self {
        Self::build(&Sequence::default())
    }

    /// All events in playback order.
    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// The events with `start_time >= offset`: exactly the set a playback
    /// run started at `offset` schedules. Events strictly before the offset
    /// are never retroactively fired.
    pub fn events_from(&self, offset: f64) -> &[NoteEvent] {
        let idx = self.events.partition_point(|e| e.start_time < offset);
        &self.events[idx..]
    }

    /// The static overlays for one key, in event order.
    pub fn overlays_for(&self, pitch: u8) -> &[NoteOverlay] {
        &self.overlays[pitch as usize]
    }

    /// Total sequence duration in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Number of source tracks (for the legend).
    pub fn track_count(&self) -> usize {
        self.track_count
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::import::{Note, TrackNotes};

    fn note(pitch: u8, start: f64, duration: f64) -> Note {
        Note {
            pitch,
            velocity: 0.8,
            start,
            duration,
        }
    }

    fn sequence(tracks: Vec<Vec<Note>>) -> Sequence {
        let duration = tracks
            .iter()
            .flatten()
            .map(|n| n.start + n.duration)
            .fold(0.0_f64, f64::max);
        Sequence {
            tracks: tracks
                .into_iter()
                .map(|notes| TrackNotes { notes })
                .collect(),
            duration,
        }
    }

    #[test]
    fn test_flatten_sorts_by_start_time() {
        let seq = sequence(vec![
            vec![note(60, 1.0, 0.5), note(62, 0.0, 0.5)],
            vec![note(64, 0.5, 0.5)],
        ]);
        let timeline = Timeline::build(&seq);
        let starts: Vec<f64> = timeline.events().iter().map(|e| e.start_time).collect();
        assert_eq!(starts, vec![0.0, 0.5, 1.0]);
        assert!((timeline.total_duration() - 1.5).abs() < 1e-9);
        assert_eq!(timeline.track_count(), 2);
    }

    #[test]
    fn test_simultaneous_events_keep_track_order() {
        let seq = sequence(vec![vec![note(60, 0.0, 1.0)], vec![note(64, 0.0, 1.0)]]);
        let timeline = Timeline::build(&seq);
        assert_eq!(timeline.events()[0].track_index, 0);
        assert_eq!(timeline.events()[1].track_index, 1);
    }

    #[test]
    fn test_track_colors_wrap_around_palette() {
        let tracks: Vec<Vec<Note>> = (0..TRACK_PALETTE.len() + 1)
            .map(|_| vec![note(60, 0.0, 1.0)])
            .collect();
        let timeline = Timeline::build(&sequence(tracks));
        let first = timeline
            .events()
            .iter()
            .find(|e| e.track_index == 0)
            .unwrap();
        let wrapped = timeline
            .events()
            .iter()
            .find(|e| e.track_index == TRACK_PALETTE.len())
            .unwrap();
        assert_eq!(first.color, wrapped.color);
    }

    #[test]
    fn test_zero_duration_notes_are_kept_for_scheduling() {
        let seq = sequence(vec![vec![note(60, 0.0, 0.0)]]);
        let timeline = Timeline::build(&seq);
        assert_eq!(timeline.events().len(), 1);
        // ...but produce no overlay.
        assert!(timeline.overlays_for(60).is_empty());
    }

    #[test]
    fn test_overlay_clamps() {
        let seq = sequence(vec![vec![
            note(60, 0.0, 0.03), // short: height and opacity floor
            note(62, 0.0, 10.0), // long: height and opacity ceiling
        ]]);
        let timeline = Timeline::build(&seq);

        let short = timeline.overlays_for(60)[0];
        assert!((short.height_hint - 2.4).abs() < 1e-6);
        assert!((short.opacity_hint - 0.5).abs() < 1e-6);

        let long = timeline.overlays_for(62)[0];
        assert!((long.height_hint - 18.0).abs() < 1e-6);
        assert!((long.opacity_hint - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_events_from_partitions_on_offset() {
        let seq = sequence(vec![vec![
            note(60, 0.0, 1.0),
            note(64, 0.5, 0.5),
            note(67, 1.0, 0.5),
        ]]);
        let timeline = Timeline::build(&seq);

        assert_eq!(timeline.events_from(0.0).len(), 3);
        // An event exactly at the offset is included...
        assert_eq!(timeline.events_from(0.5).len(), 2);
        // ...one strictly before it is not, even if still sounding there.
        assert_eq!(timeline.events_from(0.6).len(), 1);
        assert!(timeline.events_from(2.0).is_empty());
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = Timeline::empty();
        assert!(timeline.is_empty());
        assert_eq!(timeline.total_duration(), 0.0);
        assert_eq!(timeline.track_count(), 0);
    }
}
