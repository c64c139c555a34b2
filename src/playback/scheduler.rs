//! The transport scheduler: the state machine driving real-time playback.
//!
//! A `play(offset)` builds one batch of future attack/release entries from
//! the timeline, tagged with the current epoch. The per-frame [`tick`]
//! fires every entry that has come due, publishes the position to the
//! transport UI, and auto-stops at the end of the timeline. Cancellation
//! is a batch clear plus an epoch bump; an entry that somehow survives a
//! transition re-checks phase and epoch before acting and is silently
//! discarded when stale.
//!
//! All time-dependent transitions take `now` explicitly; the application
//! passes `Instant::now()` and tests pass synthetic instants.
//!
//! [`tick`]: TransportScheduler::tick

use super::{format_clock, Phase, TransportView};
use crate::audio::{KeyboardView, ToneEngine};
use crate::midi::{Rgb, Timeline};
use std::time::Instant;

/// Everything the scheduler drives when events fire or position changes:
/// the tone engine plus the two view collaborators.
pub struct Sinks<'a> {
    pub engine: &'a mut ToneEngine,
    pub keys: &'a mut dyn KeyboardView,
    pub transport: &'a mut dyn TransportView,
}

impl Sinks<'_> {
    fn apply(&mut self, action: Action) {
        match action {
            Action::Attack {
                pitch,
                velocity,
                color,
            } => self.engine.attack(pitch, velocity, color, &mut *self.keys),
            Action::Release { pitch } => self.engine.release(pitch, &mut *self.keys),
        }
    }

    fn release_all(&mut self) {
        self.engine.release_all(&mut *self.keys);
    }
}

/// What a scheduled entry does when it comes due.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Attack { pitch: u8, velocity: f32, color: Rgb },
    Release { pitch: u8 },
}

/// One future callback: fire time in sequence seconds plus the epoch it
/// was scheduled under.
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    fire_at: f64,
    epoch: u64,
    action: Action,
}

/// The playback state machine.
///
/// Phases and transitions:
///
/// - `Stopped`: no entries pending, displayed position 0.
/// - `Playing`: a batch is pending relative to a start instant; `tick`
///   must be called once per frame.
/// - `Paused`: no entries pending, the offset to resume from is retained.
///
/// Re-entrant `play` while already playing is cancel-then-restart, never
/// a second overlapping schedule.
pub struct TransportScheduler {
    phase: Phase,
    /// Wall-clock instant of the current run's start; position is
    /// `base_offset + (now - started_at)`. None unless Playing.
    started_at: Option<Instant>,
    /// Sequence offset the current run started from.
    base_offset: f64,
    /// Offset to resume from; meaningful only while Paused.
    pause_offset: f64,
    /// Total duration of the timeline the current batch was built from.
    total: f64,
    /// Bumped on every cancellation; pending entries carry the epoch they
    /// were built under.
    epoch: u64,
    /// The current batch, sorted ascending by fire time.
    pending: Vec<Scheduled>,
    /// Index of the first entry not yet fired.
    next_idx: usize,
}

impl Default for TransportScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportScheduler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Stopped,
            started_at: None,
            base_offset: 0.0,
            pause_offset: 0.0,
            total: 0.0,
            epoch: 0,
            pending: Vec::new(),
            next_idx: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    /// The offset a paused run resumes from.
    pub fn pause_offset(&self) -> f64 {
        self.pause_offset
    }

    /// Starts (or restarts) playback at `offset` seconds.
    ///
    /// Cancels whatever was scheduled before, releases all sounding
    /// voices, and schedules an attack at `start_time` plus a release at
    /// `start_time + duration` for every event with `start_time >= offset`.
    /// Events strictly before the offset are skipped entirely: a seek into
    /// the middle of a held note never retroactively attacks it.
    ///
    /// Out-of-range offsets are clamped to `[0, total_duration]`.
    pub fn play(&mut self, offset: f64, now: Instant, timeline: &Timeline, out: &mut Sinks) {
        let total = timeline.total_duration();
        let offset = offset.clamp(0.0, total);

        self.cancel_pending();
        out.release_all();

        for event in timeline.events_from(offset) {
            self.pending.push(Scheduled {
                fire_at: event.start_time,
                epoch: self.epoch,
                action: Action::Attack {
                    pitch: event.pitch,
                    velocity: event.velocity,
                    color: event.color,
                },
            });
            self.pending.push(Scheduled {
                fire_at: event.end_time(),
                epoch: self.epoch,
                action: Action::Release { pitch: event.pitch },
            });
        }
        // Stable: a zero-duration note's attack stays ahead of its release.
        self.pending
            .sort_by(|a, b| a.fire_at.total_cmp(&b.fire_at));

        self.total = total;
        self.started_at = Some(now);
        self.base_offset = offset;
        self.pause_offset = 0.0;
        self.phase = Phase::Playing;
        self.publish_position(offset, out);
        tracing::debug!(offset, entries = self.pending.len(), "playback started");
    }

    /// The per-frame suspension point. Called once per UI frame.
    ///
    /// Fires every entry due at `now`, publishes the position, and
    /// transitions to `stop` once the end of the timeline is reached.
    /// No-op unless Playing.
    pub fn tick(&mut self, now: Instant, out: &mut Sinks) {
        if self.phase != Phase::Playing {
            return;
        }

        let elapsed = self.position_at(now);

        while self.next_idx < self.pending.len() && self.pending[self.next_idx].fire_at <= elapsed
        {
            let entry = self.pending[self.next_idx];
            self.next_idx += 1;
            // A callback from a superseded schedule acts on nothing.
            if self.phase != Phase::Playing || entry.epoch != self.epoch {
                continue;
            }
            out.apply(entry.action);
        }

        self.publish_position(elapsed, out);

        if elapsed >= self.total {
            self.stop(out);
        }
    }

    /// Pauses playback, remembering the current offset. No-op unless
    /// Playing. The position display holds its last value.
    pub fn pause(&mut self, now: Instant, out: &mut Sinks) {
        if self.phase != Phase::Playing {
            return;
        }
        self.pause_offset = self.position_at(now);
        self.cancel_pending();
        out.release_all();
        self.started_at = None;
        self.phase = Phase::Paused;
        tracing::debug!(offset = self.pause_offset, "playback paused");
    }

    /// Stops playback, releases all voices, and resets the displayed
    /// position to zero. Also forgets any remembered pause offset; pausing
    /// is the only stop-with-memory transition.
    pub fn stop(&mut self, out: &mut Sinks) {
        self.cancel_pending();
        out.release_all();
        self.started_at = None;
        self.base_offset = 0.0;
        self.pause_offset = 0.0;
        self.phase = Phase::Stopped;
        out.transport.set_position(0.0);
        out.transport.set_time_label(format_clock(0.0));
    }

    /// Stop-then-play at the target offset (clamped). Always ends up
    /// Playing, regardless of the prior phase.
    pub fn seek(&mut self, target: f64, now: Instant, timeline: &Timeline, out: &mut Sinks) {
        self.stop(out);
        self.play(target, now, timeline, out);
    }

    /// The play-button intent: resume from pause, or start from the top.
    pub fn toggle(&mut self, now: Instant, timeline: &Timeline, out: &mut Sinks) {
        match self.phase {
            Phase::Playing => self.pause(now, out),
            Phase::Paused => {
                let offset = self.pause_offset;
                self.play(offset, now, timeline, out);
            }
            Phase::Stopped => self.play(0.0, now, timeline, out),
        }
    }

    /// Current position in seconds, clamped to the timeline length.
    pub fn position_at(&self, now: Instant) -> f64 {
        match self.started_at {
            Some(started) => {
                (self.base_offset + now.duration_since(started).as_secs_f64()).min(self.total)
            }
            None => 0.0,
        }
    }

    fn publish_position(&self, elapsed: f64, out: &mut Sinks) {
        let fraction = if self.total > 0.0 {
            elapsed / self.total
        } else {
            0.0
        };
        out.transport.set_position(fraction);
        out.transport.set_time_label(format_clock(elapsed));
    }

    fn cancel_pending(&mut self) {
        self.pending.clear();
        self.next_idx = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{Note, NoteOverlay, Sequence, TrackNotes};
    use std::time::Duration;

    struct TestKeys {
        /// Every set_active call in order.
        events: Vec<(u8, bool)>,
    }

    impl KeyboardView for TestKeys {
        fn set_active(&mut self, pitch: u8, active: bool) {
            self.events.push((pitch, active));
        }
        fn add_overlay(&mut self, _pitch: u8, _overlay: &NoteOverlay) {}
        fn clear_overlays(&mut self) {}
    }

    struct TestBar {
        fraction: f64,
        label: String,
    }

    impl TransportView for TestBar {
        fn set_position(&mut self, fraction: f64) {
            self.fraction = fraction;
        }
        fn set_time_label(&mut self, label: String) {
            self.label = label;
        }
    }

    struct Harness {
        engine: ToneEngine,
        keys: TestKeys,
        bar: TestBar,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                engine: ToneEngine::muted(),
                keys: TestKeys { events: Vec::new() },
                bar: TestBar {
                    fraction: -1.0,
                    label: String::new(),
                },
            }
        }

        fn sinks(&mut self) -> Sinks<'_> {
            Sinks {
                engine: &mut self.engine,
                keys: &mut self.keys,
                transport: &mut self.bar,
            }
        }

        fn attacks_of(&self, pitch: u8) -> usize {
            self.keys
                .events
                .iter()
                .filter(|&&(p, active)| p == pitch && active)
                .count()
        }
    }

    /// The two-event reference timeline: pitch 60 at t=0 for 1.0s,
    /// pitch 64 at t=0.5 for 0.5s, both track 0. Total duration 1.0s.
    fn two_note_timeline() -> Timeline {
        let notes = vec![
            Note {
                pitch: 60,
                velocity: 0.8,
                start: 0.0,
                duration: 1.0,
            },
            Note {
                pitch: 64,
                velocity: 0.8,
                start: 0.5,
                duration: 0.5,
            },
        ];
        Timeline::build(&Sequence {
            tracks: vec![TrackNotes { notes }],
            duration: 1.0,
        })
    }

    fn at(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_play_then_immediate_stop_is_clean() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.tick(t0, &mut h.sinks());
        assert!(h.engine.is_sounding(60));

        sched.stop(&mut h.sinks());
        assert_eq!(sched.phase(), Phase::Stopped);
        assert_eq!(h.engine.voice_count(), 0);
        assert_eq!(h.bar.fraction, 0.0);
        assert_eq!(h.bar.label, "00:00");
    }

    #[test]
    fn test_reference_scenario_fires_in_order() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());

        sched.tick(t0, &mut h.sinks());
        assert!(h.engine.is_sounding(60));
        assert!(!h.engine.is_sounding(64));

        // At t=0.6 both notes overlap.
        sched.tick(at(t0, 600), &mut h.sinks());
        assert_eq!(h.engine.voice_count(), 2);

        // At t=1.0 both release and the run auto-stops.
        sched.tick(at(t0, 1000), &mut h.sinks());
        assert_eq!(h.engine.voice_count(), 0);
        assert_eq!(sched.phase(), Phase::Stopped);
        assert_eq!(h.bar.fraction, 0.0);

        assert_eq!(
            h.keys.events,
            vec![(60, true), (64, true), (60, false), (64, false)]
        );
    }

    #[test]
    fn test_seek_skips_events_before_offset() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        // 0.6 is past both start times: nothing is scheduled, the clock
        // silently runs out.
        sched.seek(0.6, t0, &timeline, &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Playing);

        sched.tick(at(t0, 200), &mut h.sinks());
        assert_eq!(h.engine.voice_count(), 0);

        sched.tick(at(t0, 400), &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Stopped);
        assert!(h.keys.events.is_empty());
    }

    #[test]
    fn test_seek_schedules_exactly_the_tail() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.seek(0.5, t0, &timeline, &mut h.sinks());
        sched.tick(t0, &mut h.sinks());

        // Pitch 64 starts exactly at the offset and fires; pitch 60
        // started strictly before it and never does.
        assert!(h.engine.is_sounding(64));
        assert_eq!(h.attacks_of(60), 0);
        assert_eq!(h.attacks_of(64), 1);
    }

    #[test]
    fn test_pause_resume_fires_nothing_twice() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.tick(t0, &mut h.sinks());
        assert!(h.engine.is_sounding(60));

        sched.pause(at(t0, 250), &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Paused);
        assert_eq!(sched.pause_offset(), 0.25);
        // Pausing releases everything.
        assert_eq!(h.engine.voice_count(), 0);

        // Resume where we left off, on a fresh wall clock.
        let t1 = Instant::now();
        let offset = sched.pause_offset();
        sched.play(offset, t1, &timeline, &mut h.sinks());
        sched.tick(at(t1, 300), &mut h.sinks()); // sequence time 0.55

        // Only the tail event fired; pitch 60 was attacked exactly once,
        // before the pause.
        assert!(h.engine.is_sounding(64));
        assert!(!h.engine.is_sounding(60));
        assert_eq!(h.attacks_of(60), 1);
        assert_eq!(h.attacks_of(64), 1);
    }

    #[test]
    fn test_pause_is_noop_unless_playing() {
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        sched.pause(Instant::now(), &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Stopped);
        assert_eq!(sched.pause_offset(), 0.0);
    }

    #[test]
    fn test_stop_forgets_pause_offset() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.pause(at(t0, 500), &mut h.sinks());
        assert_eq!(sched.pause_offset(), 0.5);

        sched.stop(&mut h.sinks());
        assert_eq!(sched.pause_offset(), 0.0);
    }

    #[test]
    fn test_restart_while_playing_cancels_first_schedule() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.tick(t0, &mut h.sinks());
        assert!(h.engine.is_sounding(60));

        // Re-entrant play is cancel-then-restart: the old voice is
        // released and the old schedule is gone.
        sched.play(0.6, at(t0, 100), &timeline, &mut h.sinks());
        assert_eq!(h.engine.voice_count(), 0);

        sched.tick(at(t0, 200), &mut h.sinks());
        // Nothing from the superseded run fires again.
        assert_eq!(h.attacks_of(60), 1);
        assert_eq!(h.attacks_of(64), 0);
    }

    #[test]
    fn test_stale_epoch_entry_is_discarded() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        // Start past all events so the real batch is empty.
        sched.play(0.6, t0, &timeline, &mut h.sinks());

        // Simulate a callback that survived a best-effort cancellation:
        // due immediately, but tagged with a dead epoch.
        sched.pending.push(Scheduled {
            fire_at: 0.6,
            epoch: sched.epoch.wrapping_sub(1),
            action: Action::Attack {
                pitch: 60,
                velocity: 0.8,
                color: crate::midi::track_color(0),
            },
        });
        sched.next_idx = 0;

        sched.tick(t0, &mut h.sinks());
        assert_eq!(h.engine.voice_count(), 0);
        assert!(h.keys.events.is_empty());
    }

    #[test]
    fn test_seek_clamps_out_of_range_targets() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        // Below range: clamped to 0, full schedule (two entries per note).
        sched.seek(-3.0, t0, &timeline, &mut h.sinks());
        assert_eq!(sched.pending.len(), 4);
        assert_eq!(sched.base_offset, 0.0);

        // Past the end: clamped to the total; first tick auto-stops.
        sched.seek(99.0, t0, &timeline, &mut h.sinks());
        assert_eq!(sched.base_offset, 1.0);
        sched.tick(t0, &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Stopped);
    }

    #[test]
    fn test_toggle_cycles_phases() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.toggle(t0, &timeline, &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Playing);

        sched.toggle(at(t0, 250), &timeline, &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Paused);

        sched.toggle(at(t0, 300), &timeline, &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Playing);
        // Resumed from the remembered offset.
        assert_eq!(sched.base_offset, 0.25);
    }

    #[test]
    fn test_position_published_each_tick() {
        let timeline = two_note_timeline();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.tick(at(t0, 500), &mut h.sinks());
        assert!((h.bar.fraction - 0.5).abs() < 1e-9);
        assert_eq!(h.bar.label, "00:00");
    }

    #[test]
    fn test_empty_timeline_stops_on_first_tick() {
        let timeline = Timeline::empty();
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.tick(t0, &mut h.sinks());
        assert_eq!(sched.phase(), Phase::Stopped);
    }

    #[test]
    fn test_zero_duration_note_flashes_and_clears() {
        let notes = vec![Note {
            pitch: 60,
            velocity: 0.8,
            start: 0.0,
            duration: 0.0,
        }];
        let timeline = Timeline::build(&Sequence {
            tracks: vec![TrackNotes { notes }],
            duration: 0.25,
        });
        let mut h = Harness::new();
        let mut sched = TransportScheduler::new();
        let t0 = Instant::now();

        sched.play(0.0, t0, &timeline, &mut h.sinks());
        sched.tick(t0, &mut h.sinks());

        // Attack then release within the same tick: no voice left behind.
        assert_eq!(h.keys.events, vec![(60, true), (60, false)]);
        assert_eq!(h.engine.voice_count(), 0);
    }
}
