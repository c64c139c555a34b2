//! The playback store: single source of truth for what is loaded.

use super::scheduler::{Sinks, TransportScheduler};
use crate::midi::Timeline;

/// Holds the active timeline and its total duration.
///
/// Replaced wholesale on every file load; the scheduler and the UI consult
/// it but never own timeline data themselves.
#[derive(Default)]
pub struct PlaybackStore {
    timeline: Option<Timeline>,
}

impl PlaybackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the loaded timeline.
    ///
    /// Forces the scheduler to stop (releasing all voices, forgetting any
    /// pause offset) before the swap, so no event from the old timeline can
    /// fire afterwards. Callers that fail to produce a timeline simply never
    /// call this - there is no partial-load state.
    pub fn load(
        &mut self,
        timeline: Timeline,
        scheduler: &mut TransportScheduler,
        out: &mut Sinks,
    ) {
        scheduler.stop(out);
        self.timeline = Some(timeline);
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.timeline.is_some()
    }

    /// Total duration of the loaded timeline, 0.0 when nothing is loaded.
    pub fn total_duration(&self) -> f64 {
        self.timeline.as_ref().map_or(0.0, |t| t.total_duration())
    }
}
