//! Application state and intent handling.
//!
//! `App` glues the playback core (store, scheduler, tone engine) to the UI
//! state (keyboard, transport bar, dialogs) and translates user intents
//! into scheduler calls.

use crate::audio::{KeyboardView, ToneEngine};
use crate::midi::{load_sequence, Timeline};
use crate::playback::{format_clock, Phase, PlaybackStore, Sinks, TransportScheduler};
use crate::ui::{KeyboardState, TransportBarState};
use ratatui::layout::Rect;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a status message stays visible.
const STATUS_DURATION: Duration = Duration::from_secs(3);

/// How far the arrow keys seek, in seconds.
pub const SEEK_STEP_SECONDS: f64 = 5.0;

/// Screen regions used for mouse hit testing, updated during rendering.
#[derive(Default, Clone, Copy)]
pub struct LayoutRegions {
    /// The seek bar gauge inside the transport block.
    pub seek_bar: Rect,
}

impl LayoutRegions {
    /// Maps a click to a position fraction if it landed on the seek bar.
    pub fn seek_fraction_at(&self, x: u16, y: u16) -> Option<f64> {
        let r = self.seek_bar;
        if r.width == 0 || x < r.x || x >= r.x + r.width || y < r.y || y >= r.y + r.height {
            return None;
        }
        // Center of the clicked cell.
        Some(((x - r.x) as f64 + 0.5) / r.width as f64)
    }
}

/// One row in the file browser.
pub struct BrowserEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    name: String,
}

impl BrowserEntry {
    pub fn display_name(&self) -> &str {
        &self.name
    }
}

/// State for the file browser dialog.
#[derive(Default)]
pub struct FileBrowserState {
    pub open: bool,
    pub dir: PathBuf,
    pub entries: Vec<BrowserEntry>,
    pub selected: usize,
}

/// Main application state.
pub struct App {
    pub store: PlaybackStore,
    pub scheduler: TransportScheduler,
    pub engine: ToneEngine,
    /// False when the audio device could not be opened; transport intents
    /// are refused and the UI renders disabled.
    pub audio_enabled: bool,
    pub keyboard: KeyboardState,
    pub transport_bar: TransportBarState,
    pub file_browser: FileBrowserState,
    pub status_message: Option<(String, Instant)>,
    pub loaded_path: Option<PathBuf>,
    pub layout: LayoutRegions,
}

impl App {
    pub fn new(engine: ToneEngine, audio_enabled: bool) -> Self {
        Self {
            store: PlaybackStore::new(),
            scheduler: TransportScheduler::new(),
            engine,
            audio_enabled,
            keyboard: KeyboardState::new(),
            transport_bar: TransportBarState::new(),
            file_browser: FileBrowserState::default(),
            status_message: None,
            loaded_path: None,
            layout: LayoutRegions::default(),
        }
    }

    /// Loads a sequence file, atomically replacing the current timeline.
    ///
    /// On failure nothing changes: the previous timeline, overlays, and
    /// transport state stay as they were.
    pub fn load_file(&mut self, path: &Path) -> bool {
        let sequence = match load_sequence(path) {
            Ok(sequence) => sequence,
            Err(e) => {
                tracing::error!(path = %path.display(), "load failed: {}", e);
                self.set_status(format!("Load failed: {}", e));
                return false;
            }
        };

        let timeline = Timeline::build(&sequence);

        // Rebuild the key overlays for the new timeline.
        self.keyboard.clear_overlays();
        for pitch in 0..=127u8 {
            for overlay in timeline.overlays_for(pitch) {
                self.keyboard.add_overlay(pitch, overlay);
            }
        }
        self.transport_bar
            .set_duration_label(format_clock(timeline.total_duration()));

        let mut sinks = Sinks {
            engine: &mut self.engine,
            keys: &mut self.keyboard,
            transport: &mut self.transport_bar,
        };
        self.store.load(timeline, &mut self.scheduler, &mut sinks);

        self.loaded_path = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), "sequence loaded");
        self.set_status(format!(
            "Loaded {}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        ));
        true
    }

    /// Advances the scheduler one frame. Called once per event-loop pass.
    pub fn tick(&mut self, now: Instant) {
        let mut sinks = Sinks {
            engine: &mut self.engine,
            keys: &mut self.keyboard,
            transport: &mut self.transport_bar,
        };
        self.scheduler.tick(now, &mut sinks);
    }

    fn transport_ready(&mut self) -> bool {
        if !self.audio_enabled {
            self.set_status("Audio unavailable - transport disabled");
            return false;
        }
        if !self.store.is_loaded() {
            self.set_status("No file loaded");
            return false;
        }
        true
    }

    /// The play button: toggle play/pause, or start from the top.
    pub fn toggle_playback(&mut self, now: Instant) {
        if !self.transport_ready() {
            return;
        }
        let Some(timeline) = self.store.timeline() else {
            return;
        };
        let mut sinks = Sinks {
            engine: &mut self.engine,
            keys: &mut self.keyboard,
            transport: &mut self.transport_bar,
        };
        self.scheduler.toggle(now, timeline, &mut sinks);
        match self.scheduler.phase() {
            Phase::Playing => self.set_status("Playing"),
            Phase::Paused => self.set_status("Paused"),
            Phase::Stopped => {}
        }
    }

    /// The stop button: stop and rewind the displayed position.
    pub fn stop_playback(&mut self) {
        if !self.audio_enabled {
            return;
        }
        let mut sinks = Sinks {
            engine: &mut self.engine,
            keys: &mut self.keyboard,
            transport: &mut self.transport_bar,
        };
        self.scheduler.stop(&mut sinks);
        self.set_status("Stopped");
    }

    /// Seeks to an absolute offset in seconds (clamped by the scheduler).
    pub fn seek_to_seconds(&mut self, target: f64, now: Instant) {
        if !self.transport_ready() {
            return;
        }
        let Some(timeline) = self.store.timeline() else {
            return;
        };
        let mut sinks = Sinks {
            engine: &mut self.engine,
            keys: &mut self.keyboard,
            transport: &mut self.transport_bar,
        };
        self.scheduler.seek(target, now, timeline, &mut sinks);
    }

    /// Seeks to a fraction of the total duration (the seek bar intent).
    pub fn seek_to_fraction(&mut self, fraction: f64, now: Instant) {
        let target = fraction.clamp(0.0, 1.0) * self.store.total_duration();
        self.seek_to_seconds(target, now);
    }

    /// Seeks relative to the current position (arrow key intent).
    pub fn seek_relative(&mut self, delta: f64, now: Instant) {
        let target = self.current_position(now) + delta;
        self.seek_to_seconds(target, now);
    }

    /// The position the user currently perceives: live while playing, the
    /// remembered offset while paused, zero when stopped.
    pub fn current_position(&self, now: Instant) -> f64 {
        match self.scheduler.phase() {
            Phase::Playing => self.scheduler.position_at(now),
            Phase::Paused => self.scheduler.pause_offset(),
            Phase::Stopped => 0.0,
        }
    }

    /// Adjusts the master gain by a delta, clamped to [0.0, 1.0].
    pub fn adjust_gain(&mut self, delta: f32) {
        let gain = self.engine.master_gain() + delta;
        self.engine.set_master_gain(gain);
        self.set_status(format!("Volume {:.0}%", self.engine.master_gain() * 100.0));
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    pub fn clear_expired_status(&mut self) {
        if let Some((_, since)) = &self.status_message {
            if since.elapsed() > STATUS_DURATION {
                self.status_message = None;
            }
        }
    }

    // --- File browser ---

    pub fn open_file_browser(&mut self) {
        let dir = self
            .loaded_path
            .as_ref()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        self.file_browser.dir = dir;
        self.file_browser.open = true;
        self.refresh_file_browser();
    }

    fn refresh_file_browser(&mut self) {
        let dir = self.file_browser.dir.clone();
        let mut dirs: Vec<BrowserEntry> = Vec::new();
        let mut files: Vec<BrowserEntry> = Vec::new();

        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                if path.is_dir() {
                    dirs.push(BrowserEntry {
                        path,
                        is_dir: true,
                        name: format!("{}/", name),
                    });
                } else if is_midi_file(&path) {
                    files.push(BrowserEntry {
                        path,
                        is_dir: false,
                        name,
                    });
                }
            }
        }

        dirs.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut all = Vec::new();
        if let Some(parent) = dir.parent() {
            all.push(BrowserEntry {
                path: parent.to_path_buf(),
                is_dir: true,
                name: "../".to_string(),
            });
        }
        all.extend(dirs);
        all.extend(files);

        self.file_browser.entries = all;
        self.file_browser.selected = 0;
    }

    pub fn file_browser_up(&mut self) {
        self.file_browser.selected = self.file_browser.selected.saturating_sub(1);
    }

    pub fn file_browser_down(&mut self) {
        if !self.file_browser.entries.is_empty() {
            self.file_browser.selected =
                (self.file_browser.selected + 1).min(self.file_browser.entries.len() - 1);
        }
    }

    /// Enter: descend into a directory or load the selected file.
    pub fn file_browser_select(&mut self) {
        let Some(entry) = self.file_browser.entries.get(self.file_browser.selected) else {
            return;
        };
        let path = entry.path.clone();
        if entry.is_dir {
            self.file_browser.dir = path;
            self.refresh_file_browser();
        } else {
            self.file_browser.open = false;
            self.load_file(&path);
        }
    }

    pub fn file_browser_cancel(&mut self) {
        self.file_browser.open = false;
    }
}

/// True for paths with a .mid or .midi extension (case-insensitive).
fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(ToneEngine::muted(), true)
    }

    #[test]
    fn test_is_midi_file() {
        assert!(is_midi_file(Path::new("song.mid")));
        assert!(is_midi_file(Path::new("song.MIDI")));
        assert!(!is_midi_file(Path::new("song.wav")));
        assert!(!is_midi_file(Path::new("song")));
    }

    #[test]
    fn test_transport_refused_without_file() {
        let mut app = test_app();
        app.toggle_playback(Instant::now());
        assert_eq!(app.scheduler.phase(), Phase::Stopped);
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_transport_refused_without_audio() {
        let mut app = App::new(ToneEngine::muted(), false);
        app.toggle_playback(Instant::now());
        assert_eq!(app.scheduler.phase(), Phase::Stopped);
    }

    #[test]
    fn test_failed_load_leaves_state_untouched() {
        let mut app = test_app();
        let missing = Path::new("/definitely/not/here.mid");
        assert!(!app.load_file(missing));
        assert!(!app.store.is_loaded());
        assert!(app.loaded_path.is_none());
    }

    #[test]
    fn test_seek_fraction_hit_testing() {
        let layout = LayoutRegions {
            seek_bar: Rect::new(10, 1, 100, 1),
        };
        assert!(layout.seek_fraction_at(9, 1).is_none());
        assert!(layout.seek_fraction_at(10, 0).is_none());
        let frac = layout.seek_fraction_at(60, 1).unwrap();
        assert!((frac - 0.505).abs() < 1e-9);
        assert!(layout.seek_fraction_at(110, 1).is_none());
    }
}
