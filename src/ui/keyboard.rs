//! Piano keyboard display.
//!
//! A horizontal strip of the full 128-key MIDI range: an overlay row with
//! the loaded notes as colored marks, the key row itself with lit keys
//! during playback, octave labels, and a key-binding hint line.

use crate::app::App;
use crate::audio::KeyboardView;
use crate::midi::{is_black_key, NoteOverlay};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Visual state of the keyboard widget. Implements the playback core's
/// [`KeyboardView`] callback interface; rendering reads it each frame.
pub struct KeyboardState {
    active: [bool; 128],
    overlays: Vec<Vec<NoteOverlay>>,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            active: [false; 128],
            overlays: vec![Vec::new(); 128],
        }
    }
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, pitch: u8) -> bool {
        self.active[pitch as usize]
    }

    /// The visually dominant overlay for a key: the tallest bar wins.
    pub fn strongest_overlay(&self, pitch: u8) -> Option<&NoteOverlay> {
        self.overlays[pitch as usize]
            .iter()
            .max_by(|a, b| a.height_hint.total_cmp(&b.height_hint))
    }
}

impl KeyboardView for KeyboardState {
    fn set_active(&mut self, pitch: u8, active: bool) {
        if pitch < 128 {
            self.active[pitch as usize] = active;
        }
    }

    fn add_overlay(&mut self, pitch: u8, overlay: &NoteOverlay) {
        if pitch < 128 {
            self.overlays[pitch as usize].push(*overlay);
        }
    }

    fn clear_overlays(&mut self) {
        for bucket in &mut self.overlays {
            bucket.clear();
        }
    }
}

/// Picks the window of keys that fits the available width, centered on
/// middle C when the full range does not fit.
fn visible_range(width: u16) -> (u8, u8) {
    let width = width.min(128);
    if width >= 128 {
        return (0, 128);
    }
    let half = width / 2;
    let start = 60u16.saturating_sub(half).min(128 - width);
    (start as u8, (start + width) as u8)
}

fn overlay_span(overlay: Option<&NoteOverlay>) -> Span<'static> {
    match overlay {
        Some(ov) => {
            let glyph = if ov.height_hint < 6.0 {
                "▁"
            } else if ov.height_hint < 12.0 {
                "▄"
            } else {
                "█"
            };
            let mut style = Style::default().fg(Color::Rgb(ov.color.r, ov.color.g, ov.color.b));
            if ov.opacity_hint < 0.75 {
                style = style.add_modifier(Modifier::DIM);
            }
            Span::styled(glyph.to_string(), style)
        }
        None => Span::raw(" "),
    }
}

fn key_span(pitch: u8, active: bool) -> Span<'static> {
    let style = if active {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else if is_black_key(pitch) {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Black).bg(Color::White)
    };
    Span::styled(" ", style)
}

/// Octave label row: "C-1", "C0", ... under each C key where it fits.
fn label_row(start: u8, end: u8) -> Line<'static> {
    let width = (end - start) as usize;
    let mut cells = vec![' '; width];
    let mut labels: Vec<(usize, String)> = Vec::new();
    for pitch in start..end {
        if pitch % 12 == 0 {
            labels.push((
                (pitch - start) as usize,
                crate::midi::note_to_name(pitch),
            ));
        }
    }
    for (pos, label) in labels {
        if pos + label.len() <= width {
            for (i, ch) in label.chars().enumerate() {
                cells[pos + i] = ch;
            }
        }
    }
    Line::from(Span::styled(
        cells.into_iter().collect::<String>(),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Key-binding hint line.
fn hint_line(audio_enabled: bool) -> Line<'static> {
    let key_style = Style::default().fg(Color::Yellow);
    let bracket_style = Style::default().fg(Color::DarkGray);
    let desc_style = Style::default().fg(Color::DarkGray);

    if !audio_enabled {
        return Line::from(Span::styled(
            "AUDIO UNAVAILABLE - transport disabled  [o] Open  [q] Quit",
            Style::default().fg(Color::Red),
        ));
    }

    Line::from(vec![
        Span::styled("[", bracket_style),
        Span::styled("Space", key_style),
        Span::styled("] Play/Pause  ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("s", key_style),
        Span::styled("] Stop  ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("←→", key_style),
        Span::styled("] Seek  ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("Home", key_style),
        Span::styled("] Rewind  ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("o", key_style),
        Span::styled("] Open  ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("+/-", key_style),
        Span::styled("] Volume  ", desc_style),
        Span::styled("[", bracket_style),
        Span::styled("q", key_style),
        Span::styled("] Quit", desc_style),
    ])
}

/// Renders the keyboard strip at the bottom of the screen.
pub fn render_keyboard(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Keyboard ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height < 1 || inner.width == 0 {
        return;
    }

    let (start, end) = visible_range(inner.width);

    // Row 0: note overlays.
    let overlay_row: Vec<Span> = (start..end)
        .map(|pitch| overlay_span(app.keyboard.strongest_overlay(pitch)))
        .collect();
    frame.render_widget(
        Paragraph::new(Line::from(overlay_row)),
        Rect::new(inner.x, inner.y, inner.width, 1),
    );

    // Row 1: the keys, lit while sounding.
    if inner.height >= 2 {
        let key_row: Vec<Span> = (start..end)
            .map(|pitch| key_span(pitch, app.keyboard.is_active(pitch)))
            .collect();
        frame.render_widget(
            Paragraph::new(Line::from(key_row)),
            Rect::new(inner.x, inner.y + 1, inner.width, 1),
        );
    }

    // Row 2: octave labels.
    if inner.height >= 3 {
        frame.render_widget(
            Paragraph::new(label_row(start, end)),
            Rect::new(inner.x, inner.y + 2, inner.width, 1),
        );
    }

    // Row 3: key hints.
    if inner.height >= 4 {
        frame.render_widget(
            Paragraph::new(hint_line(app.audio_enabled)),
            Rect::new(inner.x, inner.y + 3, inner.width, 1),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::Rgb;

    fn overlay(height: f32, opacity: f32) -> NoteOverlay {
        NoteOverlay {
            height_hint: height,
            opacity_hint: opacity,
            color: Rgb::new(0xf4, 0x43, 0x36),
        }
    }

    #[test]
    fn test_set_active_toggles() {
        let mut state = KeyboardState::new();
        assert!(!state.is_active(60));
        state.set_active(60, true);
        assert!(state.is_active(60));
        state.set_active(60, false);
        assert!(!state.is_active(60));
    }

    #[test]
    fn test_strongest_overlay_prefers_tallest() {
        let mut state = KeyboardState::new();
        state.add_overlay(60, &overlay(4.0, 0.5));
        state.add_overlay(60, &overlay(18.0, 1.0));
        state.add_overlay(60, &overlay(9.0, 0.8));
        assert!((state.strongest_overlay(60).unwrap().height_hint - 18.0).abs() < 1e-6);
    }

    #[test]
    fn test_clear_overlays_empties_every_key() {
        let mut state = KeyboardState::new();
        state.add_overlay(10, &overlay(4.0, 0.5));
        state.add_overlay(120, &overlay(4.0, 0.5));
        state.clear_overlays();
        assert!(state.strongest_overlay(10).is_none());
        assert!(state.strongest_overlay(120).is_none());
    }

    #[test]
    fn test_visible_range_full_width() {
        assert_eq!(visible_range(200), (0, 128));
        assert_eq!(visible_range(128), (0, 128));
    }

    #[test]
    fn test_visible_range_narrow_centers_on_middle_c() {
        let (start, end) = visible_range(40);
        assert_eq!(end - start, 40);
        assert!(start <= 60 && 60 < end);
    }
}
