//! Transport bar rendering.
//!
//! Playback state badge, current/total time, the seek bar, and the status
//! message area.

use crate::app::App;
use crate::playback::{format_clock, Phase, TransportView};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

/// Published transport position state. Implements the playback core's
/// [`TransportView`] interface; the seek bar and clock render from it.
pub struct TransportBarState {
    fraction: f64,
    time_label: String,
    duration_label: String,
}

impl Default for TransportBarState {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            time_label: format_clock(0.0),
            duration_label: format_clock(0.0),
        }
    }
}

impl TransportBarState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn time_label(&self) -> &str {
        &self.time_label
    }

    pub fn duration_label(&self) -> &str {
        &self.duration_label
    }

    /// Set when a new timeline is loaded.
    pub fn set_duration_label(&mut self, label: String) {
        self.duration_label = label;
    }
}

impl TransportView for TransportBarState {
    fn set_position(&mut self, fraction: f64) {
        self.fraction = fraction.clamp(0.0, 1.0);
    }

    fn set_time_label(&mut self, label: String) {
        self.time_label = label;
    }
}

/// Renders the transport bar. Returns the seek bar's rectangle for mouse
/// hit testing.
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) -> Rect {
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12), // State badge
            Constraint::Length(16), // Clock
            Constraint::Min(20),    // Seek bar
            Constraint::Length(30), // Status message
        ])
        .split(inner);

    let badge = if !app.audio_enabled {
        Span::styled(
            " [x] MUTE ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        match app.scheduler.phase() {
            Phase::Playing => Span::styled(
                " [>] PLAY ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Phase::Paused => Span::styled(
                " [||] PAUSE ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Phase::Stopped => Span::styled(
                " [.] STOP ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        }
    };
    frame.render_widget(Paragraph::new(Line::from(badge)), chunks[0]);

    let clock = Paragraph::new(Line::from(vec![
        Span::styled(
            app.transport_bar.time_label().to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" / ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.transport_bar.duration_label().to_string(),
            Style::default().fg(Color::Gray),
        ),
    ]));
    frame.render_widget(clock, chunks[1]);

    let gauge_style = if app.audio_enabled {
        Style::default().fg(Color::Cyan).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::DarkGray).bg(Color::Black)
    };
    let gauge = Gauge::default()
        .gauge_style(gauge_style)
        .ratio(app.transport_bar.fraction().clamp(0.0, 1.0))
        .label("");
    frame.render_widget(gauge, chunks[2]);

    let status = if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(
            format!(" {}", msg),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(status), chunks[3]);

    chunks[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_position_clamps() {
        let mut bar = TransportBarState::new();
        bar.set_position(1.7);
        assert_eq!(bar.fraction(), 1.0);
        bar.set_position(-0.3);
        assert_eq!(bar.fraction(), 0.0);
        bar.set_position(0.25);
        assert_eq!(bar.fraction(), 0.25);
    }

    #[test]
    fn test_labels_default_to_zero_clock() {
        let bar = TransportBarState::new();
        assert_eq!(bar.time_label(), "00:00");
        assert_eq!(bar.duration_label(), "00:00");
    }
}
