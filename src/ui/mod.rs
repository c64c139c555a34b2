//! Terminal user interface components.
//!
//! Layout: transport bar on top, track legend and file info in the middle,
//! the piano keyboard strip at the bottom. Dialogs draw over everything.

mod dialogs;
mod keyboard;
mod legend;
mod transport;

pub use dialogs::render_file_browser;
pub use keyboard::{render_keyboard, KeyboardState};
pub use legend::render_legend;
pub use transport::{render_transport, TransportBarState};

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Renders the complete UI and updates the app's layout regions for mouse
/// hit testing.
pub fn render(frame: &mut Frame, app: &mut App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(4),    // Legend + file info
            Constraint::Length(6), // Keyboard
        ])
        .split(frame.area());

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(22), // Track legend
            Constraint::Min(20),    // File info
        ])
        .split(main_chunks[1]);

    let seek_bar = render_transport(frame, main_chunks[0], app);
    app.layout.seek_bar = seek_bar;

    render_legend(frame, content_chunks[0], app);
    render_info(frame, content_chunks[1], app);
    render_keyboard(frame, main_chunks[2], app);

    render_file_browser(frame, app);
}

/// The "now playing" panel: file name and timeline summary.
fn render_info(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Now Playing ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    match (&app.loaded_path, app.store.timeline()) {
        (Some(path), Some(timeline)) => {
            lines.push(Line::from(vec![
                Span::styled("File:     ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    path.display().to_string(),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Length:   ", Style::default().fg(Color::DarkGray)),
                Span::raw(crate::playback::format_clock(timeline.total_duration())),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Tracks:   ", Style::default().fg(Color::DarkGray)),
                Span::raw(format!("{}", timeline.track_count())),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Notes:    ", Style::default().fg(Color::DarkGray)),
                Span::raw(format!("{}", timeline.events().len())),
            ]));
        }
        _ => {
            lines.push(Line::from(Span::styled(
                "No file loaded. Press [o] to open one.",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    lines.push(Line::from(vec![
        Span::styled("Volume:   ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{:.0}%", app.engine.master_gain() * 100.0)),
    ]));

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
