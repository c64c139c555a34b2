//! Modal dialogs.
//!
//! Currently just the file browser used to load a sequence at runtime.

use crate::app::App;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};
use ratatui::Frame;

/// Renders the file browser popup, if open.
pub fn render_file_browser(frame: &mut Frame, app: &App) {
    if !app.file_browser.open {
        return;
    }

    let area = super::centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);

    let title = format!(" Open MIDI file - {} ", app.file_browser.dir.display());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let items: Vec<ListItem> = if app.file_browser.entries.is_empty() {
        vec![ListItem::new(Span::styled(
            "(no .mid files here)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.file_browser
            .entries
            .iter()
            .map(|entry| {
                let name = entry.display_name();
                let style = if entry.is_dir {
                    Style::default().fg(Color::Blue)
                } else {
                    Style::default().fg(Color::White)
                };
                ListItem::new(Line::from(Span::styled(name, style)))
            })
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.file_browser.entries.is_empty() {
        state.select(Some(app.file_browser.selected));
    }
    frame.render_stateful_widget(list, area, &mut state);
}
