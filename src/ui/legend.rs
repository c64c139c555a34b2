//! Track legend rendering.
//!
//! One line per source track with its palette color swatch, so the colored
//! note overlays on the keyboard can be read back to a track.

use crate::app::App;
use crate::midi::track_color;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem};
use ratatui::Frame;

pub fn render_legend(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Tracks ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let track_count = app
        .store
        .timeline()
        .map_or(0, |timeline| timeline.track_count());

    if track_count == 0 {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            List::new([ListItem::new(Span::styled(
                "(no file loaded)",
                Style::default().fg(Color::DarkGray),
            ))]),
            inner,
        );
        return;
    }

    let items: Vec<ListItem> = (0..track_count)
        .map(|idx| {
            let color = track_color(idx);
            ListItem::new(Line::from(vec![
                Span::styled(
                    "██ ",
                    Style::default().fg(Color::Rgb(color.r, color.g, color.b)),
                ),
                Span::raw(format!("Track {}", idx + 1)),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
