//! Bottom status bar showing transient messages or context-sensitive keyboard hints.

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::app::{App, Focus};
use crate::tui::theme::current_theme;

/// Render the status bar with hints (or the latest status message) and the
/// process summary on the right.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let theme = current_theme();

    let mut right_text = app.process_snapshot.summary.clone();
    if app.actions_running > 0 {
        right_text = format!("{} running | {right_text}", app.actions_running);
    }
    let right_text = format!("{right_text} ");
    let right_width = right_text.chars().count() as u16;

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(right_width)])
        .split(area);

    let content = if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(format!(" {msg}"), theme.status_bar))
    } else {
        let mut spans = Vec::new();
        for (i, (key, desc)) in build_hints(app).iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" ", theme.status_bar));
            }
            spans.push(Span::styled(format!(" {key}"), theme.key_hint));
            spans.push(Span::styled(format!(":{desc}"), theme.status_bar));
        }
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(content).style(theme.status_bar), chunks[0]);

    let right = Paragraph::new(Line::from(Span::styled(right_text, theme.border)))
        .alignment(Alignment::Right)
        .style(theme.status_bar);
    frame.render_widget(right, chunks[1]);
}

/// Return hint pairs (key, description) for the focused panel.
fn build_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    match app.focus {
        Focus::Log => vec![
            ("j/k", "Scroll"),
            ("T", if app.config.display.track_log { "Pause" } else { "Follow" }),
            ("Tab", "Queue"),
            ("p", "Processes"),
            ("?", "Help"),
            ("q", "Quit"),
        ],
        Focus::Queue => vec![
            ("j/k", "Navigate"),
            ("Space", "Mark"),
            ("Enter", "Body"),
            ("f/t", "Freeze/Thaw"),
            ("d", "Deliver"),
            ("x", "Remove"),
            ("s", "Sort"),
            ("Tab", "Log"),
            ("?", "Help"),
            ("q", "Quit"),
        ],
    }
}
