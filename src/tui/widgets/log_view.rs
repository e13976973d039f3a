//! Log pane: the tail of the Exim main log with time and message id highlighted.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::model::logline;
use crate::tui::app::{App, Focus};
use crate::tui::theme::{current_theme, Theme};

/// Render the log pane.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let theme = current_theme();

    let border_style = if app.focus == Focus::Log {
        theme.border_focused
    } else {
        theme.border
    };
    let title = if app.log_scroll > 0 {
        format!(" Main log (-{}) ", app.log_scroll)
    } else {
        " Main log ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let height = inner.height as usize;
    app.log_viewport_height = height;

    let end = app.log_lines.len().saturating_sub(app.log_scroll);
    let start = end.saturating_sub(height);
    let lines: Vec<Line> = app
        .log_lines
        .range(start..end)
        .map(|raw| styled_line(raw, &theme))
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn styled_line<'a>(raw: &'a str, theme: &Theme) -> Line<'a> {
    if raw.starts_with("Error: ") {
        return Line::from(Span::styled(raw, theme.log_error));
    }
    let parts = logline::split(raw);
    let mut spans = Vec::with_capacity(3);
    if let Some(time) = parts.time {
        spans.push(Span::styled(time, theme.log_time));
    }
    if let Some(id) = parts.message_id {
        spans.push(Span::styled(id, theme.log_message_id));
    }
    spans.push(Span::styled(parts.rest, theme.log_text));
    Line::from(spans)
}
