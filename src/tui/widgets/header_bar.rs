//! Top header bar showing the monitored host and queue totals.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::tui::app::App;
use crate::tui::theme::current_theme;

/// Render the top header bar.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let theme = current_theme();
    let snapshot = &app.queue_snapshot;

    let mut spans = vec![
        Span::styled(format!(" eximshell @ {}", app.location()), theme.header_bar),
        Span::styled(format!(" | {}", app.queue_snapshot.summary()), theme.header_bar),
    ];

    if snapshot.error_text().is_none() && !snapshot.is_empty() {
        let size = humansize::format_size(snapshot.total_size(), humansize::BINARY);
        spans.push(Span::styled(format!(" {size}"), theme.header_bar));
    }

    let marked = app.marked.len();
    if marked > 0 {
        spans.push(Span::styled(format!(" | {marked} marked"), theme.header_bar));
    }

    if !app.log_attached() {
        spans.push(Span::styled(" | log detached", theme.status_error));
    }

    // Right-aligned help hint
    let left_len: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let right_text = " [?] Help ";
    let width = area.width as usize;
    if width > left_len + right_text.len() {
        spans.push(Span::styled(
            " ".repeat(width - left_len - right_text.len()),
            theme.header_bar,
        ));
    }
    spans.push(Span::styled(right_text, theme.header_bar));

    let bar = Paragraph::new(Line::from(spans)).style(theme.header_bar);
    frame.render_widget(bar, area);
}
