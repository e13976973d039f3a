//! Queue table with virtual scrolling.

use ratatui::layout::{Constraint, Rect};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use super::truncate_str;
use crate::tui::app::{App, Focus, SortColumn};
use crate::tui::theme::current_theme;

/// Render the queue table.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let theme = current_theme();

    let border_style = if app.focus == Focus::Queue {
        theme.border_focused
    } else {
        theme.border
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" Queue ({}) ", app.queue_ids.len()));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(error) = app.queue_snapshot.error_text() {
        let text = Paragraph::new(error.to_string())
            .style(theme.log_error)
            .wrap(Wrap { trim: false });
        frame.render_widget(text, inner);
        return;
    }

    if inner.height < 2 {
        return;
    }

    // Header row takes 1 line, rest is data
    let viewport_height = (inner.height as usize).saturating_sub(1);
    app.queue_viewport_height = viewport_height;
    app.ensure_selected_visible();

    let mark_w = 2u16;
    let age_w = 6u16;
    let size_w = 7u16;
    let id_w = 17u16;
    let sender_w = 28u16.min(inner.width / 3);
    let fixed = mark_w + age_w + size_w + id_w + sender_w + 5;
    let rcpt_w = inner.width.saturating_sub(fixed);

    let constraints = [
        Constraint::Length(mark_w),
        Constraint::Length(age_w),
        Constraint::Length(size_w),
        Constraint::Length(id_w),
        Constraint::Length(sender_w),
        Constraint::Min(rcpt_w),
    ];

    let sort_arrow = |col: SortColumn| -> &str {
        match (app.sort_column == col, app.sort_ascending) {
            (false, _) => "",
            (true, true) => " ^",
            (true, false) => " v",
        }
    };
    let header = Row::new(vec![
        " ".to_string(),
        format!("Age{}", sort_arrow(SortColumn::Age)),
        format!("Size{}", sort_arrow(SortColumn::Size)),
        format!("Id{}", sort_arrow(SortColumn::Id)),
        format!("Sender{}", sort_arrow(SortColumn::Sender)),
        "Recipients".to_string(),
    ])
    .style(theme.list_header);

    let start = app.queue_scroll_offset;
    let end = (start + viewport_height).min(app.queue_ids.len());

    let rows: Vec<Row> = (start..end)
        .filter_map(|idx| {
            let id = &app.queue_ids[idx];
            let message = app.queue_snapshot.get(id)?;
            let is_marked = app.marked.contains(id);

            let style = if idx == app.selected {
                theme.list_selected
            } else if is_marked {
                theme.list_marked
            } else if message.frozen {
                theme.list_frozen
            } else {
                theme.list_normal
            };

            let mut recipients = message.recipients.join(", ");
            if message.frozen {
                recipients.insert_str(0, "*** frozen *** ");
            }

            Some(
                Row::new(vec![
                    if is_marked { "*" } else { " " }.to_string(),
                    message.age.clone(),
                    message.size.clone(),
                    message.id.clone(),
                    truncate_str(&message.sender, sender_w as usize),
                    truncate_str(&recipients, rcpt_w as usize),
                ])
                .style(style),
            )
        })
        .collect();

    let table = Table::new(rows, constraints)
        .header(header)
        .column_spacing(1);

    frame.render_widget(table, inner);
}
