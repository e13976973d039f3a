//! Process list popup (`exiwhat` output).

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table};
use ratatui::Frame;

use super::centered_rect;
use crate::tui::app::App;
use crate::tui::theme::current_theme;

/// Render the process list centered on screen.
pub fn render(frame: &mut Frame, app: &App) {
    let theme = current_theme();
    let area = centered_rect(80, 60, frame.area());

    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.popup_title)
        .title(" Exim processes ")
        .style(theme.popup);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [summary_area, table_area, footer_area]: [Rect; 3] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let snapshot = &app.process_snapshot;
    let summary = if snapshot.summary.is_empty() {
        "Waiting for exiwhat..."
    } else {
        snapshot.summary.as_str()
    };
    frame.render_widget(Paragraph::new(Line::from(summary)).style(theme.popup_title), summary_area);

    let rows: Vec<Row> = snapshot
        .processes
        .iter()
        .map(|(pid, info)| Row::new(vec![pid.to_string(), info.clone()]).style(theme.popup))
        .collect();
    let table = Table::new(rows, [Constraint::Length(8), Constraint::Min(10)])
        .header(Row::new(vec!["PID", "Status"]).style(theme.list_header))
        .column_spacing(1);
    frame.render_widget(table, table_area);

    frame.render_widget(
        Paragraph::new("p/Esc: Close").style(theme.help_dim),
        footer_area,
    );
}
