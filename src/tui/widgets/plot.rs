//! Activity plot: one sparkline per message-rate series.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders, Sparkline};
use ratatui::Frame;

use crate::stats::{scale, Series};
use crate::tui::app::App;
use crate::tui::theme::current_theme;

/// Sparkline resolution; values are scaled into `0..=PLOT_MAX`.
const PLOT_MAX: u64 = 100;

/// Render the activity plot.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let theme = current_theme();
    let series = app.meter.series();
    if series.is_empty() {
        return;
    }

    let constraints = vec![Constraint::Ratio(1, series.len() as u32); series.len()];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (i, (s, column)) in series.iter().zip(columns.iter()).enumerate() {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border)
            .title(format!(" {} ", s.caption()));
        let width = block.inner(*column).width as usize;
        let data = scaled_tail(s, width);
        let sparkline = Sparkline::default()
            .block(block)
            .data(data)
            .max(PLOT_MAX)
            .style(theme.plot[i % theme.plot.len()]);
        frame.render_widget(sparkline, *column);
    }
}

/// The newest `width` samples of `series`, scaled to the plot range.
fn scaled_tail(series: &Series, width: usize) -> Vec<u64> {
    let history = series.history();
    let factor = scale(history.iter().copied()) * PLOT_MAX as f64;
    history
        .iter()
        .skip(history.len().saturating_sub(width))
        .map(|v| (v * factor).round().clamp(0.0, PLOT_MAX as f64) as u64)
        .collect()
}
