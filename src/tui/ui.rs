//! Main render function that dispatches to widgets.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use super::app::{App, Popup};
use super::widgets;

/// Height of the activity plot, borders included.
const PLOT_HEIGHT: u16 = 7;

/// Render the entire TUI frame.
pub fn render(frame: &mut Frame, app: &mut App) {
    let display = &app.config.display;
    let plot_height = if display.show_plotter { PLOT_HEIGHT } else { 0 };
    let status_height = u16::from(display.show_statusbar);

    // header | plot | log | queue | status
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(plot_height),
            Constraint::Percentage(45),
            Constraint::Min(5),
            Constraint::Length(status_height),
        ])
        .split(frame.area());

    widgets::header_bar::render(frame, app, vertical[0]);
    if plot_height > 0 {
        widgets::plot::render(frame, app, vertical[1]);
    }
    widgets::log_view::render(frame, app, vertical[2]);
    widgets::queue_list::render(frame, app, vertical[3]);
    if status_height > 0 {
        widgets::status_bar::render(frame, app, vertical[4]);
    }

    // Popups (rendered on top of everything)
    match &app.popup {
        None => {}
        Some(Popup::Help) => widgets::help_popup::render(frame),
        Some(Popup::Processes) => widgets::process_popup::render(frame, app),
        Some(Popup::Confirm { action, ids }) => {
            widgets::confirm_popup::render_confirm(frame, *action, ids)
        }
        Some(Popup::Input { action, id, buffer }) => {
            widgets::confirm_popup::render_input(frame, *action, id, buffer)
        }
        Some(Popup::Text {
            title,
            body,
            scroll,
        }) => widgets::text_popup::render(frame, title, body, *scroll),
    }
}
