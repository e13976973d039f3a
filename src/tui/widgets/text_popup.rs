//! Scrollable popup for command output: message details, action reports.

use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect;
use crate::tui::theme::current_theme;

pub fn render(frame: &mut Frame, title: &str, body: &str, scroll: u16) {
    let theme = current_theme();
    let area = centered_rect(85, 80, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.popup_title)
        .title(format!(" {title} "))
        .title_bottom(" j/k:Scroll  Esc:Close ")
        .style(theme.popup);

    let text = if body.trim().is_empty() {
        "(no output)"
    } else {
        body
    };
    let paragraph = Paragraph::new(text).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}
