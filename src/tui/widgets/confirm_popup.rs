//! Confirmation and single-line input popups for queue actions.

use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use super::centered_rect_exact;
use crate::exim::actions::Action;
use crate::tui::theme::current_theme;

/// Ask whether `action` should run on `ids`.
pub fn render_confirm(frame: &mut Frame, action: Action, ids: &[String]) {
    let theme = current_theme();
    let screen = frame.area();
    let area = centered_rect_exact(60.min(screen.width), 8, screen);
    frame.render_widget(Clear, area);

    let target = match ids {
        [id] => format!("message {id}"),
        _ => format!("{} messages", ids.len()),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {} {target}?", action.label()),
            theme.popup,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  y", theme.key_hint),
            Span::styled(":Yes  ", theme.popup),
            Span::styled("n", theme.key_hint),
            Span::styled(":No", theme.popup),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.popup_title)
        .title(" Confirm ")
        .style(theme.popup);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

/// Prompt for the argument of a single-message edit.
pub fn render_input(frame: &mut Frame, action: Action, id: &str, buffer: &str) {
    let theme = current_theme();
    let screen = frame.area();
    let area = centered_rect_exact(70.min(screen.width), 7, screen);
    frame.render_widget(Clear, area);

    let prompt = match action {
        Action::EditSender => "New sender",
        _ => "Recipients (space separated)",
    };
    let lines = vec![
        Line::from(Span::styled(format!(" {}: {id}", action.label()), theme.help_dim)),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!(" {prompt}: "), theme.key_hint),
            Span::styled(buffer.to_string(), theme.popup),
            Span::styled("_", theme.key_hint),
        ]),
        Line::from(""),
        Line::from(Span::styled(" Enter:Apply  Esc:Cancel", theme.help_dim)),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.popup_title)
        .title(format!(" {} ", action.label()))
        .style(theme.popup);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
