//! Color theme definitions for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// A complete color theme for the TUI.
pub struct Theme {
    pub header_bar: Style,
    pub status_bar: Style,
    pub status_error: Style,
    pub list_selected: Style,
    pub list_marked: Style,
    pub list_header: Style,
    pub list_normal: Style,
    pub list_frozen: Style,
    pub log_time: Style,
    pub log_message_id: Style,
    pub log_text: Style,
    pub log_error: Style,
    pub plot: [Style; 5],
    pub border: Style,
    pub border_focused: Style,
    pub popup: Style,
    pub popup_title: Style,
    pub key_hint: Style,
    pub help_dim: Style,
}

impl Theme {
    /// Dark theme (default).
    pub fn dark() -> Self {
        Self {
            header_bar: Style::default()
                .fg(Color::Rgb(200, 200, 220))
                .bg(Color::Rgb(30, 30, 46)),
            status_bar: Style::default()
                .fg(Color::Rgb(150, 150, 170))
                .bg(Color::Rgb(30, 30, 46)),
            status_error: Style::default()
                .fg(Color::Rgb(255, 120, 120))
                .bg(Color::Rgb(30, 30, 46))
                .add_modifier(Modifier::BOLD),
            list_selected: Style::default()
                .fg(Color::White)
                .bg(Color::Rgb(60, 60, 100)),
            list_marked: Style::default().fg(Color::Yellow),
            list_header: Style::default()
                .fg(Color::Rgb(180, 180, 200))
                .bg(Color::Rgb(40, 40, 60))
                .add_modifier(Modifier::BOLD),
            list_normal: Style::default().fg(Color::Rgb(200, 200, 220)),
            list_frozen: Style::default().fg(Color::Rgb(120, 180, 255)),
            log_time: Style::default().fg(Color::Rgb(120, 120, 140)),
            log_message_id: Style::default()
                .fg(Color::Rgb(130, 170, 255))
                .add_modifier(Modifier::BOLD),
            log_text: Style::default().fg(Color::Rgb(220, 220, 230)),
            log_error: Style::default().fg(Color::Rgb(255, 120, 120)),
            plot: [
                Style::default().fg(Color::Green),
                Style::default().fg(Color::Cyan),
                Style::default().fg(Color::Magenta),
                Style::default().fg(Color::Yellow),
                Style::default().fg(Color::Red),
            ],
            border: Style::default().fg(Color::Rgb(80, 80, 100)),
            border_focused: Style::default()
                .fg(Color::Rgb(130, 170, 255))
                .add_modifier(Modifier::BOLD),
            popup: Style::default()
                .fg(Color::Rgb(220, 220, 230))
                .bg(Color::Rgb(20, 20, 35)),
            popup_title: Style::default()
                .fg(Color::Rgb(130, 170, 255))
                .add_modifier(Modifier::BOLD),
            key_hint: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            help_dim: Style::default().fg(Color::Rgb(120, 120, 140)),
        }
    }
}

/// Return the active theme.
pub fn current_theme() -> Theme {
    Theme::dark()
}
