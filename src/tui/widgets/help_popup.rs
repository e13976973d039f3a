//! Help popup showing keyboard shortcuts in multi-column layout.

use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect_exact;
use crate::tui::theme::{current_theme, Theme};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A single shortcut entry.
struct Shortcut {
    key: &'static str,
    desc: &'static str,
}

const fn sc(key: &'static str, desc: &'static str) -> Shortcut {
    Shortcut { key, desc }
}

const NAVIGATION: &[Shortcut] = &[
    sc("j / k", "Next / previous"),
    sc("g / G", "First / last"),
    sc("PgDn/Up", "Page scroll"),
    sc("Tab", "Switch log / queue"),
    sc("Esc", "Close popup"),
];

const QUEUE: &[Shortcut] = &[
    sc("Space", "Mark / unmark"),
    sc("*", "Mark all"),
    sc("s", "Cycle sort column"),
    sc("S", "Sort direction"),
    sc("Enter, b", "Message body"),
    sc("h", "Message headers"),
    sc("l", "Message log"),
];

const ACTIONS: &[Shortcut] = &[
    sc("x / Del", "Remove"),
    sc("f", "Freeze"),
    sc("t", "Thaw"),
    sc("d", "Force delivery"),
    sc("u", "Give up (bounce)"),
    sc("m", "Mark all delivered"),
    sc("a", "Add recipients"),
    sc("e", "Edit sender"),
    sc("R", "Run the queue"),
];

const GENERAL: &[Shortcut] = &[
    sc("p", "Process list"),
    sc("P", "Activity plot"),
    sc("T", "Follow the log"),
    sc("B", "Status bar"),
    sc("C", "Exim configuration"),
    sc("W", "Save settings"),
    sc("?", "This help"),
    sc("q", "Quit"),
    sc("Ctrl-C", "Force quit"),
];

/// Render the help popup centered on screen with multi-column shortcuts.
pub fn render(frame: &mut Frame) {
    let theme = current_theme();
    let screen = frame.area();

    let popup_width = (screen.width * 78 / 100).min(screen.width.saturating_sub(4));
    let inner_width = popup_width.saturating_sub(2) as usize;

    let cols = if inner_width >= 90 {
        3
    } else if inner_width >= 56 {
        2
    } else {
        1
    };
    let col_width = inner_width / cols;
    let sep_width = inner_width.saturating_sub(2);

    let lines = build_lines(cols, col_width, sep_width, &theme);

    let content_height = lines.len() as u16 + 1;
    let popup_height = (content_height + 2).min(screen.height.saturating_sub(2));
    let area = centered_rect_exact(popup_width, popup_height, screen);

    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.popup_title)
        .title(" Help ")
        .style(theme.popup);

    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner);
}

fn build_lines(cols: usize, col_width: usize, sep_width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(vec![
        Span::styled("  eximshell", theme.popup_title),
        Span::styled(format!("  v{VERSION}"), theme.help_dim),
    ]));
    lines.push(Line::from(Span::styled(
        "  Live view of an Exim mail server: main log, queue and processes",
        theme.help_dim,
    )));
    lines.push(Line::from(""));

    for (title, shortcuts) in [
        ("Navigation", NAVIGATION),
        ("Queue", QUEUE),
        ("Message actions", ACTIONS),
        ("General", GENERAL),
    ] {
        add_section_header(&mut lines, title, theme, sep_width);
        add_shortcuts_columns(&mut lines, shortcuts, cols, col_width, theme);
        lines.push(Line::from(""));
    }

    lines
}

/// Add a section header with a trailing separator line.
fn add_section_header(lines: &mut Vec<Line<'static>>, title: &str, theme: &Theme, width: usize) {
    let remaining = width.saturating_sub(title.len() + 4);
    lines.push(Line::from(vec![
        Span::styled(format!("  {title} "), theme.popup_title),
        Span::styled("\u{2500}".repeat(remaining), theme.help_dim),
    ]));
}

/// Lay out shortcuts in N columns per row.
fn add_shortcuts_columns(
    lines: &mut Vec<Line<'static>>,
    shortcuts: &[Shortcut],
    cols: usize,
    col_width: usize,
    theme: &Theme,
) {
    let key_w: usize = 9;

    for row in shortcuts.chunks(cols) {
        let mut spans: Vec<Span<'static>> = vec![Span::raw("  ")];
        for s in row {
            let desc_avail = col_width.saturating_sub(key_w + 3);
            let desc: String = s.desc.chars().take(desc_avail).collect();
            let padding = col_width.saturating_sub(key_w + 1 + desc.len()).max(1);

            spans.push(Span::styled(format!("{:>key_w$}", s.key), theme.key_hint));
            spans.push(Span::styled(format!(" {desc}"), theme.popup));
            spans.push(Span::raw(" ".repeat(padding)));
        }
        lines.push(Line::from(spans));
    }
}
