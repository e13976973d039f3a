//! Keyboard and input event handling.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Focus, Popup, Query};
use crate::exim::actions::Action;

/// Process a key event and update the application state.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> anyhow::Result<()> {
    // Ctrl+C always quits, even from a popup
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return Ok(());
    }

    // ── Popup handling (captures all keys) ────────────────
    if let Some(popup) = app.popup.take() {
        app.popup = handle_popup_key(app, popup, key);
        return Ok(());
    }

    // ── Always-available shortcuts ────────────────────────
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return Ok(());
        }
        KeyCode::Char('?') => {
            app.popup = Some(Popup::Help);
            return Ok(());
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = match app.focus {
                Focus::Log => Focus::Queue,
                Focus::Queue => Focus::Log,
            };
            return Ok(());
        }
        KeyCode::Char('p') => {
            app.toggle_processes();
            return Ok(());
        }
        KeyCode::Char('P') => {
            app.toggle_plotter();
            return Ok(());
        }
        KeyCode::Char('T') => {
            app.toggle_track_log();
            return Ok(());
        }
        KeyCode::Char('B') => {
            app.toggle_statusbar();
            return Ok(());
        }
        KeyCode::Char('W') => {
            app.save_settings();
            return Ok(());
        }
        KeyCode::Char('R') => {
            app.run_queue();
            return Ok(());
        }
        KeyCode::Char('C') => {
            app.run_query(Query::Configuration);
            return Ok(());
        }
        _ => {}
    }

    match app.focus {
        Focus::Log => handle_log_keys(app, key),
        Focus::Queue => handle_queue_keys(app, key),
    }
    Ok(())
}

fn handle_log_keys(app: &mut App, key: KeyEvent) {
    let page = app.log_viewport_height.max(1);
    match key.code {
        KeyCode::Char('k') | KeyCode::Up => app.scroll_log_up(1),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_log_down(1),
        KeyCode::PageUp => app.scroll_log_up(page),
        KeyCode::PageDown => app.scroll_log_down(page),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_log_up(usize::MAX / 2),
        KeyCode::Char('G') | KeyCode::End => app.scroll_log_down(usize::MAX),
        _ => {}
    }
}

fn handle_queue_keys(app: &mut App, key: KeyEvent) {
    let last = app.queue_ids.len().saturating_sub(1);
    match key.code {
        // ── Navigation ───────────────────────────────────────
        KeyCode::Char('j') | KeyCode::Down => app.select(app.selected + 1),
        KeyCode::Char('k') | KeyCode::Up => app.select(app.selected.saturating_sub(1)),
        KeyCode::Char('g') | KeyCode::Home => app.select(0),
        KeyCode::Char('G') | KeyCode::End => app.select(last),
        KeyCode::PageDown => {
            let page = app.queue_viewport_height.max(1);
            app.select((app.selected + page).min(last));
        }
        KeyCode::PageUp => {
            let page = app.queue_viewport_height.max(1);
            app.select(app.selected.saturating_sub(page));
        }

        // ── Marks ────────────────────────────────────────────
        KeyCode::Char(' ') => {
            app.toggle_mark();
            app.select(app.selected + 1);
        }
        KeyCode::Char('*') => app.toggle_mark_all(),

        // ── Sorting ──────────────────────────────────────────
        KeyCode::Char('s') => {
            app.sort_by(app.sort_column.next());
            let dir = if app.sort_ascending { "asc" } else { "desc" };
            app.set_status(&format!("Sorted by {} ({dir})", app.sort_column.name()));
        }
        KeyCode::Char('S') => {
            app.sort_ascending = !app.sort_ascending;
            app.apply_sort();
        }

        // ── Details ──────────────────────────────────────────
        KeyCode::Enter | KeyCode::Char('b') => app.run_query(Query::Body),
        KeyCode::Char('h') => app.run_query(Query::Headers),
        KeyCode::Char('l') => app.run_query(Query::MessageLog),

        // ── Actions ──────────────────────────────────────────
        KeyCode::Char('x') | KeyCode::Delete => app.request_action(Action::Remove),
        KeyCode::Char('f') => app.request_action(Action::Freeze),
        KeyCode::Char('t') => app.request_action(Action::Thaw),
        KeyCode::Char('d') => app.request_action(Action::Deliver),
        KeyCode::Char('u') => app.request_action(Action::GiveUp),
        KeyCode::Char('a') => app.request_action(Action::AddRecipients),
        KeyCode::Char('e') => app.request_action(Action::EditSender),
        KeyCode::Char('m') => app.request_action(Action::MarkAllDelivered),
        _ => {}
    }
}

/// Handle a key while `popup` is open; returns the popup to show next.
fn handle_popup_key(app: &mut App, popup: Popup, key: KeyEvent) -> Option<Popup> {
    match popup {
        Popup::Help | Popup::Processes => match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Char('p') => None,
            _ => Some(popup),
        },
        Popup::Confirm { action, ids } => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.run_action(action, ids, String::new());
                None
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => None,
            _ => Some(Popup::Confirm { action, ids }),
        },
        Popup::Input {
            action,
            id,
            mut buffer,
        } => match key.code {
            KeyCode::Enter => {
                app.run_action(action, vec![id], buffer);
                None
            }
            KeyCode::Esc => None,
            KeyCode::Backspace => {
                buffer.pop();
                Some(Popup::Input { action, id, buffer })
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                Some(Popup::Input { action, id, buffer })
            }
            _ => Some(Popup::Input { action, id, buffer }),
        },
        Popup::Text {
            title,
            body,
            scroll,
        } => {
            let scroll = match key.code {
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => return None,
                KeyCode::Char('j') | KeyCode::Down => scroll.saturating_add(1),
                KeyCode::Char('k') | KeyCode::Up => scroll.saturating_sub(1),
                KeyCode::PageDown => scroll.saturating_add(10),
                KeyCode::PageUp => scroll.saturating_sub(10),
                KeyCode::Char('g') | KeyCode::Home => 0,
                _ => scroll,
            };
            Some(Popup::Text {
                title,
                body,
                scroll,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn press(app: &mut App, code: KeyCode) {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE)).unwrap();
    }

    fn test_app() -> (App, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.log_dir = tmp.path().to_path_buf();
        config.paths.bin_dir = tmp.path().join("bin");
        config.display.show_process_list = false;
        (App::new(config).unwrap(), tmp)
    }

    #[test]
    fn test_quit_and_help() {
        let (mut app, _tmp) = test_app();
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.popup, Some(Popup::Help));
        // q closes the popup first
        press(&mut app, KeyCode::Char('q'));
        assert!(app.popup.is_none());
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_input_popup_editing() {
        let (mut app, _tmp) = test_app();
        app.apply_queue_snapshot(crate::exim::queue::parse_output(
            "25m  2.9K 1AttSk-0002qB-00 <alice@example.org>\n          bob@example.net\n",
        ));
        press(&mut app, KeyCode::Char('e'));
        for c in "ab".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);
        assert_eq!(
            app.popup,
            Some(Popup::Input {
                action: Action::EditSender,
                id: "1AttSk-0002qB-00".to_string(),
                buffer: "a".to_string(),
            })
        );
        press(&mut app, KeyCode::Esc);
        assert!(app.popup.is_none());
    }

    #[test]
    fn test_declined_confirmation_runs_nothing() {
        let (mut app, _tmp) = test_app();
        app.apply_queue_snapshot(crate::exim::queue::parse_output(
            "25m  2.9K 1AttSk-0002qB-00 <alice@example.org>\n          bob@example.net\n",
        ));
        press(&mut app, KeyCode::Char('x'));
        assert!(matches!(app.popup, Some(Popup::Confirm { .. })));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.popup.is_none());
        assert_eq!(app.actions_running, 0);
    }

    #[test]
    fn test_text_popup_scrolls() {
        let (mut app, _tmp) = test_app();
        app.show_text("Body".to_string(), "a\nb\nc".to_string());
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Up);
        assert!(matches!(app.popup, Some(Popup::Text { scroll: 1, .. })));
    }
}
