use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.run_import`(...) over the configured files
    RunImport,
    /// Run `queue.fix_row`(...) for the row being edited
    SubmitCorrection,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Backspace, Char, Down, Enter, Esc, Left, Right, Tab, Up};

    // Global quit shortcut
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Summary => match key.code {
            Char('q') => action = Action::Quit,
            Char('r') => action = Action::RunImport,
            Up | Char('k') => {
                app.duplicate_list_index = app.duplicate_list_index.saturating_sub(1);
            }
            Down | Char('j') => {
                let shown = app
                    .summary
                    .as_ref()
                    .map_or(0, |summary| summary.duplicates.len());
                if app.duplicate_list_index + 1 < shown {
                    app.duplicate_list_index += 1;
                }
            }
            Right | Tab => {
                app.refresh_rows();
                app.screen = Screen::InvalidRows;
            }
            _ => {}
        },

        Screen::InvalidRows => match key.code {
            Char('q') => action = Action::Quit,
            Up | Char('k') => {
                app.row_list_index = app.row_list_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.row_list_index + 1 < app.queued_rows.len() {
                    app.row_list_index += 1;
                }
            }
            Enter | Right => app.open_current_row(),
            Left | Esc | BackTab => app.screen = Screen::Summary,
            _ => {}
        },

        Screen::EditRow => match key.code {
            Tab | Down => app.form.focus_next(),
            BackTab | Up => app.form.focus_previous(),
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.form.focused_value_mut().push(character);
                }
            }
            Backspace => {
                app.form.focused_value_mut().pop();
            }
            Enter => action = Action::SubmitCorrection,
            Esc => {
                app.editing = None;
                app.screen = Screen::InvalidRows;
            }
            _ => {}
        },
    }
    action
}
