//! Terminal widgets for the shell: the session list and the field form. The widget
//! state machines live in [list] and [form]; this module owns raw mode and the key
//! loop around them.

pub mod form;
pub mod list;

use std::io::{stdout, Write};

use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyEventKind},
    execute, queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};

use form::{FormOutcome, FormState};
use list::{ListOutcome, ListState, SelectMode};

/// Width of the label column in the form, the field text starts right after it.
const FORM_TEXT_OFFSET: u16 = 10;

/// Puts the terminal into raw mode for the lifetime of a widget and restores it on the
/// way out, panics included.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

fn viewport_height(rows: u16) -> usize {
    rows.saturating_sub(2).max(1) as usize
}

/// Runs the list widget until the user accepts or quits. Returns the picked indices,
/// `None` when the user quit.
pub fn run_list(items: Vec<String>, mode: SelectMode) -> Result<Option<Vec<usize>>> {
    let (_, rows) = terminal::size()?;
    let mut state = ListState::new(items, mode, viewport_height(rows));

    let _guard = TerminalGuard::enter()?;
    execute!(stdout(), Hide)?;
    loop {
        draw_list(&state)?;
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                match state.handle_key(key.code) {
                    ListOutcome::Continue => {}
                    outcome => return Ok(state.into_selection(outcome)),
                }
            }
            Event::Resize(_, rows) => state.set_height(viewport_height(rows)),
            _ => {}
        }
    }
}

fn draw_list(state: &ListState) -> Result<()> {
    let mut out = stdout();
    let (_, rows) = terminal::size()?;
    queue!(out, Clear(ClearType::All))?;

    let mut y = 0;
    for (_, text, highlighted) in state.visible_rows() {
        queue!(out, MoveTo(0, y))?;
        if highlighted {
            queue!(
                out,
                SetAttribute(Attribute::Reverse),
                Print(&text),
                SetAttribute(Attribute::Reset)
            )?;
        } else {
            queue!(out, Print(&text))?;
        }
        y += 1;
    }

    queue!(
        out,
        MoveTo(1, rows.saturating_sub(1)),
        Print(state.instructions())
    )?;
    out.flush()?;
    Ok(())
}

/// Runs the form widget until the user accepts or cancels. Returns the edited fields,
/// `None` when the user canceled.
pub fn run_form(header: &str, initial: [String; 5]) -> Result<Option<[String; 5]>> {
    let mut state = FormState::new(initial);

    let _guard = TerminalGuard::enter()?;
    execute!(stdout(), Show)?;
    loop {
        draw_form(header, &state)?;
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.handle_key(key.code) {
                FormOutcome::Continue => {}
                FormOutcome::Accept => return Ok(Some(state.into_fields())),
                FormOutcome::Cancel => return Ok(None),
            }
        }
    }
}

fn draw_form(header: &str, state: &FormState) -> Result<()> {
    let mut out = stdout();
    queue!(out, Clear(ClearType::All), MoveTo(1, 0), Print(header))?;

    let y_offset = 2;
    for i in 0..state.field_count() {
        queue!(out, MoveTo(0, y_offset + i as u16), Print(state.render_line(i)))?;
    }
    queue!(
        out,
        MoveTo(1, y_offset + state.field_count() as u16 + 2),
        Print(state.instructions()),
        MoveTo(
            FORM_TEXT_OFFSET + state.col() as u16,
            y_offset + state.line() as u16
        )
    )?;
    out.flush()?;
    Ok(())
}
