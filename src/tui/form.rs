use crossterm::event::KeyCode;

pub const FIELD_LABELS: [&str; 5] = ["start", "end", "project", "tags", "notes"];

/// Columns holding `-`, ` ` or `:` inside a canonical timestamp.
const DATE_SEPARATORS: [usize; 5] = [4, 7, 10, 13, 16];
const DATE_LEN: usize = 19;
/// The first two fields are fixed-format timestamps.
const DATE_FIELDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Continue,
    Accept,
    Cancel,
}

/// The form widget state machine: five labeled fields, the date fields edited through a
/// fixed mask, the rest as free text. Pure data, the terminal loop in [super] drives it.
pub struct FormState {
    fields: [Vec<char>; 5],
    line: usize,
    col: usize,
}

impl FormState {
    pub fn new(initial: [String; 5]) -> Self {
        Self {
            fields: initial.map(|v| v.chars().collect()),
            line: 0,
            col: 0,
        }
    }

    pub fn instructions(&self) -> &'static str {
        "Navigation [Up/Down/Left/Right/Tab], Accept [Enter], Cancel [Esc]"
    }

    pub fn handle_key(&mut self, key: KeyCode) -> FormOutcome {
        match key {
            KeyCode::Up => {
                if self.line > 0 {
                    self.line -= 1;
                    self.col = 0;
                }
            }
            KeyCode::Down | KeyCode::Tab => {
                self.line = (self.line + 1) % self.fields.len();
                self.col = 0;
            }
            KeyCode::Right => {
                if self.on_date_field() {
                    self.date_move_right();
                } else if self.col < self.fields[self.line].len() {
                    self.col += 1;
                }
            }
            KeyCode::Left => {
                if self.on_date_field() {
                    self.date_move_left();
                } else if self.col > 0 {
                    self.col -= 1;
                }
            }
            KeyCode::Backspace => {
                if self.on_date_field() {
                    self.date_move_left();
                } else if self.col > 0 {
                    self.fields[self.line].remove(self.col - 1);
                    self.col -= 1;
                }
            }
            KeyCode::Char(c) => {
                if self.on_date_field() {
                    if c.is_ascii_digit() {
                        self.fields[self.line][self.col] = c;
                        self.date_move_right();
                    }
                } else if !c.is_control() {
                    // Overwrite at the cursor, append at the end.
                    if self.col < self.fields[self.line].len() {
                        self.fields[self.line][self.col] = c;
                    } else {
                        self.fields[self.line].push(c);
                    }
                    self.col += 1;
                }
            }
            KeyCode::Enter => return FormOutcome::Accept,
            KeyCode::Esc => return FormOutcome::Cancel,
            _ => {}
        }
        FormOutcome::Continue
    }

    fn on_date_field(&self) -> bool {
        self.line < DATE_FIELDS
    }

    fn date_move_right(&mut self) {
        if DATE_SEPARATORS.contains(&(self.col + 1)) {
            self.col += 2;
        } else if self.col + 1 >= DATE_LEN {
            self.col = 0;
        } else {
            self.col += 1;
        }
    }

    fn date_move_left(&mut self) {
        if self.col == 0 {
            self.col = DATE_LEN - 1;
        } else if DATE_SEPARATORS.contains(&(self.col - 1)) {
            self.col -= 2;
        } else {
            self.col -= 1;
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn col(&self) -> usize {
        self.col
    }

    /// One rendered field line, label column first.
    pub fn render_line(&self, index: usize) -> String {
        format!(
            "{:<8}| {}",
            FIELD_LABELS[index],
            self.fields[index].iter().collect::<String>()
        )
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn into_fields(self) -> [String; 5] {
        self.fields.map(|v| v.into_iter().collect())
    }
}
