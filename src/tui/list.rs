use crossterm::event::KeyCode;

/// How rows of the list can be picked.
///
/// `Off` only browses. `Single` picks the highlighted row with Enter. `SingleBox` and
/// `Multi` toggle select boxes with Space, either keeping one box or any number of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Off,
    Single,
    SingleBox,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    Continue,
    Accept,
    Quit,
}

/// The list widget state machine. Pure data, the terminal loop in [super] drives it.
pub struct ListState {
    items: Vec<String>,
    mode: SelectMode,
    cursor: usize,
    offset: usize,
    height: usize,
    selected: Vec<usize>,
}

impl ListState {
    pub fn new(items: Vec<String>, mode: SelectMode, height: usize) -> Self {
        Self {
            items,
            mode,
            cursor: 0,
            offset: 0,
            height: height.max(1),
            selected: Vec::new(),
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self.mode {
            SelectMode::Off => "Up [Up/k], Down [Down/j], Done [Enter/q]",
            SelectMode::Single => "Up [Up/k], Down [Down/j], Select [Enter], Quit [q]",
            SelectMode::SingleBox | SelectMode::Multi => {
                "Up [Up/k], Down [Down/j], Select [Space], Done [Enter], Quit [q]"
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) -> ListOutcome {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    if self.cursor < self.offset {
                        self.offset = self.cursor;
                    }
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                    if self.cursor >= self.offset + self.height {
                        self.offset = self.cursor + 1 - self.height;
                    }
                }
            }
            KeyCode::Char(' ') => self.toggle(),
            KeyCode::Enter => return ListOutcome::Accept,
            KeyCode::Char('q') | KeyCode::Esc => return ListOutcome::Quit,
            _ => {}
        }
        ListOutcome::Continue
    }

    fn toggle(&mut self) {
        match self.mode {
            SelectMode::Off | SelectMode::Single => {}
            SelectMode::SingleBox => {
                if self.selected == [self.cursor] {
                    self.selected.clear();
                } else {
                    self.selected = vec![self.cursor];
                }
            }
            SelectMode::Multi => {
                if let Some(position) = self.selected.iter().position(|v| *v == self.cursor) {
                    self.selected.remove(position);
                } else {
                    self.selected.push(self.cursor);
                }
            }
        }
    }

    /// Shrinks or grows the viewport, keeping the highlighted row visible.
    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        if self.cursor >= self.offset + self.height {
            self.offset = self.cursor + 1 - self.height;
        }
    }

    /// The rows currently inside the viewport: index, rendered text, highlight flag.
    pub fn visible_rows(&self) -> impl Iterator<Item = (usize, String, bool)> + '_ {
        self.items
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.height)
            .map(|(i, item)| (i, self.render_row(i, item), i == self.cursor))
    }

    fn render_row(&self, index: usize, item: &str) -> String {
        match self.mode {
            SelectMode::Off | SelectMode::Single => item.to_string(),
            SelectMode::SingleBox | SelectMode::Multi => {
                if self.selected.contains(&index) {
                    format!("[*] {item}")
                } else {
                    format!("[ ] {item}")
                }
            }
        }
    }

    /// Resolves the run into picked indices. Quitting discards everything.
    pub fn into_selection(mut self, outcome: ListOutcome) -> Option<Vec<usize>> {
        match outcome {
            ListOutcome::Quit | ListOutcome::Continue => None,
            ListOutcome::Accept => match self.mode {
                SelectMode::Off => Some(Vec::new()),
                SelectMode::Single => Some(vec![self.cursor]),
                SelectMode::SingleBox | SelectMode::Multi => {
                    self.selected.sort_unstable();
                    Some(self.selected)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Session {i}")).collect()
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut list = ListState::new(items(3), SelectMode::Off, 10);
        assert_eq!(list.handle_key(KeyCode::Up), ListOutcome::Continue);
        assert_eq!(list.cursor, 0);

        for _ in 0..5 {
            list.handle_key(KeyCode::Down);
        }
        assert_eq!(list.cursor, 2);

        list.handle_key(KeyCode::Char('k'));
        assert_eq!(list.cursor, 1);
    }

    #[test]
    fn viewport_scrolls_at_the_edges() {
        let mut list = ListState::new(items(10), SelectMode::Off, 3);
        for _ in 0..4 {
            list.handle_key(KeyCode::Char('j'));
        }
        assert_eq!(list.cursor, 4);
        assert_eq!(list.offset, 2);
        let visible = list.visible_rows().map(|(i, _, _)| i).collect::<Vec<_>>();
        assert_eq!(visible, vec![2, 3, 4]);

        for _ in 0..4 {
            list.handle_key(KeyCode::Up);
        }
        assert_eq!(list.cursor, 0);
        assert_eq!(list.offset, 0);
    }

    #[test]
    fn single_mode_picks_the_highlighted_row() {
        let mut list = ListState::new(items(3), SelectMode::Single, 10);
        list.handle_key(KeyCode::Down);
        let outcome = list.handle_key(KeyCode::Enter);
        assert_eq!(outcome, ListOutcome::Accept);
        assert_eq!(list.into_selection(outcome), Some(vec![1]));
    }

    #[test]
    fn multi_mode_toggles_boxes() {
        let mut list = ListState::new(items(4), SelectMode::Multi, 10);
        list.handle_key(KeyCode::Char(' '));
        list.handle_key(KeyCode::Down);
        list.handle_key(KeyCode::Down);
        list.handle_key(KeyCode::Char(' '));

        let rendered = list.visible_rows().map(|(_, s, _)| s).collect::<Vec<_>>();
        assert_eq!(rendered[0], "[*] Session 1");
        assert_eq!(rendered[1], "[ ] Session 2");
        assert_eq!(rendered[2], "[*] Session 3");

        // Toggling off removes the entry again.
        list.handle_key(KeyCode::Char(' '));
        let outcome = list.handle_key(KeyCode::Enter);
        assert_eq!(list.into_selection(outcome), Some(vec![0]));
    }

    #[test]
    fn single_box_mode_keeps_one_box() {
        let mut list = ListState::new(items(3), SelectMode::SingleBox, 10);
        list.handle_key(KeyCode::Char(' '));
        list.handle_key(KeyCode::Down);
        list.handle_key(KeyCode::Char(' '));

        let rendered = list.visible_rows().map(|(_, s, _)| s).collect::<Vec<_>>();
        assert_eq!(rendered[0], "[ ] Session 1");
        assert_eq!(rendered[1], "[*] Session 2");

        let outcome = list.handle_key(KeyCode::Enter);
        assert_eq!(list.into_selection(outcome), Some(vec![1]));
    }

    #[test]
    fn quit_discards_the_selection() {
        let mut list = ListState::new(items(3), SelectMode::Multi, 10);
        list.handle_key(KeyCode::Char(' '));
        let outcome = list.handle_key(KeyCode::Char('q'));
        assert_eq!(outcome, ListOutcome::Quit);
        assert_eq!(list.into_selection(outcome), None);
    }
}
