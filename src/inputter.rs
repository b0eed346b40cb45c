use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor used for filter input on the command line.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // In chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.current_input.clear();
                self.curser_pos = 0;
                self.get()
            }
            (kc, km) => self.key(kc, km),
        }
    }

    /// Replaces the input, placing the cursor at its end.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let idx = self.getbytepos();
            self.current_input.remove(idx);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            let idx = self.getbytepos();
            self.current_input.remove(idx);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        // AltGr arrives as Control+Alt on some terminals and still types a char.
        let ctrl = modifier.contains(KeyModifiers::CONTROL);
        let alt = modifier.contains(KeyModifiers::ALT);
        if ctrl != alt {
            trace!("Ignoring {code:?} with {modifier:?} in input");
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            let idx = self.getbytepos();
            self.current_input.insert(idx, chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(inputter: &mut Inputter, code: KeyCode) -> InputResult {
        inputter.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(inputter: &mut Inputter, text: &str) {
        for chr in text.chars() {
            press(inputter, KeyCode::Char(chr));
        }
    }

    #[test]
    fn typing_and_enter() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "acme");
        let result = press(&mut inputter, KeyCode::Enter);
        assert_eq!(result.input, "acme");
        assert!(result.finished);
        assert!(!result.canceled);
    }

    #[test]
    fn backspace_removes_char_before_cursor() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "abc");
        press(&mut inputter, KeyCode::Left);
        let result = press(&mut inputter, KeyCode::Backspace);
        assert_eq!(result.input, "ac");
        assert_eq!(result.curser_pos, 1);
    }

    #[test]
    fn insert_in_the_middle_of_multibyte_text() {
        let mut inputter = Inputter::default();
        inputter.set("小米");
        press(&mut inputter, KeyCode::Left);
        type_text(&mut inputter, "x");
        assert_eq!(inputter.get().input, "小x米");
        press(&mut inputter, KeyCode::Home);
        let result = press(&mut inputter, KeyCode::Delete);
        assert_eq!(result.input, "x米");
    }

    #[test]
    fn escape_cancels_and_clears() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "42");
        let result = press(&mut inputter, KeyCode::Esc);
        assert!(result.canceled);
        assert!(result.finished);
        assert_eq!(result.input, "");
    }

    #[test]
    fn control_keys_are_not_inserted() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "ab");
        inputter.read(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert_eq!(inputter.get().input, "ab");
        inputter.read(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        assert_eq!(inputter.get().input, "ab");
        inputter.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(inputter.get().input, "");
    }

    #[test]
    fn altgr_characters_are_inserted() {
        let mut inputter = Inputter::default();
        let altgr = KeyModifiers::CONTROL | KeyModifiers::ALT;
        for chr in ['@', '{', '€'] {
            inputter.read(KeyEvent::new(KeyCode::Char(chr), altgr));
        }
        let result = inputter.get();
        assert_eq!(result.input, "@{€");
        assert_eq!(result.curser_pos, 3);
    }
}
