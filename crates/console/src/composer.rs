//! Input state machine for the interactive console.
//!
//! A pure function over input events: no IO, no timing. The console loop
//! feeds it key events and acts on the returned [`ComposerAction`].
//!
//! States: `Free` (plain text entry), `PaletteOpen` (the trigger character
//! was typed on an empty buffer), `CommandArmed` (a palette entry was
//! chosen; the buffer is now that command's argument).

use webpilot_commands::registry::{self, CommandDefinition};

pub const PALETTE_TRIGGER: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Free,
    PaletteOpen,
    CommandArmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    Backspace,
    /// Enter.
    Submit,
    /// Shift+Enter: a literal line break, never a submission.
    Newline,
    Escape,
    Up,
    Down,
    /// Explicit clear (Ctrl+U).
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerAction {
    None,
    /// A validated submission ready for the dispatcher.
    Submitted { command_id: String, text: String },
}

pub struct Composer {
    mode: InputMode,
    buffer: String,
    armed: Option<&'static CommandDefinition>,
    palette_index: usize,
}

impl Composer {
    pub fn new() -> Self {
        Self {
            mode: InputMode::Free,
            buffer: String::new(),
            armed: None,
            palette_index: 0,
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn armed(&self) -> Option<&'static CommandDefinition> {
        self.armed
    }

    pub fn palette_index(&self) -> usize {
        self.palette_index
    }

    /// Text typed after the trigger character, used to filter the palette.
    pub fn palette_filter(&self) -> &str {
        self.buffer
            .strip_prefix(PALETTE_TRIGGER)
            .unwrap_or(&self.buffer)
    }

    pub fn palette_entries(&self) -> Vec<&'static CommandDefinition> {
        registry::matching(self.palette_filter())
    }

    /// What a submission right now would run: the armed command, or the
    /// default free-text command.
    pub fn active_command(&self) -> &'static CommandDefinition {
        self.armed.unwrap_or_else(registry::default_command)
    }

    pub fn handle(&mut self, event: InputEvent) -> ComposerAction {
        match event {
            InputEvent::Char(c) => {
                self.insert_char(c);
                ComposerAction::None
            }
            InputEvent::Backspace => {
                self.backspace();
                ComposerAction::None
            }
            InputEvent::Newline => {
                if self.mode != InputMode::PaletteOpen {
                    self.buffer.push('\n');
                }
                ComposerAction::None
            }
            InputEvent::Escape => {
                self.escape();
                ComposerAction::None
            }
            InputEvent::Up => {
                self.move_selection(-1);
                ComposerAction::None
            }
            InputEvent::Down => {
                self.move_selection(1);
                ComposerAction::None
            }
            InputEvent::Clear => {
                self.clear();
                ComposerAction::None
            }
            InputEvent::Submit => self.submit(),
        }
    }

    fn insert_char(&mut self, c: char) {
        if self.mode == InputMode::Free && c == PALETTE_TRIGGER && self.buffer.is_empty() {
            self.mode = InputMode::PaletteOpen;
            self.palette_index = 0;
        }
        self.buffer.push(c);
        if self.mode == InputMode::PaletteOpen {
            self.palette_index = 0;
        }
    }

    fn backspace(&mut self) {
        self.buffer.pop();
        if self.mode == InputMode::PaletteOpen {
            if self.buffer.is_empty() {
                // The trigger character was the sole content.
                self.mode = InputMode::Free;
            } else {
                self.palette_index = 0;
            }
        }
    }

    fn escape(&mut self) {
        match self.mode {
            // Palette closes without selection; buffer is untouched.
            InputMode::PaletteOpen => self.mode = InputMode::Free,
            InputMode::CommandArmed => {
                self.armed = None;
                self.mode = InputMode::Free;
            }
            InputMode::Free => {}
        }
    }

    fn clear(&mut self) {
        match self.mode {
            InputMode::CommandArmed => {
                // Discard the armed command without submitting.
                self.armed = None;
                self.mode = InputMode::Free;
            }
            InputMode::PaletteOpen => {
                self.buffer.clear();
                self.mode = InputMode::Free;
            }
            InputMode::Free => self.buffer.clear(),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.mode != InputMode::PaletteOpen {
            return;
        }
        let len = self.palette_entries().len();
        if len == 0 {
            return;
        }
        let current = self.palette_index.min(len - 1) as isize;
        self.palette_index = (current + delta).rem_euclid(len as isize) as usize;
    }

    fn submit(&mut self) -> ComposerAction {
        match self.mode {
            InputMode::PaletteOpen => {
                let entries = self.palette_entries();
                if entries.is_empty() {
                    return ComposerAction::None;
                }
                let selected = entries[self.palette_index.min(entries.len() - 1)];
                self.armed = Some(selected);
                self.mode = InputMode::CommandArmed;
                self.buffer.clear();
                self.palette_index = 0;
                ComposerAction::None
            }
            InputMode::Free | InputMode::CommandArmed => {
                let command = self.active_command();
                let text = self.buffer.trim();
                // A failed validation is a local no-op, distinct from a
                // backend-reported failure.
                if text.is_empty() || !command.validate(text) {
                    return ComposerAction::None;
                }
                let action = ComposerAction::Submitted {
                    command_id: command.id.to_string(),
                    text: text.to_string(),
                };
                self.buffer.clear();
                self.armed = None;
                self.mode = InputMode::Free;
                action
            }
        }
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(composer: &mut Composer, text: &str) {
        for c in text.chars() {
            composer.handle(InputEvent::Char(c));
        }
    }

    #[test]
    fn test_trigger_opens_palette_only_on_empty_buffer() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        assert_eq!(composer.mode(), InputMode::PaletteOpen);

        let mut composer = Composer::new();
        type_str(&mut composer, "go to a/b");
        assert_eq!(composer.mode(), InputMode::Free);
        assert_eq!(composer.buffer(), "go to a/b");
    }

    #[test]
    fn test_escape_closes_palette_with_buffer_unchanged() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        assert_eq!(composer.mode(), InputMode::PaletteOpen);

        composer.handle(InputEvent::Escape);
        assert_eq!(composer.mode(), InputMode::Free);
        assert_eq!(composer.buffer(), "/");
    }

    #[test]
    fn test_deleting_sole_trigger_closes_palette() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        composer.handle(InputEvent::Backspace);
        assert_eq!(composer.mode(), InputMode::Free);
        assert_eq!(composer.buffer(), "");
    }

    #[test]
    fn test_palette_filters_and_selects() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        type_str(&mut composer, "nav");
        let entries = composer.palette_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "navigate");

        composer.handle(InputEvent::Submit);
        assert_eq!(composer.mode(), InputMode::CommandArmed);
        assert_eq!(composer.armed().unwrap().id, "navigate");
        assert_eq!(composer.buffer(), "");
    }

    #[test]
    fn test_selection_wraps() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        let len = composer.palette_entries().len();
        assert!(len >= 3);

        composer.handle(InputEvent::Down);
        assert_eq!(composer.palette_index(), 1);
        composer.handle(InputEvent::Up);
        composer.handle(InputEvent::Up);
        assert_eq!(composer.palette_index(), len - 1);
    }

    #[test]
    fn test_armed_submit_resets_to_free() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        type_str(&mut composer, "nav");
        composer.handle(InputEvent::Submit);
        type_str(&mut composer, "example.com");

        let action = composer.handle(InputEvent::Submit);
        assert_eq!(
            action,
            ComposerAction::Submitted {
                command_id: "navigate".to_string(),
                text: "example.com".to_string(),
            }
        );
        assert_eq!(composer.mode(), InputMode::Free);
        assert_eq!(composer.buffer(), "");
        assert!(composer.armed().is_none());
    }

    #[test]
    fn test_free_submit_uses_default_command() {
        let mut composer = Composer::new();
        type_str(&mut composer, "summarize this page");
        let action = composer.handle(InputEvent::Submit);
        assert_eq!(
            action,
            ComposerAction::Submitted {
                command_id: "prompt".to_string(),
                text: "summarize this page".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_submit_is_a_local_noop() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        type_str(&mut composer, "nav");
        composer.handle(InputEvent::Submit);
        type_str(&mut composer, "not a url");

        let action = composer.handle(InputEvent::Submit);
        assert_eq!(action, ComposerAction::None);
        // No dispatch, no state change.
        assert_eq!(composer.mode(), InputMode::CommandArmed);
        assert_eq!(composer.buffer(), "not a url");

        // Empty buffer never submits.
        let mut composer = Composer::new();
        assert_eq!(composer.handle(InputEvent::Submit), ComposerAction::None);
    }

    #[test]
    fn test_shift_enter_inserts_line_break() {
        let mut composer = Composer::new();
        type_str(&mut composer, "first");
        composer.handle(InputEvent::Newline);
        type_str(&mut composer, "second");
        assert_eq!(composer.buffer(), "first\nsecond");
        assert_eq!(composer.mode(), InputMode::Free);
    }

    #[test]
    fn test_clear_discards_armed_command() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        type_str(&mut composer, "prompt");
        composer.handle(InputEvent::Submit);
        assert_eq!(composer.mode(), InputMode::CommandArmed);

        composer.handle(InputEvent::Clear);
        assert_eq!(composer.mode(), InputMode::Free);
        assert!(composer.armed().is_none());
    }

    #[test]
    fn test_escape_disarms_command() {
        let mut composer = Composer::new();
        composer.handle(InputEvent::Char(PALETTE_TRIGGER));
        composer.handle(InputEvent::Submit);
        assert_eq!(composer.mode(), InputMode::CommandArmed);

        composer.handle(InputEvent::Escape);
        assert_eq!(composer.mode(), InputMode::Free);
        assert!(composer.armed().is_none());
    }
}
