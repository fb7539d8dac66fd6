use crossterm::event::{KeyCode, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    ClearAll,
    EnableSounds,
    Quit,
}

pub fn parse_main_command(key_code: &KeyCode, modifiers: KeyModifiers) -> Option<UiCommand> {
    match key_code {
        KeyCode::Esc => Some(UiCommand::Quit),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(UiCommand::Quit),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'q' => Some(UiCommand::Quit),
            'c' => Some(UiCommand::ClearAll),
            's' => Some(UiCommand::EnableSounds),
            _ => None,
        },
        _ => None,
    }
}
