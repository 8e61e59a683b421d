use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::game::{Control, Direction, GridSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Steer(Direction),
    Control(Control),
    Quit,
    None,
}

pub struct InputHandler;

impl InputHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_key_event(&self, key: KeyEvent) -> KeyAction {
        // Handle Ctrl+C
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyAction::Quit;
        }

        match key.code {
            // Movement - Arrow keys
            KeyCode::Up => KeyAction::Steer(Direction::Up),
            KeyCode::Down => KeyAction::Steer(Direction::Down),
            KeyCode::Left => KeyAction::Steer(Direction::Left),
            KeyCode::Right => KeyAction::Steer(Direction::Right),

            // Movement - WASD
            KeyCode::Char('w') | KeyCode::Char('W') => KeyAction::Steer(Direction::Up),
            KeyCode::Char('s') | KeyCode::Char('S') => KeyAction::Steer(Direction::Down),
            KeyCode::Char('a') | KeyCode::Char('A') => KeyAction::Steer(Direction::Left),
            KeyCode::Char('d') | KeyCode::Char('D') => KeyAction::Steer(Direction::Right),

            // Controls
            KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Char('P') => {
                KeyAction::Control(Control::TogglePause)
            }
            KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::Control(Control::Restart),
            KeyCode::Char('o') | KeyCode::Char('O') => KeyAction::Control(Control::OpenSettings),
            KeyCode::Char('i') | KeyCode::Char('I') => KeyAction::Control(Control::OpenInfo),
            KeyCode::Esc => KeyAction::Control(Control::CloseOverlay),

            // Grid size, honoured only while settings are open
            KeyCode::Char('1') => KeyAction::Control(Control::SelectGrid(GridSize::Small)),
            KeyCode::Char('2') => KeyAction::Control(Control::SelectGrid(GridSize::Medium)),
            KeyCode::Char('3') => KeyAction::Control(Control::SelectGrid(GridSize::Large)),

            KeyCode::Char('q') | KeyCode::Char('Q') => KeyAction::Quit,

            _ => KeyAction::None,
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}
