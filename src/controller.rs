use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, ViewerConfig};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, std::io::Error> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        Some(Message::RawKey(key))
                    } else {
                        self.handle_key(key)
                    }
                }
                Event::Resize(width, height) => {
                    Some(Message::Resize(width as usize, height as usize))
                }
                _ => None,
            });
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('o'), _) => Some(Message::OpenFile),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('i'), _) => Some(Message::ToggleIndex),
            (KeyCode::Char('y'), _) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode, modifiers: KeyModifiers) -> Option<Message> {
        let controller = Controller::new(&ViewerConfig::default());
        controller.handle_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn table_keys() {
        assert_eq!(map(KeyCode::Char('q'), KeyModifiers::NONE), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('o'), KeyModifiers::NONE), Some(Message::OpenFile));
        assert_eq!(map(KeyCode::Char('/'), KeyModifiers::NONE), Some(Message::Search));
        assert_eq!(map(KeyCode::Char('j'), KeyModifiers::NONE), Some(Message::MoveDown));
        assert_eq!(map(KeyCode::Up, KeyModifiers::NONE), Some(Message::MoveUp));
        assert_eq!(map(KeyCode::Char('G'), KeyModifiers::SHIFT), Some(Message::MoveEnd));
        assert_eq!(map(KeyCode::Char('s'), KeyModifiers::NONE), Some(Message::Sort));
        assert_eq!(map(KeyCode::Char('Y'), KeyModifiers::SHIFT), Some(Message::CopyRow));
        assert_eq!(map(KeyCode::Esc, KeyModifiers::NONE), Some(Message::Exit));
    }

    #[test]
    fn unbound_keys_map_to_nothing() {
        assert_eq!(map(KeyCode::Char('x'), KeyModifiers::NONE), None);
        assert_eq!(map(KeyCode::F(5), KeyModifiers::NONE), None);
    }
}
