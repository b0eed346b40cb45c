use std::time::Duration;
use tracing::trace;

use crate::domain::{DMError, Message, TVConfig};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DMError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(Controller::handle_key(key))
                }
            }
            _ => Ok(None),
        }
    }

    pub fn handle_key(key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown | KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp | KeyCode::Char('p'), _) => Some(Message::PrevPage),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::FirstPage),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::LastPage),
            (KeyCode::Char('f') | KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char('x'), _) => Some(Message::ClearFilter),
            (KeyCode::Char('X'), _) => Some(Message::ClearAllFilters),
            (KeyCode::Char('s'), _) => Some(Message::SortAscending),
            (KeyCode::Char('S'), _) => Some(Message::SortDescending),
            (KeyCode::Char('r'), _) => Some(Message::ResetSort),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('C'), _) => Some(Message::CopyRow),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
