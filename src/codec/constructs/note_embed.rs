//! `![[<filename-chars>]]` and `![[<filename-chars>|<free-text>]]`
//!
//! Unlike note links, the id is a loose filename so uploaded files can be embedded next to
//! numeric note ids. A `|` must be followed by a non-empty label.

use crate::codec::{
    chars::{is_filename_char, is_free_text_char, Code, CLOSE_MARKER, SEPARATOR},
    tokenizer::{Construct, ConstructKind, Step, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Bang,
    OpenFirst,
    OpenSecond,
    IdStart,
    Id,
    Separator,
    TextStart,
    Text,
    CloseFirst,
    CloseSecond,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoteEmbed;

impl Construct for NoteEmbed {
    type State = State;

    const KIND: ConstructKind = ConstructKind::NoteEmbed;
    const TRIGGER: char = '!';

    fn start(&self) -> State {
        State::Bang
    }

    fn step(&self, state: State, code: Code) -> Step<State> {
        match (state, code) {
            (State::Bang, Some('!')) => Step::consume(State::OpenFirst),
            (State::OpenFirst, Some('[')) => Step::consume(State::OpenSecond),
            (State::OpenSecond, Some('[')) => Step::consume(State::IdStart),
            (State::IdStart, code) if is_filename_char(code) => Step::consume(State::Id),
            (State::Id, code) if is_filename_char(code) => Step::consume(State::Id),
            (State::Id, Some(SEPARATOR)) => Step::reconsume(State::Separator),
            (State::Id, Some(CLOSE_MARKER)) => Step::reconsume(State::CloseFirst),
            (State::Separator, Some(SEPARATOR)) => Step::consume(State::TextStart),
            (State::TextStart, code) if is_free_text_char(code) => Step::consume(State::Text),
            (State::Text, code) if is_free_text_char(code) => Step::consume(State::Text),
            (State::Text, Some(CLOSE_MARKER)) => Step::reconsume(State::CloseFirst),
            (State::CloseFirst, Some(CLOSE_MARKER)) => Step::consume(State::CloseSecond),
            (State::CloseSecond, Some(CLOSE_MARKER)) => Step::Accept { consumed: true },
            _ => Step::Reject,
        }
    }

    fn segment(&self, state: State) -> TokenKind {
        match state {
            State::IdStart | State::Id => TokenKind::Id,
            State::Separator => TokenKind::Separator,
            State::TextStart | State::Text => TokenKind::Text,
            _ => TokenKind::Marker,
        }
    }
}
