//! `[[<digits>]]`

use crate::codec::{
    chars::{is_digit, Code, CLOSE_MARKER},
    tokenizer::{Construct, ConstructKind, Step, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    OpenFirst,
    OpenSecond,
    IdStart,
    Id,
    CloseFirst,
    CloseSecond,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoteLink;

impl Construct for NoteLink {
    type State = State;

    const KIND: ConstructKind = ConstructKind::NoteLink;
    const TRIGGER: char = '[';

    fn start(&self) -> State {
        State::OpenFirst
    }

    fn step(&self, state: State, code: Code) -> Step<State> {
        match (state, code) {
            (State::OpenFirst, Some('[')) => Step::consume(State::OpenSecond),
            (State::OpenSecond, Some('[')) => Step::consume(State::IdStart),
            (State::IdStart, code) if is_digit(code) => Step::consume(State::Id),
            (State::Id, code) if is_digit(code) => Step::consume(State::Id),
            (State::Id, Some(CLOSE_MARKER)) => Step::reconsume(State::CloseFirst),
            (State::CloseFirst, Some(CLOSE_MARKER)) => Step::consume(State::CloseSecond),
            (State::CloseSecond, Some(CLOSE_MARKER)) => Step::Accept { consumed: true },
            _ => Step::Reject,
        }
    }

    fn segment(&self, state: State) -> TokenKind {
        match state {
            State::IdStart | State::Id => TokenKind::Id,
            _ => TokenKind::Marker,
        }
    }
}
