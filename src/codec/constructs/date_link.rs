//! `[[YYYY-MM-DD]]`
//!
//! Digit groups are fixed width and checked by position only. `[[2021-13-32]]` is a date link;
//! no calendar validation happens here or downstream.

use crate::codec::{
    chars::{is_digit, Code, CLOSE_MARKER},
    tokenizer::{Construct, ConstructKind, Step, TokenKind},
};

const YEAR_DIGITS: u8 = 4;
const MONTH_DIGITS: u8 = 2;
const DAY_DIGITS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    OpenFirst,
    OpenSecond,
    /// Digits of the year consumed so far.
    Year(u8),
    YearDash,
    Month(u8),
    MonthDash,
    Day(u8),
    CloseFirst,
    CloseSecond,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DateLink;

impl Construct for DateLink {
    type State = State;

    const KIND: ConstructKind = ConstructKind::DateLink;
    const TRIGGER: char = '[';

    fn start(&self) -> State {
        State::OpenFirst
    }

    fn step(&self, state: State, code: Code) -> Step<State> {
        match (state, code) {
            (State::OpenFirst, Some('[')) => Step::consume(State::OpenSecond),
            (State::OpenSecond, Some('[')) => Step::consume(State::Year(0)),
            (State::Year(n), code) if is_digit(code) => match n + 1 {
                YEAR_DIGITS => Step::consume(State::YearDash),
                next => Step::consume(State::Year(next)),
            },
            (State::YearDash, Some('-')) => Step::consume(State::Month(0)),
            (State::Month(n), code) if is_digit(code) => match n + 1 {
                MONTH_DIGITS => Step::consume(State::MonthDash),
                next => Step::consume(State::Month(next)),
            },
            (State::MonthDash, Some('-')) => Step::consume(State::Day(0)),
            (State::Day(n), code) if is_digit(code) => match n + 1 {
                DAY_DIGITS => Step::consume(State::CloseFirst),
                next => Step::consume(State::Day(next)),
            },
            (State::CloseFirst, Some(CLOSE_MARKER)) => Step::consume(State::CloseSecond),
            (State::CloseSecond, Some(CLOSE_MARKER)) => Step::Accept { consumed: true },
            _ => Step::Reject,
        }
    }

    fn segment(&self, state: State) -> TokenKind {
        match state {
            State::OpenFirst | State::OpenSecond | State::CloseFirst | State::CloseSecond => {
                TokenKind::Marker
            }
            _ => TokenKind::Date,
        }
    }
}
