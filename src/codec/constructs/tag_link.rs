//! `#<alpha><name-char>*`, only after whitespace or at a line start.

use crate::codec::{
    chars::{is_alpha, is_name_char, is_whitespace_or_line_start, Code},
    tokenizer::{Construct, ConstructKind, Step, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Hash,
    NameStart,
    Name,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TagLink;

impl Construct for TagLink {
    type State = State;

    const KIND: ConstructKind = ConstructKind::TagLink;
    const TRIGGER: char = '#';

    fn start(&self) -> State {
        State::Hash
    }

    fn step(&self, state: State, code: Code) -> Step<State> {
        match (state, code) {
            (State::Hash, Some('#')) => Step::consume(State::NameStart),
            (State::NameStart, code) if is_alpha(code) => Step::consume(State::Name),
            (State::Name, code) if is_name_char(code) => Step::consume(State::Name),
            (State::Name, _) => Step::Accept { consumed: false },
            _ => Step::Reject,
        }
    }

    fn segment(&self, state: State) -> TokenKind {
        match state {
            State::Hash => TokenKind::Marker,
            State::NameStart | State::Name => TokenKind::Name,
        }
    }

    fn accepts_previous(&self, previous: Code) -> bool {
        is_whitespace_or_line_start(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tokenizer::attempt;

    fn name_of(text: &str, previous: Code) -> Option<String> {
        attempt(&TagLink, text, 0, previous).and_then(|token| {
            token
                .child(TokenKind::Name)
                .map(|name| name.slice(text).to_string())
        })
    }

    #[test]
    fn test_valid_tag_links() {
        assert_eq!(name_of("#hello", None), Some("hello".to_string()));
        assert_eq!(name_of("#hello-world", None), Some("hello-world".to_string()));
        assert_eq!(name_of("#a_1-b2 rest", Some(' ')), Some("a_1-b2".to_string()));
        assert_eq!(name_of("#hello#world", Some('\n')), Some("hello".to_string()));
        assert_eq!(name_of("#x.", None), Some("x".to_string()));
    }

    #[test]
    fn test_invalid_tag_links() {
        assert_eq!(name_of("#0123456789", None), None);
        assert_eq!(name_of("#", None), None);
        assert_eq!(name_of("# heading", None), None);
        assert_eq!(name_of("#-dash", None), None);
        assert_eq!(name_of("#_under", None), None);
    }

    #[test]
    fn test_requires_boundary_before_hash() {
        assert_eq!(name_of("#world", Some('o')), None);
        assert_eq!(name_of("#anchor", Some('/')), None);
        assert_eq!(name_of("#tag", Some('\t')), Some("tag".to_string()));
    }

    #[test]
    fn test_token_range_stops_before_terminator() {
        let token = attempt(&TagLink, "#tag, more", 0, None).unwrap();
        assert_eq!(token.range, 0..4);
    }
}
