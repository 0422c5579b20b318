//! The streaming contract shared by every construct tokenizer.
//!
//! A construct is an explicit automaton: [`Construct::step`] receives the current state and the
//! next [`Code`] and answers with a [`Step`]. The automaton never looks at more than one code
//! at a time; lookahead-with-pushback is expressed by returning
//! `Step::Continue { consumed: false, .. }`, which hands the same code to the next state.
//!
//! [`attempt`] drives an automaton over a string. The attempt is transactional: it scans with
//! a private cursor and either returns a committed [`Token`] tree or `None`. Nothing outside
//! the attempt observes a partial match, so callers can treat the trigger character as
//! literal text and resume scanning at the next character.

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Range};

use super::chars::Code;

/// The four inline constructs recognized on top of CommonMark.
#[derive(Debug, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumSetType)]
pub enum ConstructKind {
    NoteLink,
    NoteEmbed,
    TagLink,
    DateLink,
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructKind::NoteLink => write!(f, "noteLink"),
            ConstructKind::NoteEmbed => write!(f, "noteEmbed"),
            ConstructKind::TagLink => write!(f, "tagLink"),
            ConstructKind::DateLink => write!(f, "dateLink"),
        }
    }
}

/// A set of enabled constructs.
pub type ConstructSet = EnumSet<ConstructKind>;

/// Kinds of the tokens a construct emits. The root token of a tree carries a
/// [`TokenKind::Construct`]; its children carry the remaining kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Construct(ConstructKind),
    /// Brackets, `!` and `#`.
    Marker,
    /// A note-link or note-embed id.
    Id,
    /// The `|` between a note-embed id and its label.
    Separator,
    /// A note-embed label.
    Text,
    /// A tag-link name.
    Name,
    /// A date-link date.
    Date,
}

/// A committed token. `range` is a byte range into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range<usize>,
    pub children: Vec<Token>,
}

impl Token {
    /// The first child of the given kind.
    pub fn child(&self, kind: TokenKind) -> Option<&Token> {
        self.children.iter().find(|token| token.kind == kind)
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.range.clone()]
    }

    pub fn construct(&self) -> Option<ConstructKind> {
        match self.kind {
            TokenKind::Construct(kind) => Some(kind),
            _ => None,
        }
    }
}

/// The outcome of feeding one code to an automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// Move to `next`. When `consumed` is false the same code is fed to `next` again.
    Continue { next: S, consumed: bool },
    /// The construct is complete. When `consumed` is false the current code is not part of it.
    Accept { consumed: bool },
    /// The consumed prefix cannot match.
    Reject,
}

impl<S> Step<S> {
    pub fn consume(next: S) -> Self {
        Step::Continue {
            next,
            consumed: true,
        }
    }

    pub fn reconsume(next: S) -> Self {
        Step::Continue {
            next,
            consumed: false,
        }
    }
}

/// A hand-written automaton for one inline construct.
pub trait Construct {
    type State: Copy + fmt::Debug;

    const KIND: ConstructKind;

    /// The character that can start this construct.
    const TRIGGER: char;

    fn start(&self) -> Self::State;

    fn step(&self, state: Self::State, code: Code) -> Step<Self::State>;

    /// The child token kind a code consumed in `state` belongs to.
    fn segment(&self, state: Self::State) -> TokenKind;

    /// Whether the construct may start after `previous`. Most constructs don't care.
    fn accepts_previous(&self, _previous: Code) -> bool {
        true
    }
}

/// Read position over the scanned text. Owned by a single attempt.
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    text: &'a str,
    position: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Code {
        self.text[self.position..].chars().next()
    }

    fn advance(&mut self) -> Range<usize> {
        let start = self.position;
        if let Some(c) = self.peek() {
            self.position += c.len_utf8();
        }
        start..self.position
    }
}

/// Accumulates child tokens while an attempt is in progress.
#[derive(Debug)]
struct TokenBuilder {
    kind: ConstructKind,
    start: usize,
    children: Vec<Token>,
}

impl TokenBuilder {
    fn push(&mut self, kind: TokenKind, range: Range<usize>) {
        match self.children.last_mut() {
            Some(last) if last.kind == kind && last.range.end == range.start => {
                last.range.end = range.end;
            }
            _ => self.children.push(Token {
                kind,
                range,
                children: vec![],
            }),
        }
    }

    fn finish(self, end: usize) -> Token {
        Token {
            kind: TokenKind::Construct(self.kind),
            range: self.start..end,
            children: self.children,
        }
    }
}

/// Tries `construct` at byte offset `start` of `text`.
///
/// `previous` is the code before `start`, `None` at the start of a line or of the input.
/// Returns the committed token tree, or `None` without any side effect.
pub fn attempt<C: Construct>(
    construct: &C,
    text: &str,
    start: usize,
    previous: Code,
) -> Option<Token> {
    let mut cursor = Cursor {
        text,
        position: start,
    };
    if cursor.peek() != Some(C::TRIGGER) || !construct.accepts_previous(previous) {
        return None;
    }

    let mut builder = TokenBuilder {
        kind: C::KIND,
        start,
        children: vec![],
    };
    let mut state = construct.start();
    loop {
        let code = cursor.peek();
        match construct.step(state, code) {
            Step::Continue { next, consumed } => {
                if consumed {
                    debug_assert!(code.is_some(), "{} consumed end of input", C::KIND);
                    builder.push(construct.segment(state), cursor.advance());
                }
                state = next;
            }
            Step::Accept { consumed } => {
                if consumed {
                    builder.push(construct.segment(state), cursor.advance());
                }
                return Some(builder.finish(cursor.position));
            }
            Step::Reject => {
                tracing::trace!(
                    "{} rejected {:?} in state {:?} at offset {}",
                    C::KIND,
                    code,
                    state,
                    cursor.position
                );
                return None;
            }
        }
    }
}
