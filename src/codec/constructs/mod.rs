//! The four construct automata and the scanner that runs them over a text run.

use serde::{Deserialize, Serialize};
use std::{fmt, ops::Range};

use super::{
    chars::Code,
    tokenizer::{attempt, Construct, ConstructKind, ConstructSet, Token, TokenKind},
};

pub mod date_link;
pub mod note_embed;
pub mod note_link;
pub mod tag_link;

pub use date_link::DateLink;
pub use note_embed::NoteEmbed;
pub use note_link::NoteLink;
pub use tag_link::TagLink;

/// A typed inline node built from a committed token tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InlineNode {
    NoteLink { id: String },
    NoteEmbed { id: String, text: String },
    TagLink { name: String },
    /// `date` is the literal matched text and may not be a real calendar date.
    DateLink { date: String },
}

impl InlineNode {
    /// Builds the node for `token`, slicing its fields out of `text`.
    pub fn from_token(token: &Token, text: &str) -> Option<InlineNode> {
        let field = |kind: TokenKind| token.child(kind).map(|child| child.slice(text).to_string());
        match token.construct()? {
            ConstructKind::NoteLink => Some(InlineNode::NoteLink {
                id: field(TokenKind::Id)?,
            }),
            ConstructKind::NoteEmbed => {
                let id = field(TokenKind::Id)?;
                let text = field(TokenKind::Text).unwrap_or_else(|| id.clone());
                Some(InlineNode::NoteEmbed { id, text })
            }
            ConstructKind::TagLink => Some(InlineNode::TagLink {
                name: field(TokenKind::Name)?,
            }),
            ConstructKind::DateLink => Some(InlineNode::DateLink {
                date: field(TokenKind::Date)?,
            }),
        }
    }

    pub fn kind(&self) -> ConstructKind {
        match self {
            InlineNode::NoteLink { .. } => ConstructKind::NoteLink,
            InlineNode::NoteEmbed { .. } => ConstructKind::NoteEmbed,
            InlineNode::TagLink { .. } => ConstructKind::TagLink,
            InlineNode::DateLink { .. } => ConstructKind::DateLink,
        }
    }
}

/// Writes the node back in its wire syntax.
impl fmt::Display for InlineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlineNode::NoteLink { id } => write!(f, "[[{id}]]"),
            InlineNode::NoteEmbed { id, text } if id == text => write!(f, "![[{id}]]"),
            InlineNode::NoteEmbed { id, text } => write!(f, "![[{id}|{text}]]"),
            InlineNode::TagLink { name } => write!(f, "#{name}"),
            InlineNode::DateLink { date } => write!(f, "[[{date}]]"),
        }
    }
}

/// A piece of a scanned text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scanned {
    /// Byte range of text that matched no construct.
    Literal(Range<usize>),
    Construct { token: Token, node: InlineNode },
}

fn try_constructs(text: &str, at: usize, previous: Code, enabled: ConstructSet) -> Option<Token> {
    let trigger = text[at..].chars().next()?;
    let try_one = |kind: ConstructKind| -> Option<Token> {
        if !enabled.contains(kind) {
            return None;
        }
        match kind {
            ConstructKind::NoteLink => attempt(&NoteLink, text, at, previous),
            ConstructKind::NoteEmbed => attempt(&NoteEmbed, text, at, previous),
            ConstructKind::TagLink => attempt(&TagLink, text, at, previous),
            ConstructKind::DateLink => attempt(&DateLink, text, at, previous),
        }
    };
    match trigger {
        NoteLink::TRIGGER => {
            try_one(ConstructKind::NoteLink).or_else(|| try_one(ConstructKind::DateLink))
        }
        NoteEmbed::TRIGGER => try_one(ConstructKind::NoteEmbed),
        TagLink::TRIGGER => try_one(ConstructKind::TagLink),
        _ => None,
    }
}

/// Splits `text` into literal ranges and constructs.
///
/// `previous` is the character before the run, `None` if the run starts a line. A failed
/// attempt leaves its trigger in the literal output and scanning resumes at the next
/// character.
pub fn scan(text: &str, previous: Code, enabled: ConstructSet) -> Vec<Scanned> {
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut position = 0;
    let mut previous = previous;
    while let Some(c) = text[position..].chars().next() {
        match try_constructs(text, position, previous, enabled) {
            Some(token) => {
                let Some(node) = InlineNode::from_token(&token, text) else {
                    // Every committed tree carries its required children.
                    position += c.len_utf8();
                    previous = Some(c);
                    continue;
                };
                if literal_start < position {
                    out.push(Scanned::Literal(literal_start..position));
                }
                position = token.range.end;
                previous = text[..position].chars().next_back();
                literal_start = position;
                out.push(Scanned::Construct { token, node });
            }
            None => {
                position += c.len_utf8();
                previous = Some(c);
            }
        }
    }
    if literal_start < text.len() {
        out.push(Scanned::Literal(literal_start..text.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> Vec<String> {
        scan(text, None, ConstructSet::all())
            .into_iter()
            .map(|piece| match piece {
                Scanned::Literal(range) => format!("text({})", &text[range]),
                Scanned::Construct { node, .. } => format!("{node:?}"),
            })
            .collect()
    }

    #[test]
    fn test_scan_mixed_run() {
        assert_eq!(
            render("see [[12]] on [[2020-01-02]] #todo ![[12|x]]"),
            vec![
                "text(see )".to_string(),
                "NoteLink { id: \"12\" }".to_string(),
                "text( on )".to_string(),
                "DateLink { date: \"2020-01-02\" }".to_string(),
                "text( )".to_string(),
                "TagLink { name: \"todo\" }".to_string(),
                "text( )".to_string(),
                "NoteEmbed { id: \"12\", text: \"x\" }".to_string(),
            ]
        );
    }

    #[test]
    fn test_tag_after_tag_is_literal() {
        assert_eq!(
            render("#hello#world"),
            vec![
                "TagLink { name: \"hello\" }".to_string(),
                "text(#world)".to_string()
            ]
        );
        assert_eq!(render("hello#world"), vec!["text(hello#world)".to_string()]);
    }

    #[test]
    fn test_failed_attempt_resumes_after_trigger() {
        // The first `[` fails as both note and date link; the second starts a valid link.
        assert_eq!(
            render("[[[1]]"),
            vec!["text([)".to_string(), "NoteLink { id: \"1\" }".to_string()]
        );
        assert_eq!(render("[[123"), vec!["text([[123)".to_string()]);
        assert_eq!(render("#0123456789"), vec!["text(#0123456789)".to_string()]);
    }

    #[test]
    fn test_embed_label_defaults_to_id() {
        let pieces = scan("![[photo.png]]", None, ConstructSet::all());
        let [Scanned::Construct { token, node }] = pieces.as_slice() else {
            panic!("expected a single construct, got {pieces:?}");
        };
        assert_eq!(token.range, 0..14);
        assert_eq!(
            node,
            &InlineNode::NoteEmbed {
                id: "photo.png".to_string(),
                text: "photo.png".to_string()
            }
        );
    }

    #[test]
    fn test_disabled_constructs_stay_literal() {
        let enabled = ConstructSet::only(ConstructKind::TagLink);
        let pieces = scan("[[1]] #a", None, enabled);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], Scanned::Literal(0..6));
    }
}
