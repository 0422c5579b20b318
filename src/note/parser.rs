use pulldown_cmark::{Event as MdEvent, HeadingLevel, Tag as MdTag, TagEnd as MdTagEnd};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{
        md::{events_with, NoteEvent},
        ConstructSet, InlineNode,
    },
    error::NotesyncError,
    note::{
        frontmatter::{parse_frontmatter, split_frontmatter, Frontmatter},
        NoteId,
    },
};

/// Metadata extracted from one note body.
///
/// One entry per construct occurrence, in document order. Duplicates are kept; the
/// [`NoteGraph`](crate::graph::NoteGraph) deduplicates when indexing.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNote {
    pub title: String,
    pub frontmatter: Frontmatter,
    /// Note-link and note-embed ids.
    pub links: Vec<NoteId>,
    pub tags: Vec<String>,
    pub dates: Vec<String>,
}

/// Tracks the text of the first level-1 heading while walking the event stream.
#[derive(Debug, Default)]
enum TitleState {
    #[default]
    Searching,
    Collecting(String),
    Found(String),
}

impl TitleState {
    fn push(&mut self, text: &str) {
        if let TitleState::Collecting(title) = self {
            title.push_str(text);
        }
    }

    fn into_title(self) -> String {
        match self {
            TitleState::Found(title) => title,
            _ => String::new(),
        }
    }
}

/// Parses `body` into its title, frontmatter, links, tags and dates.
///
/// Malformed frontmatter is an error. Callers indexing a whole corpus recover per note.
pub fn parse_note(body: &str) -> Result<ParsedNote, NotesyncError> {
    parse_note_with(body, ConstructSet::all())
}

#[tracing::instrument(skip_all, fields(len = body.len()))]
pub fn parse_note_with(body: &str, enabled: ConstructSet) -> Result<ParsedNote, NotesyncError> {
    let (frontmatter_text, markdown, _offset) = split_frontmatter(body);
    let frontmatter = match frontmatter_text {
        Some(text) => parse_frontmatter(text)?,
        None => Frontmatter::new(),
    };

    let mut parsed = ParsedNote {
        frontmatter,
        ..Default::default()
    };
    let mut title = TitleState::default();
    for (event, _range) in events_with(markdown, enabled) {
        match event {
            NoteEvent::Markdown(MdEvent::Start(MdTag::Heading {
                level: HeadingLevel::H1,
                ..
            })) => {
                if matches!(title, TitleState::Searching) {
                    title = TitleState::Collecting(String::new());
                }
            }
            NoteEvent::Markdown(MdEvent::End(MdTagEnd::Heading(HeadingLevel::H1))) => {
                if let TitleState::Collecting(text) = title {
                    title = TitleState::Found(text.trim().to_string());
                }
            }
            NoteEvent::Markdown(MdEvent::Text(text) | MdEvent::Code(text)) => title.push(&text),
            NoteEvent::Markdown(MdEvent::SoftBreak | MdEvent::HardBreak) => title.push(" "),
            NoteEvent::Construct(node) => {
                title.push(&node.to_string());
                match node {
                    InlineNode::NoteLink { id } | InlineNode::NoteEmbed { id, .. } => {
                        parsed.links.push(NoteId::from(id))
                    }
                    InlineNode::TagLink { name } => parsed.tags.push(name),
                    InlineNode::DateLink { date } => parsed.dates.push(date),
                }
            }
            _ => {}
        }
    }
    parsed.title = title.into_title();
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_note() {
        let body = "---\nstatus: draft\n---\n# Weekly review #work\n\nSee [[1]], [[2]] and [[1]] again.\n\n![[3|the plan]] on [[2024-05-06]] #work #ideas\n";
        let parsed = parse_note(body).unwrap();
        assert_eq!(parsed.title, "Weekly review #work");
        assert_eq!(parsed.frontmatter.get("status"), Some(&json!("draft")));
        assert_eq!(
            parsed.links,
            vec![
                NoteId::from("1"),
                NoteId::from("2"),
                NoteId::from("1"),
                NoteId::from("3")
            ]
        );
        assert_eq!(parsed.tags, vec!["work", "work", "ideas"]);
        assert_eq!(parsed.dates, vec!["2024-05-06"]);
    }

    #[test]
    fn test_title_is_first_level_one_heading() {
        let parsed = parse_note("## Sub\n\n# First `code`\n\n# Second\n").unwrap();
        assert_eq!(parsed.title, "First code");
        assert_eq!(parse_note("no heading here").unwrap().title, "");
        assert_eq!(parse_note("Setext\n===\n").unwrap().title, "Setext");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(parse_note("").unwrap(), ParsedNote::default());
    }

    #[test]
    fn test_malformed_frontmatter_fails_the_note() {
        assert!(parse_note("---\ntitle: [unclosed\n---\n#tag\n").is_err());
    }

    #[test]
    fn test_restricted_constructs() {
        let parsed =
            parse_note_with("#tag [[1]]", ConstructSet::only(crate::codec::ConstructKind::TagLink))
                .unwrap();
        assert_eq!(parsed.tags, vec!["tag"]);
        assert!(parsed.links.is_empty());
    }
}
