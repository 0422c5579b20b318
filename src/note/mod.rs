//! Notes, their identifiers and the metadata parsed out of their bodies.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

pub mod frontmatter;
pub mod parser;

pub use frontmatter::Frontmatter;
pub use parser::{parse_note, ParsedNote};

/// Extension of note files in a note store.
pub const NOTE_EXTENSION: &str = "md";

static NOTE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:.*/)?([^/]+)\.md$").expect("note path pattern is a valid regex")
});

/// A stable note identifier. New notes get numeric ids, but ids pulled from a store may be any
/// file stem.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> NoteId {
        NoteId(id.into())
    }

    /// A numeric id derived from the current time in milliseconds.
    pub fn from_timestamp() -> NoteId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        NoteId(millis.to_string())
    }

    /// The id of the note stored at `path`, if `path` is a note file.
    pub fn from_path(path: &str) -> Option<NoteId> {
        NOTE_PATH
            .captures(path)
            .and_then(|captures| captures.get(1))
            .map(|stem| NoteId(stem.as_str().to_string()))
    }

    /// The store path of this note.
    pub fn path(&self) -> String {
        format!("{}.{NOTE_EXTENSION}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(id: &str) -> Self {
        NoteId(id.to_string())
    }
}

impl From<String> for NoteId {
    fn from(id: String) -> Self {
        NoteId(id)
    }
}

impl Borrow<str> for NoteId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A note as held by the [`NoteGraph`](crate::graph::NoteGraph).
///
/// `links`, `tags` and `dates` come from parsing `raw_body` and keep duplicates in document
/// order. `backlinks` is derived from the whole corpus: the ids of other existing notes that
/// link here.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub raw_body: String,
    pub title: String,
    pub frontmatter: Frontmatter,
    pub dates: Vec<String>,
    pub links: Vec<NoteId>,
    pub tags: Vec<String>,
    pub backlinks: BTreeSet<NoteId>,
}

impl Note {
    pub(crate) fn new(id: NoteId, raw_body: String, parsed: ParsedNote) -> Note {
        Note {
            id,
            raw_body,
            title: parsed.title,
            frontmatter: parsed.frontmatter,
            dates: parsed.dates,
            links: parsed.links,
            tags: parsed.tags,
            backlinks: BTreeSet::new(),
        }
    }

    /// Distinct link targets other than the note itself.
    pub fn link_targets(&self) -> BTreeSet<&NoteId> {
        self.links.iter().filter(|target| **target != self.id).collect()
    }
}

/// Tag or date index: bucket key to the ids of the notes that mention it.
pub type NoteIndex = BTreeMap<String, BTreeSet<NoteId>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_paths() {
        assert_eq!(NoteId::from_path("123.md"), Some(NoteId::from("123")));
        assert_eq!(NoteId::from_path("notes/123.md"), Some(NoteId::from("123")));
        assert_eq!(NoteId::from_path("uploads/cat.png"), None);
        assert_eq!(NoteId::from_path("README"), None);
        assert_eq!(NoteId::from("42").path(), "42.md");
    }

    #[test]
    fn test_timestamp_ids_are_numeric() {
        let id = NoteId::from_timestamp();
        assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
    }
}
