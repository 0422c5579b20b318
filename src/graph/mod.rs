//! The in-memory note graph: every note plus its derived tag, date and backlink indexes.
//!
//! The graph is the only writer of its maps. Everything else reads through the projection
//! methods, which hand out shared references.
//!
//! Two ways to get the indexes into shape:
//!
//! - [`NoteGraph::rebuild`] parses the whole corpus and derives every index from scratch.
//!   Backlinks are filled in a second pass, once every note's outgoing links are known.
//! - [`NoteGraph::upsert`] re-parses a single note and patches only the buckets whose membership
//!   changed. The result is identical to a rebuild with the new body substituted.
//!
//! Links to ids that do not exist yet are remembered, so a note created later immediately
//! reports the backlinks it already has.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::NotesyncError,
    note::{parse_note, Note, NoteId, NoteIndex, ParsedNote},
};

#[cfg(test)]
mod tests;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NoteGraph {
    notes: BTreeMap<NoteId, Note>,
    tag_index: NoteIndex,
    date_index: NoteIndex,
    /// Link target to the existing notes linking to it. Targets may not exist.
    link_index: BTreeMap<NoteId, BTreeSet<NoteId>>,
}

/// Parses `body`, falling back to empty metadata when the note cannot be parsed.
fn parse_or_empty(id: &NoteId, body: &str) -> ParsedNote {
    match parse_note(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Note {id} could not be parsed and is indexed without metadata: {e}");
            ParsedNote::default()
        }
    }
}

fn bucket_insert<K: Ord>(index: &mut BTreeMap<K, BTreeSet<NoteId>>, key: K, id: &NoteId) {
    index.entry(key).or_default().insert(id.clone());
}

fn bucket_remove<K: Ord>(index: &mut BTreeMap<K, BTreeSet<NoteId>>, key: &K, id: &NoteId) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(id);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

/// Distinct index keys of a note: its tags, its dates, and the targets of its links.
#[derive(Debug, Default)]
struct IndexKeys {
    tags: BTreeSet<String>,
    dates: BTreeSet<String>,
    targets: BTreeSet<NoteId>,
}

impl IndexKeys {
    fn of(note: &Note) -> IndexKeys {
        IndexKeys {
            tags: note.tags.iter().cloned().collect(),
            dates: note.dates.iter().cloned().collect(),
            targets: note.link_targets().into_iter().cloned().collect(),
        }
    }
}

impl NoteGraph {
    pub fn new() -> NoteGraph {
        NoteGraph::default()
    }

    /// Builds a graph from `(id, body)` pairs. Later duplicates of an id replace earlier ones.
    pub fn from_corpus<I, B>(corpus: I) -> NoteGraph
    where
        I: IntoIterator<Item = (NoteId, B)>,
        B: Into<String>,
    {
        let mut graph = NoteGraph::new();
        graph.rebuild(corpus);
        graph
    }

    /// Builds a graph from notes that were already parsed, re-deriving only the indexes.
    pub fn from_notes<I: IntoIterator<Item = Note>>(notes: I) -> NoteGraph {
        let mut graph = NoteGraph {
            notes: notes
                .into_iter()
                .map(|note| (note.id.clone(), note))
                .collect(),
            ..Default::default()
        };
        graph.reindex();
        graph
    }

    /// Replaces the whole graph with `corpus`, re-parsing every note.
    #[tracing::instrument(skip_all)]
    pub fn rebuild<I, B>(&mut self, corpus: I)
    where
        I: IntoIterator<Item = (NoteId, B)>,
        B: Into<String>,
    {
        self.notes = corpus
            .into_iter()
            .map(|(id, body)| {
                let body = body.into();
                let parsed = parse_or_empty(&id, &body);
                (id.clone(), Note::new(id, body, parsed))
            })
            .collect();
        self.reindex();
        tracing::debug!(
            "Rebuilt graph: {} notes, {} tags, {} dates",
            self.notes.len(),
            self.tag_index.len(),
            self.date_index.len()
        );
    }

    fn reindex(&mut self) {
        self.tag_index.clear();
        self.date_index.clear();
        self.link_index.clear();
        for note in self.notes.values() {
            let keys = IndexKeys::of(note);
            for tag in keys.tags {
                bucket_insert(&mut self.tag_index, tag, &note.id);
            }
            for date in keys.dates {
                bucket_insert(&mut self.date_index, date, &note.id);
            }
            for target in keys.targets {
                bucket_insert(&mut self.link_index, target, &note.id);
            }
        }
        for (id, note) in self.notes.iter_mut() {
            note.backlinks = self.link_index.get(id).cloned().unwrap_or_default();
        }
    }

    /// Creates or replaces note `id` with `body` and patches the indexes in place.
    #[tracing::instrument(skip(self, body))]
    pub fn upsert(&mut self, id: NoteId, body: impl Into<String>) -> &Note {
        let body = body.into();
        let parsed = parse_or_empty(&id, &body);
        let mut note = Note::new(id.clone(), body, parsed);
        let new_keys = IndexKeys::of(&note);
        let old_keys = self
            .notes
            .get(&id)
            .map(IndexKeys::of)
            .unwrap_or_default();

        for tag in old_keys.tags.difference(&new_keys.tags) {
            bucket_remove(&mut self.tag_index, tag, &id);
        }
        for tag in new_keys.tags.difference(&old_keys.tags) {
            bucket_insert(&mut self.tag_index, tag.clone(), &id);
        }
        for date in old_keys.dates.difference(&new_keys.dates) {
            bucket_remove(&mut self.date_index, date, &id);
        }
        for date in new_keys.dates.difference(&old_keys.dates) {
            bucket_insert(&mut self.date_index, date.clone(), &id);
        }
        for target in old_keys.targets.difference(&new_keys.targets) {
            self.unlink(&id, target);
        }
        for target in new_keys.targets.difference(&old_keys.targets) {
            self.link(&id, target);
        }

        note.backlinks = self.link_index.get(&id).cloned().unwrap_or_default();
        self.notes.insert(id.clone(), note);
        &self.notes[&id]
    }

    fn link(&mut self, source: &NoteId, target: &NoteId) {
        bucket_insert(&mut self.link_index, target.clone(), source);
        if let Some(note) = self.notes.get_mut(target) {
            note.backlinks.insert(source.clone());
        }
    }

    fn unlink(&mut self, source: &NoteId, target: &NoteId) {
        bucket_remove(&mut self.link_index, target, source);
        if let Some(note) = self.notes.get_mut(target) {
            note.backlinks.remove(source);
        }
    }

    /// Removes note `id`. Refused without touching the graph when other notes link to it.
    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<Note, NotesyncError> {
        let note = self
            .notes
            .get(id)
            .ok_or_else(|| NotesyncError::NotFound(format!("note {id}")))?;
        if !note.backlinks.is_empty() {
            return Err(NotesyncError::HasBacklinks {
                id: id.to_string(),
                backlinks: note.backlinks.iter().map(NoteId::to_string).collect(),
            });
        }
        let keys = IndexKeys::of(note);
        let id = note.id.clone();
        for tag in &keys.tags {
            bucket_remove(&mut self.tag_index, tag, &id);
        }
        for date in &keys.dates {
            bucket_remove(&mut self.date_index, date, &id);
        }
        for target in &keys.targets {
            self.unlink(&id, target);
        }
        self.notes
            .remove(&id)
            .ok_or_else(|| NotesyncError::NotFound(format!("note {id}")))
    }

    /// Whether [`NoteGraph::delete`] would succeed for `id`.
    pub fn can_delete(&self, id: &str) -> bool {
        self.notes
            .get(id)
            .is_some_and(|note| note.backlinks.is_empty())
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn notes(&self) -> &BTreeMap<NoteId, Note> {
        &self.notes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.notes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn tag_index(&self) -> &NoteIndex {
        &self.tag_index
    }

    pub fn date_index(&self) -> &NoteIndex {
        &self.date_index
    }

    fn resolve<'a>(&'a self, ids: Option<&'a BTreeSet<NoteId>>) -> Vec<&'a Note> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.notes.get(id))
            .collect()
    }

    pub fn notes_with_tag(&self, tag: &str) -> Vec<&Note> {
        self.resolve(self.tag_index.get(tag))
    }

    pub fn notes_on_date(&self, date: &str) -> Vec<&Note> {
        self.resolve(self.date_index.get(date))
    }

    /// The existing notes linking to `id`.
    pub fn backlinks(&self, id: &str) -> Vec<&Note> {
        self.resolve(self.notes.get(id).map(|note| &note.backlinks))
    }

    /// Every tag with the number of notes using it, most used first.
    pub fn tags(&self) -> Vec<(&str, usize)> {
        let mut tags: Vec<(&str, usize)> = self
            .tag_index
            .iter()
            .map(|(tag, ids)| (tag.as_str(), ids.len()))
            .collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        tags
    }

    /// Every date mentioned in the corpus, newest first.
    pub fn dates(&self) -> Vec<&str> {
        self.date_index.keys().rev().map(String::as_str).collect()
    }

    /// Notes whose title or body contains `query`, ignoring case. An empty query matches all.
    pub fn search(&self, query: &str) -> Vec<&Note> {
        let query = query.trim().to_lowercase();
        self.notes
            .values()
            .filter(|note| {
                query.is_empty()
                    || note.title.to_lowercase().contains(&query)
                    || note.raw_body.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// A fresh numeric id not used by any note in the graph.
    pub fn next_note_id(&self) -> NoteId {
        let mut id = NoteId::from_timestamp();
        while self.notes.contains_key(&id) {
            let next = id.as_str().parse::<u128>().unwrap_or_default() + 1;
            id = NoteId::new(next.to_string());
        }
        id
    }
}

/// Persisted as the parsed notes only. Indexes are re-derived on load.
impl Serialize for NoteGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.notes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NoteGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let notes = BTreeMap::<NoteId, Note>::deserialize(deserializer)?;
        Ok(NoteGraph::from_notes(notes.into_values()))
    }
}
