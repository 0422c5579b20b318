//! Tests for NoteGraph indexing

use super::*;

fn corpus() -> Vec<(NoteId, &'static str)> {
    vec![
        (NoteId::from("1"), "# Inbox\n\n#todo see [[2]] and [[3]] on [[2024-01-01]]\n"),
        (NoteId::from("2"), "# Project\n\n#todo #work links back to [[1]] and itself [[2]]\n"),
        (NoteId::from("3"), "# Leaf\n\n#work [[2024-01-02]]\n"),
        (NoteId::from("4"), "# Orphan\n\npoints at [[99]]\n"),
    ]
}

fn ids(notes: Vec<&Note>) -> Vec<&str> {
    notes.into_iter().map(|note| note.id.as_str()).collect()
}

fn set(items: &[&str]) -> BTreeSet<NoteId> {
    items.iter().map(|id| NoteId::from(*id)).collect()
}

/// Checks that every backlink entry matches an outgoing link and the other way around.
fn assert_backlink_invariant(graph: &NoteGraph) {
    for note in graph.notes().values() {
        for source in &note.backlinks {
            let source_note = graph.note(source.as_str()).expect("backlink source exists");
            assert!(source_note.links.contains(&note.id));
            assert_ne!(source, &note.id);
        }
        for target in note.link_targets() {
            if let Some(target_note) = graph.note(target.as_str()) {
                assert!(target_note.backlinks.contains(&note.id));
            }
        }
    }
    for (tag, bucket) in graph.tag_index() {
        assert!(!bucket.is_empty());
        for id in bucket {
            assert!(graph.note(id.as_str()).unwrap().tags.contains(tag));
        }
    }
    for (date, bucket) in graph.date_index() {
        assert!(!bucket.is_empty());
        for id in bucket {
            assert!(graph.note(id.as_str()).unwrap().dates.contains(date));
        }
    }
}

#[test]
fn test_rebuild_indexes() {
    let graph = NoteGraph::from_corpus(corpus());
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.tag_index().get("todo"), Some(&set(&["1", "2"])));
    assert_eq!(graph.tag_index().get("work"), Some(&set(&["2", "3"])));
    assert_eq!(graph.date_index().get("2024-01-01"), Some(&set(&["1"])));
    assert_eq!(graph.note("1").unwrap().backlinks, set(&["2"]));
    // Self-links never count.
    assert_eq!(graph.note("2").unwrap().backlinks, set(&["1"]));
    assert_eq!(graph.note("3").unwrap().backlinks, set(&["1"]));
    assert!(graph.note("4").unwrap().backlinks.is_empty());
    assert_eq!(graph.note("2").unwrap().title, "Project");
    assert_backlink_invariant(&graph);
}

#[test]
fn test_rebuild_is_idempotent() {
    let mut graph = NoteGraph::from_corpus(corpus());
    let first = graph.clone();
    graph.rebuild(corpus());
    assert_eq!(graph, first);
}

#[test]
fn test_incremental_upsert_matches_rebuild() {
    let edits = [
        ("1", "#todo only [[3]] now, on [[2024-01-02]]"),
        ("3", "#fresh links [[1]] [[1]] [[4]]"),
        ("5", "# New\n\n#work [[2]] ![[4|embedded]]"),
        ("2", ""),
        ("99", "the dangling target finally exists"),
    ];
    let mut incremental = NoteGraph::from_corpus(corpus());
    let mut bodies: BTreeMap<NoteId, String> = corpus()
        .into_iter()
        .map(|(id, body)| (id, body.to_string()))
        .collect();
    for (id, body) in edits {
        incremental.upsert(NoteId::from(id), body);
        bodies.insert(NoteId::from(id), body.to_string());
        let rebuilt = NoteGraph::from_corpus(bodies.clone());
        assert_eq!(incremental, rebuilt, "after upserting {id}");
        assert_backlink_invariant(&incremental);
    }
    assert_eq!(incremental.note("99").unwrap().backlinks, set(&["4"]));
    assert!(incremental.tag_index().get("fresh").is_some());
    assert!(incremental.date_index().get("2024-01-01").is_none());
}

#[test]
fn test_delete_guard() {
    let mut graph = NoteGraph::from_corpus(corpus());
    let before = graph.clone();
    assert!(!graph.can_delete("3"));
    match graph.delete("3") {
        Err(NotesyncError::HasBacklinks { id, backlinks }) => {
            assert_eq!(id, "3");
            assert_eq!(backlinks, vec!["1".to_string()]);
        }
        other => panic!("expected a refusal, got {other:?}"),
    }
    assert_eq!(graph, before);
    assert!(matches!(
        graph.delete("404"),
        Err(NotesyncError::NotFound(_))
    ));
}

#[test]
fn test_delete_without_backlinks() {
    let mut graph = NoteGraph::from_corpus(corpus());
    graph.upsert(NoteId::from("5"), "#solo links [[3]] [[5]]");
    assert!(graph.can_delete("5"));
    let removed = graph.delete("5").unwrap();
    assert_eq!(removed.id.as_str(), "5");
    assert!(graph.tag_index().get("solo").is_none());
    assert_eq!(graph.note("3").unwrap().backlinks, set(&["1"]));
    // Other notes' own metadata is untouched.
    assert_eq!(graph.note("1").unwrap().links.len(), 2);
    assert_eq!(graph, NoteGraph::from_corpus(corpus()));
}

#[test]
fn test_malformed_frontmatter_recovers_per_note() {
    let graph = NoteGraph::from_corpus(vec![
        (NoteId::from("1"), "---\ntitle: [broken\n---\n#lost [[2]]\n"),
        (NoteId::from("2"), "#kept"),
    ]);
    let broken = graph.note("1").unwrap();
    assert!(broken.links.is_empty() && broken.tags.is_empty() && broken.dates.is_empty());
    assert!(graph.note("2").unwrap().backlinks.is_empty());
    assert_eq!(graph.notes_with_tag("kept").len(), 1);
}

#[test]
fn test_queries() {
    let graph = NoteGraph::from_corpus(corpus());
    assert_eq!(graph.tags(), vec![("todo", 2), ("work", 2)]);
    assert_eq!(graph.dates(), vec!["2024-01-02", "2024-01-01"]);
    assert_eq!(ids(graph.notes_on_date("2024-01-02")), vec!["3"]);
    assert_eq!(ids(graph.backlinks("2")), vec!["1"]);
    assert_eq!(ids(graph.search("PROJECT")), vec!["2"]);
    assert_eq!(ids(graph.search("orphan")), vec!["4"]);
    assert_eq!(graph.search("").len(), 4);
    assert!(graph.notes_with_tag("missing").is_empty());
}

#[test]
fn test_next_note_id_is_unused() {
    let mut graph = NoteGraph::new();
    let id = graph.next_note_id();
    graph.upsert(id.clone(), "taken");
    let next = graph.next_note_id();
    assert_ne!(next, id);
    assert!(!graph.contains(next.as_str()));
}

#[test]
fn test_serde_round_trip_reindexes() {
    let graph = NoteGraph::from_corpus(corpus());
    let json = serde_json::to_string(&graph).unwrap();
    let restored: NoteGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, graph);
}
