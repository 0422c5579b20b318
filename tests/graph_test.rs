//! Integration tests building a note graph from a directory of notes on disk.

mod common;

use notesync_core::{
    graph::NoteGraph,
    note::{parse_note, NoteId},
    NotesyncError,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use test_log::test;
use walkdir::WalkDir;

fn read_corpus(dir: &Path) -> Vec<(NoteId, String)> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let id = NoteId::from_path(&entry.file_name().to_string_lossy())?;
            Some((id, std::fs::read_to_string(entry.path()).ok()?))
        })
        .collect()
}

fn ids(notes: Vec<&notesync_core::note::Note>) -> Vec<&str> {
    notes.into_iter().map(|note| note.id.as_str()).collect()
}

#[test]
fn test_graph_from_notes_directory() {
    let temp_dir = TempDir::new().unwrap();
    let notes_path = common::create_test_notes(&temp_dir);
    let graph = NoteGraph::from_corpus(read_corpus(&notes_path));

    assert_eq!(graph.len(), 3);
    assert!(!graph.contains("README"));

    let inbox = graph.note("1").unwrap();
    assert_eq!(inbox.title, "Inbox");
    assert_eq!(inbox.links, vec![NoteId::from("2"), NoteId::from("3")]);
    assert_eq!(inbox.tags, vec!["todo"]);
    assert_eq!(inbox.dates, vec!["2024-03-01"]);

    let summary = graph.note("3").unwrap();
    assert_eq!(summary.title, "Summary");
    assert_eq!(summary.frontmatter.get("status"), Some(&json!("final")));
    assert_eq!(summary.frontmatter.get("reviewers"), Some(&json!(["ana", "li"])));

    // Constructs inside code blocks are not indexed.
    assert!(!graph.tag_index().contains_key("not-a-tag"));
    assert!(graph.backlinks("99").is_empty());

    assert_eq!(graph.tags(), vec![("project-x", 2), ("todo", 2)]);
    assert_eq!(graph.dates(), vec!["2024-03-01"]);
    assert_eq!(ids(graph.notes_on_date("2024-03-01")), vec!["1", "3"]);
    assert_eq!(ids(graph.backlinks("1")), vec!["2"]);
    assert_eq!(ids(graph.backlinks("3")), vec!["1"]);
}

#[test]
fn test_edits_match_rebuild_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let notes_path = common::create_test_notes(&temp_dir);
    let mut graph = NoteGraph::from_corpus(read_corpus(&notes_path));

    let edited = "# Inbox\n\nNothing left. #done [[2024-03-02]]\n";
    std::fs::write(notes_path.join("1.md"), edited).unwrap();
    graph.upsert(NoteId::from("1"), edited);

    let rebuilt = NoteGraph::from_corpus(read_corpus(&notes_path));
    assert_eq!(graph, rebuilt);
    assert!(graph.backlinks("3").is_empty());
    assert_eq!(ids(graph.notes_with_tag("todo")), vec!["2"]);
    assert_eq!(graph.dates(), vec!["2024-03-02", "2024-03-01"]);
}

#[test]
fn test_delete_guard_on_disk_corpus() {
    let temp_dir = TempDir::new().unwrap();
    let notes_path = common::create_test_notes(&temp_dir);
    let mut graph = NoteGraph::from_corpus(read_corpus(&notes_path));
    let before = graph.clone();

    let refused = graph.delete("3");
    assert!(matches!(refused, Err(NotesyncError::HasBacklinks { .. })));
    assert_eq!(graph, before);

    // Unlinking 3 from the inbox frees it.
    graph.upsert(NoteId::from("1"), "# Inbox\n\n#todo read [[2]]");
    let removed = graph.delete("3").unwrap();
    assert_eq!(removed.title, "Summary");
    assert_eq!(ids(graph.notes_with_tag("project-x")), vec!["2"]);
    assert_eq!(ids(graph.notes_on_date("2024-03-01")), Vec::<&str>::new());
}

#[test]
fn test_malformed_note_does_not_block_the_corpus() {
    let temp_dir = TempDir::new().unwrap();
    let notes_path = common::create_test_notes(&temp_dir);
    let broken = "---\ntitle: [unclosed\n---\n# Broken #tag [[1]]\n";
    std::fs::write(notes_path.join("4.md"), broken).unwrap();
    assert!(parse_note(broken).is_err());

    let graph = NoteGraph::from_corpus(read_corpus(&notes_path));
    assert_eq!(graph.len(), 4);
    let note = graph.note("4").unwrap();
    assert!(note.links.is_empty() && note.tags.is_empty() && note.dates.is_empty());
    assert_eq!(note.raw_body, broken);
    assert_eq!(ids(graph.backlinks("1")), vec!["2"]);
}

#[test]
fn test_search_and_next_id() {
    let temp_dir = TempDir::new().unwrap();
    let notes_path = common::create_test_notes(&temp_dir);
    let graph = NoteGraph::from_corpus(read_corpus(&notes_path));

    assert_eq!(ids(graph.search("plan")), vec!["2"]);
    assert_eq!(ids(graph.search("project-x")), vec!["2", "3"]);
    assert_eq!(ids(graph.search("SUMMARY")), vec!["1", "3"]);
    assert_eq!(graph.search("").len(), 3);
    assert!(!graph.contains(graph.next_note_id().as_str()));
}

#[test]
fn test_links_survive_neighbouring_link_syntax() {
    let corpus = vec![
        (NoteId::from("1"), "# Target\n".to_string()),
        (NoteId::from("2"), "# Draft\n\nsee [[1]](draft)\n".to_string()),
        (
            NoteId::from("3"),
            "# Ref\n\nsee [[1]]\n\n[1]: https://example.com\n".to_string(),
        ),
    ];
    let mut graph = NoteGraph::from_corpus(corpus);

    assert_eq!(graph.note("2").unwrap().links, vec![NoteId::from("1")]);
    assert_eq!(graph.note("3").unwrap().links, vec![NoteId::from("1")]);
    assert_eq!(ids(graph.backlinks("1")), vec!["2", "3"]);
    assert!(matches!(
        graph.delete("1"),
        Err(NotesyncError::HasBacklinks { .. })
    ));
    assert!(graph.contains("1"));
}
