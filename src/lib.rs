//! # notesync-core
//!
//! The core of a personal note-taking tool whose notes are markdown files kept in sync with a
//! remote git-hosted store.
//!
//! ## Overview
//!
//! Notes are CommonMark documents extended with four inline constructs: note links (`[[123]]`),
//! note embeds (`![[123|label]]`), tag links (`#topic`) and date links (`[[2024-05-06]]`).
//! notesync-core tokenizes those constructs, derives a **note graph** from the corpus (tags,
//! dates and backlinks), keeps that graph current as notes are edited, and reconciles local
//! edits with a remote note store under optimistic concurrency.
//!
//! ### Key Features
//!
//! - **Streaming construct tokenizers**: Hand-written automata that either commit a whole token
//!   tree or leave the text untouched
//! - **Incremental indexing**: Upserts patch only the affected tag, date and backlink buckets
//! - **Referential integrity**: Notes with backlinks cannot be deleted
//! - **Offline-first sync**: Edits never wait for the network; unsynced changes are tracked and
//!   retried
//! - **Event streaming**: State changes and note updates over a tokio channel
//!
//! ## Architecture
//!
//! - **[`codec`]**: Character classes, construct automata and the pulldown-cmark adapter
//! - **[`note`]**: Note ids, frontmatter and the single-note parser
//! - **[`graph`]**: The [`NoteGraph`](graph::NoteGraph) and its indexes
//! - **[`sync`]**: Note stores, the sync state machine and the actor that runs it
//! - **[`event`]**: Events emitted while syncing
//! - **[`config`]**: TOML sync configuration
//!
//! ## Quick Start
//!
//! ### Building a graph
//!
//! ```rust
//! use notesync_core::{graph::NoteGraph, note::NoteId};
//!
//! let mut graph = NoteGraph::from_corpus(vec![
//!     (NoteId::from("1"), "# Inbox\n\n#todo call about [[2]]"),
//!     (NoteId::from("2"), "# Project\n\nStarted [[2024-05-06]] #todo"),
//! ]);
//! assert_eq!(graph.notes_with_tag("todo").len(), 2);
//! assert_eq!(graph.backlinks("2")[0].title, "Inbox");
//!
//! // Note 2 is linked from note 1, so it cannot be deleted yet.
//! assert!(graph.delete("2").is_err());
//! graph.upsert(NoteId::from("1"), "# Inbox\n\nnothing linked");
//! assert!(graph.delete("2").is_ok());
//! ```
//!
//! ### Syncing
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notesync_core::{
//!     config::SyncConfig,
//!     sync::{FsNoteStore, JsonContextStore, SyncEngine, SyncService},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig {
//!         repo_owner: Some("me".to_string()),
//!         repo_name: Some("notes".to_string()),
//!         auth_token: Some("token".to_string()),
//!         ..Default::default()
//!     };
//!     let engine = SyncEngine::new(
//!         Arc::new(FsNoteStore::new("./remote")),
//!         Arc::new(JsonContextStore::new("./context.json")),
//!         config,
//!     );
//!     let (sync, _task) = SyncService::spawn(engine);
//!
//!     sync.upsert_note("42", "# Hello\n\n#first note").await?;
//!     sync.settled().await?;
//!     println!("{:?}", sync.status().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: Parsing, graph, and sync against in-memory or directory-backed stores
//! - **github**: [`sync::GitHubNoteStore`] over the GitHub contents API (`reqwest`)
//! - **bin**: The `notesync` command line tool

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod note;
pub mod sync;

pub use error::*;
