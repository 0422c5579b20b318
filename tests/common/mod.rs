//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use async_trait::async_trait;
use notesync_core::{
    config::SyncConfig,
    sync::{MemoryNoteStore, NoteStore, RemoteEntry, RemoteFile, RepoRef, Session},
    NotesyncError,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::Semaphore;

#[allow(dead_code)]
pub fn repo() -> RepoRef {
    RepoRef::new("me", "notes")
}

/// A config signed in to [`repo`].
#[allow(dead_code)]
pub fn config(online: bool) -> SyncConfig {
    SyncConfig {
        repo_owner: Some("me".to_string()),
        repo_name: Some("notes".to_string()),
        auth_token: Some("token".to_string()),
        online,
        ..Default::default()
    }
}

/// Create a directory of notes linking to each other.
///
/// Returns the path to the notes directory (e.g. `<temp_dir>/notes/`).
///
/// `1.md` links to `2.md` and `3.md`, `2.md` links back to `1.md`, `3.md` has frontmatter,
/// and `README.txt` is not a note.
#[allow(dead_code)]
pub fn create_test_notes(temp_dir: &TempDir) -> PathBuf {
    let notes_path = temp_dir.path().join("notes");
    std::fs::create_dir(&notes_path).unwrap();

    let inbox = r#"# Inbox

#todo read [[2]] and ![[3|the summary]] before [[2024-03-01]].
"#;
    std::fs::write(notes_path.join("1.md"), inbox).unwrap();

    let project = r#"# Project plan

Back to [[1]]. #todo #project-x

```
#not-a-tag [[99]]
```
"#;
    std::fs::write(notes_path.join("2.md"), project).unwrap();

    let summary = r#"---
status: final
reviewers: [ana, li]
---
# Summary

Written on [[2024-03-01]]. #project-x
"#;
    std::fs::write(notes_path.join("3.md"), summary).unwrap();
    std::fs::write(notes_path.join("README.txt"), "#ignored [[1]]").unwrap();

    notes_path
}

/// Wraps a [`MemoryNoteStore`] and holds every write until [`GatedStore::open`] is called.
#[allow(dead_code)]
pub struct GatedStore {
    pub inner: MemoryNoteStore,
    gate: Semaphore,
    writes: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl GatedStore {
    pub fn new() -> GatedStore {
        GatedStore {
            inner: MemoryNoteStore::new(),
            gate: Semaphore::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Releases every held and future write. A closed semaphore fails every acquire at once.
    pub fn open(&self) {
        self.gate.close();
    }

    /// Paths written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl NoteStore for GatedStore {
    async fn latest_version(&self, session: &Session) -> Result<String, NotesyncError> {
        self.inner.latest_version(session).await
    }

    async fn list(&self, session: &Session) -> Result<Vec<RemoteEntry>, NotesyncError> {
        self.inner.list(session).await
    }

    async fn read(&self, session: &Session, path: &str) -> Result<RemoteFile, NotesyncError> {
        self.inner.read(session, path).await
    }

    async fn write(
        &self,
        session: &Session,
        path: &str,
        content: &str,
        expected: Option<&str>,
    ) -> Result<String, NotesyncError> {
        let _closed = self.gate.acquire().await;
        self.writes.lock().push(path.to_string());
        self.inner.write(session, path, content, expected).await
    }

    async fn delete(
        &self,
        session: &Session,
        path: &str,
        expected: Option<&str>,
    ) -> Result<(), NotesyncError> {
        let _closed = self.gate.acquire().await;
        self.inner.delete(session, path, expected).await
    }
}

/// A store whose calls never complete.
#[allow(dead_code)]
pub struct HangingStore;

#[async_trait]
impl NoteStore for HangingStore {
    async fn latest_version(&self, _session: &Session) -> Result<String, NotesyncError> {
        std::future::pending().await
    }

    async fn list(&self, _session: &Session) -> Result<Vec<RemoteEntry>, NotesyncError> {
        std::future::pending().await
    }

    async fn read(&self, _session: &Session, _path: &str) -> Result<RemoteFile, NotesyncError> {
        std::future::pending().await
    }

    async fn write(
        &self,
        _session: &Session,
        _path: &str,
        _content: &str,
        _expected: Option<&str>,
    ) -> Result<String, NotesyncError> {
        std::future::pending().await
    }

    async fn delete(
        &self,
        _session: &Session,
        _path: &str,
        _expected: Option<&str>,
    ) -> Result<(), NotesyncError> {
        std::future::pending().await
    }
}
