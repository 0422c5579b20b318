//! Everything the sync engine persists between runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::{
    error::NotesyncError,
    graph::NoteGraph,
    note::NoteId,
    sync::store::{RepoRef, Session},
};

/// Local mutations not yet confirmed written to the remote store. An id is never in both sets.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChanges {
    pub upsert: BTreeSet<NoteId>,
    pub delete: BTreeSet<NoteId>,
}

impl PendingChanges {
    pub fn mark_upsert(&mut self, id: NoteId) {
        self.delete.remove(&id);
        self.upsert.insert(id);
    }

    pub fn mark_delete(&mut self, id: NoteId) {
        self.upsert.remove(&id);
        self.delete.insert(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.upsert.contains(id) || self.delete.contains(id)
    }

    pub fn len(&self) -> usize {
        self.upsert.len() + self.delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.delete.is_empty()
    }

    pub fn clear(&mut self) {
        self.upsert.clear();
        self.delete.clear();
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncContext {
    pub auth_token: Option<String>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    /// Collection version seen by the last successful pull or push.
    pub remote_version: Option<String>,
    pub graph: NoteGraph,
    pub pending: PendingChanges,
    pub last_error: Option<NotesyncError>,
    /// Blob version of each note file as last seen on the remote.
    pub file_versions: BTreeMap<NoteId, String>,
}

impl SyncContext {
    pub fn repo(&self) -> Option<RepoRef> {
        match (&self.repo_owner, &self.repo_name) {
            (Some(owner), Some(name)) => Some(RepoRef::new(owner.as_str(), name.as_str())),
            _ => None,
        }
    }

    /// The session for remote calls, if signed in with a repository selected.
    pub fn session(&self) -> Option<Session> {
        Some(Session {
            auth_token: self.auth_token.clone()?,
            repo: self.repo()?,
        })
    }

    /// Forgets everything learned from the current repository.
    pub(crate) fn reset_remote(&mut self) {
        self.remote_version = None;
        self.graph = NoteGraph::new();
        self.pending.clear();
        self.file_versions.clear();
        self.last_error = None;
    }
}

pub trait ContextStore: Send + Sync {
    /// The persisted context, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<SyncContext>, NotesyncError>;
    fn save(&self, context: &SyncContext) -> Result<(), NotesyncError>;
}

/// Persists the context as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonContextStore {
    path: PathBuf,
}

impl JsonContextStore {
    pub fn new(path: impl Into<PathBuf>) -> JsonContextStore {
        JsonContextStore { path: path.into() }
    }
}

impl ContextStore for JsonContextStore {
    fn load(&self) -> Result<Option<SyncContext>, NotesyncError> {
        if !self.path.exists() {
            tracing::debug!("No sync context at {:?}", &self.path);
            return Ok(None);
        }
        let content = read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, context: &SyncContext) -> Result<(), NotesyncError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write(&self.path, serde_json::to_string_pretty(context)?)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryContextStore {
    saved: Mutex<Option<SyncContext>>,
}

impl MemoryContextStore {
    pub fn new() -> MemoryContextStore {
        MemoryContextStore::default()
    }

    pub fn with_context(context: SyncContext) -> MemoryContextStore {
        MemoryContextStore {
            saved: Mutex::new(Some(context)),
        }
    }

    pub fn saved(&self) -> Option<SyncContext> {
        self.saved.lock().clone()
    }
}

impl ContextStore for MemoryContextStore {
    fn load(&self) -> Result<Option<SyncContext>, NotesyncError> {
        Ok(self.saved())
    }

    fn save(&self, context: &SyncContext) -> Result<(), NotesyncError> {
        *self.saved.lock() = Some(context.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_sets_are_disjoint() {
        let mut pending = PendingChanges::default();
        pending.mark_upsert(NoteId::from("1"));
        pending.mark_delete(NoteId::from("1"));
        assert!(pending.upsert.is_empty());
        assert!(pending.delete.contains("1"));
        pending.mark_upsert(NoteId::from("1"));
        assert!(pending.delete.is_empty());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_session_needs_token_and_repo() {
        let mut context = SyncContext {
            repo_owner: Some("me".to_string()),
            repo_name: Some("notes".to_string()),
            ..Default::default()
        };
        assert!(context.session().is_none());
        context.auth_token = Some("t".to_string());
        assert_eq!(context.session().unwrap().repo, RepoRef::new("me", "notes"));
    }

    #[test]
    fn test_json_context_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonContextStore::new(dir.path().join("state/context.json"));
        assert_eq!(store.load().unwrap(), None);

        let mut context = SyncContext {
            auth_token: Some("t".to_string()),
            remote_version: Some("abc".to_string()),
            last_error: Some(NotesyncError::Timeout(30)),
            ..Default::default()
        };
        context.graph.upsert(NoteId::from("1"), "#tag [[2]]");
        context.graph.upsert(NoteId::from("2"), "target");
        context.pending.mark_upsert(NoteId::from("1"));
        context
            .file_versions
            .insert(NoteId::from("2"), "v2".to_string());
        store.save(&context).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, context);
        assert_eq!(loaded.graph.note("2").unwrap().backlinks.len(), 1);
    }
}
