//! The sync state machine.
//!
//! ```text
//! LoadingContext ──► PullingNotes ⇄ Idle ⇄ PushingNotes
//! ```
//!
//! The engine itself never awaits. Transitions that need the remote store hand back a job
//! ([`PullJob`], [`PushJob`]) holding everything the remote calls need; the caller runs it
//! wherever it likes and feeds the outcome back through [`SyncEngine::finish_pull`] or
//! [`SyncEngine::finish_push`]. Edits keep landing in the graph and the pending set while a job
//! is out, which is what lets [`SyncService`](crate::sync::SyncService) stay responsive.

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::SyncConfig,
    error::NotesyncError,
    event::{Event, EventOrigin, SyncEvent},
    graph::NoteGraph,
    note::NoteId,
    sync::{
        context::{ContextStore, PendingChanges, SyncContext},
        store::{NoteStore, RemoteFile, RepoRef, Session},
    },
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    #[default]
    LoadingContext,
    PullingNotes,
    Idle,
    PushingNotes,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::LoadingContext => write!(f, "loadingContext"),
            SyncState::PullingNotes => write!(f, "pullingNotes"),
            SyncState::Idle => write!(f, "idle"),
            SyncState::PushingNotes => write!(f, "pushingNotes"),
        }
    }
}

/// Runs `call`, failing with [`NotesyncError::Timeout`] once `limit` has passed.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, NotesyncError>
where
    F: Future<Output = Result<T, NotesyncError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(NotesyncError::Timeout(limit.as_secs())),
    }
}

/// A point-in-time summary of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub online: bool,
    pub signed_in: bool,
    pub repo: Option<RepoRef>,
    pub remote_version: Option<String>,
    pub pending: PendingChanges,
    pub last_error: Option<NotesyncError>,
    pub notes: usize,
}

pub enum PullOutcome {
    /// The remote version matches the last one seen.
    Unchanged,
    Changed {
        version: String,
        graph: NoteGraph,
        file_versions: BTreeMap<NoteId, String>,
    },
}

/// The remote half of a pull.
pub struct PullJob {
    store: Arc<dyn NoteStore>,
    session: Session,
    known_version: Option<String>,
    timeout: Duration,
}

impl PullJob {
    /// Checks the remote version and, if it moved, fetches every note and rebuilds the graph
    /// on the blocking pool. The listing and each file read get their own timeout.
    #[tracing::instrument(skip_all, fields(repo = %self.session.repo))]
    pub async fn run(self) -> Result<PullOutcome, NotesyncError> {
        let version = with_timeout(self.timeout, self.store.latest_version(&self.session)).await?;
        if self.known_version.as_deref() == Some(version.as_str()) {
            tracing::debug!("Remote version {version} unchanged");
            return Ok(PullOutcome::Unchanged);
        }
        let entries = with_timeout(self.timeout, self.store.list(&self.session)).await?;
        let mut file_versions = BTreeMap::new();
        let mut corpus = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(id) = NoteId::from_path(&entry.path) else {
                continue;
            };
            let file =
                match with_timeout(self.timeout, self.store.read(&self.session, &entry.path)).await
                {
                    Ok(file) => file,
                    Err(NotesyncError::NotFound(_)) => {
                        tracing::debug!("{} was removed while pulling", entry.path);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
            file_versions.insert(id.clone(), file.version);
            corpus.push((id, file.content));
        }
        tracing::info!("Pulled {} notes at version {version}", corpus.len());
        let graph = tokio::task::spawn_blocking(move || NoteGraph::from_corpus(corpus)).await?;
        Ok(PullOutcome::Changed {
            version,
            graph,
            file_versions,
        })
    }
}

struct NoteWrite {
    id: NoteId,
    body: String,
    expected: Option<String>,
}

struct NoteRemoval {
    id: NoteId,
    expected: Option<String>,
}

#[derive(Debug, Default)]
pub struct PushOutcome {
    /// Written ids with their new blob versions.
    pub written: Vec<(NoteId, String)>,
    pub deleted: Vec<NoteId>,
    /// The first failure. Later writes are still attempted.
    pub error: Option<NotesyncError>,
    /// Remote version re-read after a fully successful batch.
    pub version: Option<String>,
}

/// The remote half of a push: a snapshot of the pending changes at the moment it began.
pub struct PushJob {
    store: Arc<dyn NoteStore>,
    session: Session,
    timeout: Duration,
    writes: Vec<NoteWrite>,
    removals: Vec<NoteRemoval>,
}

impl PushJob {
    #[tracing::instrument(skip_all, fields(repo = %self.session.repo))]
    pub async fn run(self) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        for write in &self.writes {
            let path = write.id.path();
            let call = self.store.write(
                &self.session,
                &path,
                &write.body,
                write.expected.as_deref(),
            );
            match with_timeout(self.timeout, call).await {
                Ok(version) => outcome.written.push((write.id.clone(), version)),
                Err(e) => {
                    tracing::warn!("Writing note {} failed: {e}", write.id);
                    outcome.error.get_or_insert(e);
                }
            }
        }
        for removal in &self.removals {
            let path = removal.id.path();
            let call = self
                .store
                .delete(&self.session, &path, removal.expected.as_deref());
            match with_timeout(self.timeout, call).await {
                Ok(()) => outcome.deleted.push(removal.id.clone()),
                Err(NotesyncError::NotFound(_)) => {
                    tracing::debug!("Note {} was never pushed or is already gone", removal.id);
                    outcome.deleted.push(removal.id.clone());
                }
                Err(e) => {
                    tracing::warn!("Deleting note {} failed: {e}", removal.id);
                    outcome.error.get_or_insert(e);
                }
            }
        }
        if outcome.error.is_none() {
            match with_timeout(self.timeout, self.store.latest_version(&self.session)).await {
                Ok(version) => outcome.version = Some(version),
                Err(e) => outcome.error = Some(e),
            }
        }
        outcome
    }
}

/// A single file read, for embeds and uploads.
pub struct ReadJob {
    store: Arc<dyn NoteStore>,
    session: Session,
    timeout: Duration,
    path: String,
}

impl ReadJob {
    pub async fn run(self) -> Result<RemoteFile, NotesyncError> {
        with_timeout(self.timeout, self.store.read(&self.session, &self.path)).await
    }
}

pub struct SyncEngine {
    state: SyncState,
    context: SyncContext,
    config: SyncConfig,
    online: bool,
    store: Arc<dyn NoteStore>,
    persistence: Arc<dyn ContextStore>,
    /// Pending changes as they stood when the in-flight push began.
    in_flight: Option<PendingChanges>,
    /// Ids edited while a push is in flight.
    touched: BTreeSet<NoteId>,
    events: Option<UnboundedSender<Event>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn NoteStore>,
        persistence: Arc<dyn ContextStore>,
        config: SyncConfig,
    ) -> SyncEngine {
        SyncEngine {
            state: SyncState::LoadingContext,
            context: SyncContext::default(),
            online: config.online,
            config,
            store,
            persistence,
            in_flight: None,
            touched: BTreeSet::new(),
            events: None,
        }
    }

    /// Streams [`SyncEvent`]s to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<Event>) -> SyncEngine {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    pub fn graph(&self) -> &NoteGraph {
        &self.context.graph
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.context.pending
    }

    pub fn last_error(&self) -> Option<&NotesyncError> {
        self.context.last_error.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state,
            online: self.online,
            signed_in: self.context.auth_token.is_some(),
            repo: self.context.repo(),
            remote_version: self.context.remote_version.clone(),
            pending: self.context.pending.clone(),
            last_error: self.context.last_error.clone(),
            notes: self.context.graph.len(),
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.send(event.into()) {
                tracing::debug!("Sync event dropped, no subscriber: {:?}", e.0);
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.context) {
            tracing::warn!("Could not persist the sync context: {e}");
        }
    }

    fn transition(&mut self, state: SyncState) {
        if self.state != state {
            tracing::debug!("Sync state {} -> {}", self.state, state);
            self.state = state;
            self.emit(SyncEvent::StateChanged(state));
        }
    }

    /// Settles into `state` and persists the context.
    fn settle(&mut self, state: SyncState) {
        self.transition(state);
        self.persist();
    }

    fn remote_session(&self) -> Option<Session> {
        if !self.online {
            return None;
        }
        self.context.session()
    }

    fn ensure_loaded(&self) -> Result<(), NotesyncError> {
        match self.state {
            SyncState::LoadingContext => Err(NotesyncError::Command(
                "the sync context is still loading".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Credentials and repository from the config take precedence over persisted ones.
    fn apply_config(&mut self) {
        if let Some(token) = &self.config.auth_token {
            self.context.auth_token = Some(token.clone());
        }
        if let (Some(owner), Some(name)) = (&self.config.repo_owner, &self.config.repo_name) {
            let repo = RepoRef::new(owner.as_str(), name.as_str());
            self.switch_repo(repo);
        }
    }

    fn switch_repo(&mut self, repo: RepoRef) {
        match self.context.repo() {
            Some(current) if current == repo => return,
            Some(current) => {
                if !self.context.pending.is_empty() {
                    tracing::warn!(
                        "Switching from {current} to {repo} discards {} unsynced change(s)",
                        self.context.pending.len()
                    );
                }
                self.context.reset_remote();
            }
            None => {}
        }
        self.context.repo_owner = Some(repo.owner);
        self.context.repo_name = Some(repo.name);
    }

    /// Reads the persisted context and starts the initial pull.
    pub fn load_context(&mut self) -> Option<PullJob> {
        if self.state != SyncState::LoadingContext {
            tracing::debug!("Context already loaded");
            return None;
        }
        match self.persistence.load() {
            Ok(loaded) => {
                self.context = loaded.unwrap_or_default();
                self.apply_config();
                tracing::info!(
                    "Loaded sync context: {} notes, {} pending change(s)",
                    self.context.graph.len(),
                    self.context.pending.len()
                );
                self.transition(SyncState::PullingNotes);
                self.start_pull()
            }
            Err(e) => {
                tracing::warn!("Could not load the sync context, starting empty: {e}");
                self.context = SyncContext {
                    last_error: Some(e),
                    ..Default::default()
                };
                self.apply_config();
                self.settle(SyncState::Idle);
                None
            }
        }
    }

    /// Starts a pull. Only from `Idle`.
    pub fn begin_pull(&mut self) -> Option<PullJob> {
        if self.state != SyncState::Idle {
            tracing::debug!("Not pulling while {}", self.state);
            return None;
        }
        self.transition(SyncState::PullingNotes);
        self.start_pull()
    }

    fn start_pull(&mut self) -> Option<PullJob> {
        let Some(session) = self.remote_session() else {
            tracing::debug!("Skipping pull: offline, signed out or no repository selected");
            self.settle(SyncState::Idle);
            return None;
        };
        Some(PullJob {
            store: self.store.clone(),
            session,
            known_version: self.context.remote_version.clone(),
            timeout: self.config.timeout(),
        })
    }

    /// Applies a pull result. Pending local changes are re-applied on top of a changed
    /// remote, and a push is returned if any remain.
    pub fn finish_pull(&mut self, result: Result<PullOutcome, NotesyncError>) -> Option<PushJob> {
        if self.state != SyncState::PullingNotes {
            tracing::warn!("Pull result arrived while {}, ignoring it", self.state);
            return None;
        }
        match result {
            Ok(PullOutcome::Unchanged) => {
                self.context.last_error = None;
            }
            Ok(PullOutcome::Changed {
                version,
                graph,
                file_versions,
            }) => {
                let local = std::mem::replace(&mut self.context.graph, graph);
                for id in &self.context.pending.upsert {
                    if let Some(note) = local.note(id.as_str()) {
                        self.context.graph.upsert(id.clone(), note.raw_body.clone());
                    }
                }
                let deletes: Vec<NoteId> = self.context.pending.delete.iter().cloned().collect();
                for id in deletes {
                    match self.context.graph.delete(id.as_str()) {
                        Ok(_) | Err(NotesyncError::NotFound(_)) => {}
                        Err(e) => {
                            tracing::warn!("Keeping note {id}, the remote links to it: {e}");
                            self.context.pending.delete.remove(&id);
                        }
                    }
                }
                self.context.remote_version = Some(version.clone());
                self.context.file_versions = file_versions;
                self.context.last_error = None;
                self.emit(SyncEvent::GraphRebuilt(
                    self.context.graph.len(),
                    Some(version),
                ));
            }
            Err(e) => {
                tracing::warn!("Pull failed: {e}");
                self.context.last_error = Some(e.clone());
                self.emit(SyncEvent::Failed(e));
                self.settle(SyncState::Idle);
                return None;
            }
        }
        self.settle(SyncState::Idle);
        self.begin_push()
    }

    /// Creates or replaces a note and marks it pending. Returns a push when the engine was idle.
    pub fn upsert_note(
        &mut self,
        id: NoteId,
        body: impl Into<String>,
    ) -> Result<Option<PushJob>, NotesyncError> {
        self.ensure_loaded()?;
        self.context.graph.upsert(id.clone(), body);
        self.context.pending.mark_upsert(id.clone());
        if self.in_flight.is_some() {
            self.touched.insert(id.clone());
        }
        self.emit(SyncEvent::NoteUpdated(id, EventOrigin::Local));
        self.persist();
        Ok(self.begin_push())
    }

    /// Deletes a note and marks it pending. Refused while other notes link to it.
    pub fn delete_note(&mut self, id: &str) -> Result<Option<PushJob>, NotesyncError> {
        self.ensure_loaded()?;
        let removed = self.context.graph.delete(id)?;
        self.context.pending.mark_delete(removed.id.clone());
        if self.in_flight.is_some() {
            self.touched.insert(removed.id.clone());
        }
        self.emit(SyncEvent::NoteRemoved(removed.id, EventOrigin::Local));
        self.persist();
        Ok(self.begin_push())
    }

    /// Starts a push of everything pending. Only from `Idle`; offline or signed out it settles
    /// straight back, leaving the changes pending.
    pub fn begin_push(&mut self) -> Option<PushJob> {
        if self.state != SyncState::Idle || self.context.pending.is_empty() {
            return None;
        }
        self.transition(SyncState::PushingNotes);
        let Some(session) = self.remote_session() else {
            tracing::debug!(
                "Deferring {} change(s): offline, signed out or no repository selected",
                self.context.pending.len()
            );
            self.settle(SyncState::Idle);
            return None;
        };

        let snapshot = self.context.pending.clone();
        let writes = snapshot
            .upsert
            .iter()
            .filter_map(|id| {
                let note = self.context.graph.note(id.as_str())?;
                Some(NoteWrite {
                    id: id.clone(),
                    body: note.raw_body.clone(),
                    expected: self.context.file_versions.get(id).cloned(),
                })
            })
            .collect();
        let removals = snapshot
            .delete
            .iter()
            .map(|id| NoteRemoval {
                id: id.clone(),
                expected: self.context.file_versions.get(id).cloned(),
            })
            .collect();
        self.in_flight = Some(snapshot);
        self.touched.clear();
        Some(PushJob {
            store: self.store.clone(),
            session,
            timeout: self.config.timeout(),
            writes,
            removals,
        })
    }

    /// Applies a push outcome. Returns a follow-up push when edits arrived while it was out.
    pub fn finish_push(&mut self, outcome: PushOutcome) -> Option<PushJob> {
        let Some(snapshot) = self.in_flight.take() else {
            tracing::warn!("Push result arrived with no push in flight, ignoring it");
            return None;
        };
        let written: Vec<NoteId> = outcome.written.iter().map(|(id, _)| id.clone()).collect();
        for (id, version) in outcome.written {
            self.context.file_versions.insert(id, version);
        }
        for id in &outcome.deleted {
            self.context.file_versions.remove(id);
        }
        match outcome.error {
            None => {
                for id in snapshot.upsert.difference(&self.touched) {
                    self.context.pending.upsert.remove(id);
                }
                for id in snapshot.delete.difference(&self.touched) {
                    self.context.pending.delete.remove(id);
                }
                self.context.last_error = None;
                if let Some(version) = &outcome.version {
                    self.context.remote_version = Some(version.clone());
                }
                tracing::info!(
                    "Pushed {} write(s) and {} delete(s)",
                    written.len(),
                    outcome.deleted.len()
                );
                self.emit(SyncEvent::Pushed(written, outcome.deleted, outcome.version));
            }
            Some(e) => {
                tracing::warn!("Push failed, keeping {} pending change(s): {e}", snapshot.len());
                self.context.last_error = Some(e.clone());
                self.emit(SyncEvent::Failed(e));
            }
        }
        let follow_up = !self.touched.is_empty();
        self.touched.clear();
        self.settle(SyncState::Idle);
        if follow_up {
            self.begin_push()
        } else {
            None
        }
    }

    /// Settles a pull or push whose task died without an outcome. Pending changes are kept.
    pub fn abort(&mut self, error: NotesyncError) {
        tracing::error!("Sync {} aborted: {error}", self.state);
        self.in_flight = None;
        self.touched.clear();
        self.context.last_error = Some(error.clone());
        self.emit(SyncEvent::Failed(error));
        self.settle(SyncState::Idle);
    }

    pub fn sign_in(&mut self, token: impl Into<String>) -> Option<PullJob> {
        self.context.auth_token = Some(token.into());
        self.persist();
        self.begin_pull()
    }

    pub fn sign_out(&mut self) {
        self.context.auth_token = None;
        self.persist();
    }

    /// Points the engine at another repository, forgetting everything pulled from the old one.
    pub fn select_repo(&mut self, repo: RepoRef) -> Result<Option<PullJob>, NotesyncError> {
        if self.state != SyncState::Idle {
            return Err(NotesyncError::Command(format!(
                "cannot switch repository while {}",
                self.state
            )));
        }
        self.switch_repo(repo);
        self.persist();
        Ok(self.begin_pull())
    }

    /// Going online starts a pull, which pushes anything pending once it settles.
    pub fn set_online(&mut self, online: bool) -> Option<PullJob> {
        self.online = online;
        if online {
            self.begin_pull()
        } else {
            None
        }
    }

    /// A job reading `path` from the remote, if the remote is reachable.
    pub fn read_job(&self, path: impl Into<String>) -> Option<ReadJob> {
        Some(ReadJob {
            store: self.store.clone(),
            session: self.remote_session()?,
            timeout: self.config.timeout(),
            path: path.into(),
        })
    }
}
