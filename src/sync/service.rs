//! The actor that owns a [`SyncEngine`] and runs its remote jobs.
//!
//! Hosts talk to it through a cloneable [`SyncHandle`]: every request carries a oneshot
//! reply. The actor handles requests between job completions, so edits are applied while a
//! pull or push is in flight, and it starts follow-up pushes on its own.

use parking_lot::Mutex;
use std::{fmt, sync::Arc};
use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinError, JoinHandle, JoinSet},
};

use crate::{
    error::NotesyncError,
    note::NoteId,
    sync::{
        cache::FileCache,
        context::SyncContext,
        engine::{PullJob, PullOutcome, PushJob, PushOutcome, SyncEngine, SyncState, SyncStatus},
        store::{RemoteFile, RepoRef},
    },
};

const REQUEST_BUFFER: usize = 64;

/// What a host can ask of the sync service.
#[derive(Clone, PartialEq, Eq)]
pub enum SyncIntent {
    SignIn(String),
    SignOut,
    SelectRepo(RepoRef),
    SetOnline(bool),
    /// Pull now.
    SyncNotes,
    /// Read a file from the remote through the file cache.
    ReadFile(String),
    UpsertNote(NoteId, String),
    DeleteNote(NoteId),
    Status,
    Context,
    /// Resolves once the engine is idle with no job in flight.
    Settled,
}

impl fmt::Debug for SyncIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIntent::SignIn(_) => write!(f, "SignIn(<redacted>)"),
            SyncIntent::SignOut => write!(f, "SignOut"),
            SyncIntent::SelectRepo(repo) => write!(f, "SelectRepo({repo})"),
            SyncIntent::SetOnline(online) => write!(f, "SetOnline({online})"),
            SyncIntent::SyncNotes => write!(f, "SyncNotes"),
            SyncIntent::ReadFile(path) => write!(f, "ReadFile({path})"),
            SyncIntent::UpsertNote(id, body) => write!(f, "UpsertNote({id}, {} bytes)", body.len()),
            SyncIntent::DeleteNote(id) => write!(f, "DeleteNote({id})"),
            SyncIntent::Status => write!(f, "Status"),
            SyncIntent::Context => write!(f, "Context"),
            SyncIntent::Settled => write!(f, "Settled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncReply {
    Done,
    File(RemoteFile),
    Status(SyncStatus),
    Context(Box<SyncContext>),
}

type Reply = oneshot::Sender<Result<SyncReply, NotesyncError>>;

struct Request {
    intent: SyncIntent,
    reply: Reply,
}

enum JobResult {
    Pull(Result<PullOutcome, NotesyncError>),
    Push(PushOutcome),
}

fn respond(reply: Reply, result: Result<SyncReply, NotesyncError>) {
    if reply.send(result).is_err() {
        tracing::debug!("Requester went away before the reply");
    }
}

pub struct SyncService {
    engine: SyncEngine,
    requests: mpsc::Receiver<Request>,
    jobs: JoinSet<JobResult>,
    cache: Arc<Mutex<FileCache>>,
    settled_waiters: Vec<Reply>,
}

impl SyncService {
    /// Spawns the service on the current tokio runtime. It stops once every handle is dropped
    /// and the job in flight has settled.
    pub fn spawn(engine: SyncEngine) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let service = SyncService {
            engine,
            requests: rx,
            jobs: JoinSet::new(),
            cache: Arc::new(Mutex::new(FileCache::new())),
            settled_waiters: Vec::new(),
        };
        let task = tokio::spawn(service.run());
        (SyncHandle { requests: tx }, task)
    }

    async fn run(mut self) {
        let pull = self.engine.load_context();
        self.start_pull(pull);
        self.after_change();
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
                Some(joined) = self.jobs.join_next() => self.finish(joined),
            }
        }
        while let Some(joined) = self.jobs.join_next().await {
            self.finish(joined);
        }
        tracing::debug!("Sync service stopped");
    }

    fn start_pull(&mut self, job: Option<PullJob>) {
        if let Some(job) = job {
            self.jobs.spawn(async move { JobResult::Pull(job.run().await) });
        }
    }

    fn start_push(&mut self, job: Option<PushJob>) {
        if let Some(job) = job {
            self.jobs.spawn(async move { JobResult::Push(job.run().await) });
        }
    }

    fn is_settled(&self) -> bool {
        self.jobs.is_empty() && self.engine.state() == SyncState::Idle
    }

    /// Keeps the file cache on the current repository and version, and wakes settle waiters.
    fn after_change(&mut self) {
        let context = self.engine.context();
        self.cache
            .lock()
            .sync_to(context.repo().as_ref(), context.remote_version.as_deref());
        if self.is_settled() {
            for waiter in self.settled_waiters.drain(..) {
                respond(waiter, Ok(SyncReply::Done));
            }
        }
    }

    fn finish(&mut self, joined: Result<JobResult, JoinError>) {
        match joined {
            Ok(JobResult::Pull(result)) => {
                let push = self.engine.finish_pull(result);
                self.start_push(push);
            }
            Ok(JobResult::Push(outcome)) => {
                let push = self.engine.finish_push(outcome);
                self.start_push(push);
            }
            Err(e) => self.engine.abort(e.into()),
        }
        self.after_change();
    }

    fn handle(&mut self, request: Request) {
        let Request { intent, reply } = request;
        tracing::debug!("Handling {intent:?}");
        let result = match intent {
            SyncIntent::SignIn(token) => {
                let pull = self.engine.sign_in(token);
                self.start_pull(pull);
                Ok(SyncReply::Done)
            }
            SyncIntent::SignOut => {
                self.engine.sign_out();
                Ok(SyncReply::Done)
            }
            SyncIntent::SelectRepo(repo) => match self.engine.select_repo(repo) {
                Ok(pull) => {
                    self.start_pull(pull);
                    Ok(SyncReply::Done)
                }
                Err(e) => Err(e),
            },
            SyncIntent::SetOnline(online) => {
                let pull = self.engine.set_online(online);
                self.start_pull(pull);
                Ok(SyncReply::Done)
            }
            SyncIntent::SyncNotes => {
                let pull = self.engine.begin_pull();
                self.start_pull(pull);
                Ok(SyncReply::Done)
            }
            SyncIntent::UpsertNote(id, body) => match self.engine.upsert_note(id, body) {
                Ok(push) => {
                    self.start_push(push);
                    Ok(SyncReply::Done)
                }
                Err(e) => Err(e),
            },
            SyncIntent::DeleteNote(id) => match self.engine.delete_note(id.as_str()) {
                Ok(push) => {
                    self.start_push(push);
                    Ok(SyncReply::Done)
                }
                Err(e) => Err(e),
            },
            SyncIntent::Status => Ok(SyncReply::Status(self.engine.status())),
            SyncIntent::Context => Ok(SyncReply::Context(Box::new(self.engine.context().clone()))),
            SyncIntent::ReadFile(path) => {
                self.read_file(path, reply);
                return;
            }
            SyncIntent::Settled => {
                if !self.is_settled() {
                    self.settled_waiters.push(reply);
                    return;
                }
                Ok(SyncReply::Done)
            }
        };
        respond(reply, result);
        self.after_change();
    }

    fn read_file(&mut self, path: String, reply: Reply) {
        let generation = {
            let cache = self.cache.lock();
            if let Some(file) = cache.get(&path) {
                tracing::trace!("File cache hit for {path}");
                respond(reply, Ok(SyncReply::File(file.clone())));
                return;
            }
            cache.generation()
        };
        let Some(job) = self.engine.read_job(path) else {
            respond(
                reply,
                Err(NotesyncError::Command(
                    "remote files cannot be read while offline or signed out".to_string(),
                )),
            );
            return;
        };
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let result = job.run().await;
            if let Ok(file) = &result {
                cache.lock().insert(generation, file.clone());
            }
            respond(reply, result.map(SyncReply::File));
        });
    }
}

/// A cloneable handle to a running [`SyncService`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    requests: mpsc::Sender<Request>,
}

fn unexpected(reply: SyncReply) -> NotesyncError {
    NotesyncError::Custom(format!("unexpected reply from the sync service: {reply:?}"))
}

impl SyncHandle {
    pub async fn request(&self, intent: SyncIntent) -> Result<SyncReply, NotesyncError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { intent, reply })
            .await
            .map_err(|_| NotesyncError::Command("the sync service has stopped".to_string()))?;
        response.await.map_err(|_| {
            NotesyncError::Command("the sync service dropped the request".to_string())
        })?
    }

    async fn done(&self, intent: SyncIntent) -> Result<(), NotesyncError> {
        match self.request(intent).await? {
            SyncReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn sign_in(&self, token: impl Into<String>) -> Result<(), NotesyncError> {
        self.done(SyncIntent::SignIn(token.into())).await
    }

    pub async fn sign_out(&self) -> Result<(), NotesyncError> {
        self.done(SyncIntent::SignOut).await
    }

    pub async fn select_repo(&self, repo: RepoRef) -> Result<(), NotesyncError> {
        self.done(SyncIntent::SelectRepo(repo)).await
    }

    pub async fn set_online(&self, online: bool) -> Result<(), NotesyncError> {
        self.done(SyncIntent::SetOnline(online)).await
    }

    pub async fn sync_notes(&self) -> Result<(), NotesyncError> {
        self.done(SyncIntent::SyncNotes).await
    }

    pub async fn upsert_note(
        &self,
        id: impl Into<NoteId>,
        body: impl Into<String>,
    ) -> Result<(), NotesyncError> {
        self.done(SyncIntent::UpsertNote(id.into(), body.into()))
            .await
    }

    pub async fn delete_note(&self, id: impl Into<NoteId>) -> Result<(), NotesyncError> {
        self.done(SyncIntent::DeleteNote(id.into())).await
    }

    pub async fn read_file(&self, path: impl Into<String>) -> Result<RemoteFile, NotesyncError> {
        match self.request(SyncIntent::ReadFile(path.into())).await? {
            SyncReply::File(file) => Ok(file),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<SyncStatus, NotesyncError> {
        match self.request(SyncIntent::Status).await? {
            SyncReply::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn context(&self) -> Result<SyncContext, NotesyncError> {
        match self.request(SyncIntent::Context).await? {
            SyncReply::Context(context) => Ok(*context),
            other => Err(unexpected(other)),
        }
    }

    /// Waits until no pull or push is in flight or queued.
    pub async fn settled(&self) -> Result<(), NotesyncError> {
        self.done(SyncIntent::Settled).await
    }
}
