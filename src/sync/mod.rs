//! Reconciling the local note graph with a remote note store.
//!
//! ## Key Components
//!
//! - [`store`] - The [`NoteStore`] seam plus in-memory and directory-backed stores
//! - [`context`] - [`SyncContext`], the state persisted between runs, and its [`ContextStore`]s
//! - [`engine`] - The [`SyncEngine`] state machine and the remote jobs it hands out
//! - [`service`] - [`SyncService`], an actor running the engine and its jobs on tokio
//! - [`cache`] - [`FileCache`] for remote file reads
//!
//! Local edits always land in the graph and the pending set immediately. The network is a
//! background concern: failures are recorded as the context's `last_error`, nothing pending is
//! ever dropped, and the next push retries.

pub mod cache;
pub mod context;
pub mod engine;
#[cfg(feature = "github")]
pub mod github;
pub mod service;
pub mod store;

pub use cache::FileCache;
pub use context::{ContextStore, JsonContextStore, MemoryContextStore, PendingChanges, SyncContext};
pub use engine::{
    PullJob, PullOutcome, PushJob, PushOutcome, ReadJob, SyncEngine, SyncState, SyncStatus,
};
#[cfg(feature = "github")]
pub use github::GitHubNoteStore;
pub use service::{SyncHandle, SyncIntent, SyncReply, SyncService};
pub use store::{
    FsNoteStore, MemoryNoteStore, NoteStore, RemoteEntry, RemoteFile, RepoRef, Session,
};
