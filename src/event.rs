use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{error::NotesyncError, note::NoteId, sync::SyncState};

/// Indicates where a note change came from, so subscribers can tell echoes of their own edits
/// apart from changes pulled from the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventOrigin {
    /// The change was made through this engine and is already applied to its graph.
    Local,

    /// The change arrived from the remote note store during a pull.
    #[default]
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// The engine settled into a new state.
    StateChanged(SyncState),
    NoteUpdated(NoteId, EventOrigin),
    NoteRemoved(NoteId, EventOrigin),
    /// A pull replaced the graph. Note count, new remote version.
    GraphRebuilt(usize, Option<String>),
    /// A push settled. Written ids, deleted ids, new remote version.
    Pushed(Vec<NoteId>, Vec<NoteId>, Option<String>),
    /// A pull or push failed. The error is also recorded as the context's last error.
    Failed(NotesyncError),
}

impl SyncEvent {
    /// Returns the EventOrigin of this event, or None for events not about a single note
    pub fn origin(&self) -> Option<EventOrigin> {
        match self {
            SyncEvent::NoteUpdated(_, origin) => Some(*origin),
            SyncEvent::NoteRemoved(_, origin) => Some(*origin),
            SyncEvent::StateChanged(_)
            | SyncEvent::GraphRebuilt(_, _)
            | SyncEvent::Pushed(_, _, _)
            | SyncEvent::Failed(_) => None,
        }
    }

    /// Returns a new event with the specified origin
    pub fn with_origin(self, new_origin: EventOrigin) -> Self {
        match self {
            SyncEvent::NoteUpdated(id, _) => SyncEvent::NoteUpdated(id, new_origin),
            SyncEvent::NoteRemoved(id, _) => SyncEvent::NoteRemoved(id, new_origin),
            other => other,
        }
    }
}

impl Display for SyncEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SyncEvent::StateChanged(state) => write!(f, "StateChanged({state})"),
            SyncEvent::NoteUpdated(id, _) => write!(f, "NoteUpdated({id})"),
            SyncEvent::NoteRemoved(id, _) => write!(f, "NoteRemoved({id})"),
            SyncEvent::GraphRebuilt(_, _) => write!(f, "GraphRebuilt"),
            SyncEvent::Pushed(_, _, _) => write!(f, "Pushed"),
            SyncEvent::Failed(_) => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    #[default]
    Ping,
    Sync(SyncEvent),
}

impl From<SyncEvent> for Event {
    fn from(event: SyncEvent) -> Self {
        Event::Sync(event)
    }
}
