//! The remote note store seam and its local implementations.
//!
//! A store is a key-addressed blob store with version tokens. Every write and delete names the
//! version the caller last saw; a mismatch is a [`NotesyncError::Conflict`] and nothing is
//! changed.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use crate::{error::NotesyncError, note::NoteId};

/// A repository in a note store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> RepoRef {
        RepoRef {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Credentials and target of every store call.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub auth_token: String,
    pub repo: RepoRef,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("auth_token", &"<redacted>")
            .field("repo", &self.repo)
            .finish()
    }
}

/// A file as read from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
    pub version: String,
}

/// A file as listed by a store, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub path: String,
    pub version: String,
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// A token that changes whenever any file in the repository changes.
    async fn latest_version(&self, session: &Session) -> Result<String, NotesyncError>;

    /// Every note file (`<id>.md`) with its version, in path order. Contents are fetched
    /// with [`NoteStore::read`].
    async fn list(&self, session: &Session) -> Result<Vec<RemoteEntry>, NotesyncError>;

    async fn read(&self, session: &Session, path: &str) -> Result<RemoteFile, NotesyncError>;

    /// Writes `content` to `path` and returns the new version. `expected` is `None` for a file
    /// that must not exist yet.
    async fn write(
        &self,
        session: &Session,
        path: &str,
        content: &str,
        expected: Option<&str>,
    ) -> Result<String, NotesyncError>;

    async fn delete(
        &self,
        session: &Session,
        path: &str,
        expected: Option<&str>,
    ) -> Result<(), NotesyncError>;
}

/// Content version of a single blob: hex SHA-256 of its bytes.
pub fn blob_version(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Version of a whole collection, from its `(path, blob version)` pairs in path order.
pub fn collection_version<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = Sha256::new();
    for (path, version) in files {
        hasher.update(path.as_bytes());
        hasher.update([0]);
        hasher.update(version.as_bytes());
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

fn check_expected(
    path: &str,
    expected: Option<&str>,
    actual: Option<&str>,
) -> Result<(), NotesyncError> {
    if expected == actual {
        Ok(())
    } else {
        Err(NotesyncError::Conflict {
            path: path.to_string(),
            expected: expected.map(str::to_string),
            actual: actual.map(str::to_string),
        })
    }
}

pub(crate) fn is_note_path(path: &str) -> bool {
    !path.contains('/') && NoteId::from_path(path).is_some()
}

/// A store held in memory, shared by everything holding the same instance.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    repos: RwLock<BTreeMap<RepoRef, BTreeMap<String, String>>>,
    auth_token: Option<String>,
}

impl MemoryNoteStore {
    pub fn new() -> MemoryNoteStore {
        MemoryNoteStore::default()
    }

    /// Rejects sessions that do not carry `token`.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> MemoryNoteStore {
        self.auth_token = Some(token.into());
        self
    }

    /// Puts a file in place without any version check.
    pub fn insert(&self, repo: &RepoRef, path: impl Into<String>, content: impl Into<String>) {
        self.repos
            .write()
            .entry(repo.clone())
            .or_default()
            .insert(path.into(), content.into());
    }

    /// Current contents of `repo`, path to content.
    pub fn files(&self, repo: &RepoRef) -> BTreeMap<String, String> {
        self.repos.read().get(repo).cloned().unwrap_or_default()
    }

    fn authorize(&self, session: &Session) -> Result<(), NotesyncError> {
        match &self.auth_token {
            Some(token) if *token != session.auth_token => Err(NotesyncError::Auth(format!(
                "token rejected for {}",
                session.repo
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn latest_version(&self, session: &Session) -> Result<String, NotesyncError> {
        self.authorize(session)?;
        let repos = self.repos.read();
        let versions: Vec<(&str, String)> = repos
            .get(&session.repo)
            .into_iter()
            .flatten()
            .map(|(path, content)| (path.as_str(), blob_version(content)))
            .collect();
        Ok(collection_version(
            versions.iter().map(|(path, version)| (*path, version.as_str())),
        ))
    }

    async fn list(&self, session: &Session) -> Result<Vec<RemoteEntry>, NotesyncError> {
        self.authorize(session)?;
        Ok(self
            .files(&session.repo)
            .into_iter()
            .filter(|(path, _)| is_note_path(path))
            .map(|(path, content)| RemoteEntry {
                version: blob_version(&content),
                path,
            })
            .collect())
    }

    async fn read(&self, session: &Session, path: &str) -> Result<RemoteFile, NotesyncError> {
        self.authorize(session)?;
        let repos = self.repos.read();
        let content = repos
            .get(&session.repo)
            .and_then(|files| files.get(path))
            .ok_or_else(|| NotesyncError::NotFound(format!("{}: {path}", session.repo)))?;
        Ok(RemoteFile {
            path: path.to_string(),
            content: content.clone(),
            version: blob_version(content),
        })
    }

    async fn write(
        &self,
        session: &Session,
        path: &str,
        content: &str,
        expected: Option<&str>,
    ) -> Result<String, NotesyncError> {
        self.authorize(session)?;
        let mut repos = self.repos.write();
        let files = repos.entry(session.repo.clone()).or_default();
        let actual = files.get(path).map(|current| blob_version(current));
        check_expected(path, expected, actual.as_deref())?;
        files.insert(path.to_string(), content.to_string());
        Ok(blob_version(content))
    }

    async fn delete(
        &self,
        session: &Session,
        path: &str,
        expected: Option<&str>,
    ) -> Result<(), NotesyncError> {
        self.authorize(session)?;
        let mut repos = self.repos.write();
        let files = repos.entry(session.repo.clone()).or_default();
        let Some(current) = files.get(path) else {
            return Err(NotesyncError::NotFound(format!("{}: {path}", session.repo)));
        };
        check_expected(path, expected, Some(blob_version(current).as_str()))?;
        files.remove(path);
        Ok(())
    }
}

/// A store backed by a directory: `<root>/<owner>/<name>/<path>`. Sessions are not checked.
#[derive(Debug, Clone)]
pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> FsNoteStore {
        FsNoteStore { root: root.into() }
    }

    fn repo_dir(&self, repo: &RepoRef) -> PathBuf {
        self.root.join(&repo.owner).join(&repo.name)
    }

    fn current_version(file: &Path) -> Result<Option<String>, NotesyncError> {
        match fs::read_to_string(file) {
            Ok(content) => Ok(Some(blob_version(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_files(&self, repo: &RepoRef) -> Result<Vec<RemoteEntry>, NotesyncError> {
        let dir = self.repo_dir(repo);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.file_name().to_string_lossy().to_string();
            if !is_note_path(&path) {
                continue;
            }
            let content = fs::read_to_string(entry.path())?;
            files.push(RemoteEntry {
                version: blob_version(&content),
                path,
            });
        }
        Ok(files)
    }
}

#[async_trait]
impl NoteStore for FsNoteStore {
    async fn latest_version(&self, session: &Session) -> Result<String, NotesyncError> {
        let files = self.list_files(&session.repo)?;
        Ok(collection_version(
            files
                .iter()
                .map(|file| (file.path.as_str(), file.version.as_str())),
        ))
    }

    async fn list(&self, session: &Session) -> Result<Vec<RemoteEntry>, NotesyncError> {
        self.list_files(&session.repo)
    }

    async fn read(&self, session: &Session, path: &str) -> Result<RemoteFile, NotesyncError> {
        let content = fs::read_to_string(self.repo_dir(&session.repo).join(path))?;
        Ok(RemoteFile {
            path: path.to_string(),
            version: blob_version(&content),
            content,
        })
    }

    async fn write(
        &self,
        session: &Session,
        path: &str,
        content: &str,
        expected: Option<&str>,
    ) -> Result<String, NotesyncError> {
        let dir = self.repo_dir(&session.repo);
        let file = dir.join(path);
        check_expected(path, expected, Self::current_version(&file)?.as_deref())?;
        fs::create_dir_all(&dir)?;
        fs::write(&file, content)?;
        tracing::debug!("Wrote {:?}", file);
        Ok(blob_version(content))
    }

    async fn delete(
        &self,
        session: &Session,
        path: &str,
        expected: Option<&str>,
    ) -> Result<(), NotesyncError> {
        let file = self.repo_dir(&session.repo).join(path);
        let Some(actual) = Self::current_version(&file)? else {
            return Err(NotesyncError::NotFound(format!("{}: {path}", session.repo)));
        };
        check_expected(path, expected, Some(actual.as_str()))?;
        fs::remove_file(&file)?;
        tracing::debug!("Removed {:?}", file);
        Ok(())
    }
}
