use std::collections::BTreeMap;

use crate::sync::store::{RemoteFile, RepoRef};

/// Files read from the remote store, valid for one repository at one remote version.
///
/// Reads run concurrently with pulls, so an insert carries the generation it was started
/// under and is dropped if the cache was cleared in the meantime.
#[derive(Debug, Default)]
pub struct FileCache {
    repo: Option<RepoRef>,
    version: Option<String>,
    generation: u64,
    files: BTreeMap<String, RemoteFile>,
}

impl FileCache {
    pub fn new() -> FileCache {
        FileCache::default()
    }

    /// Clears the cache unless it already belongs to `repo` at `version`.
    pub fn sync_to(&mut self, repo: Option<&RepoRef>, version: Option<&str>) {
        if self.repo.as_ref() != repo || self.version.as_deref() != version {
            self.clear();
            self.repo = repo.cloned();
            self.version = version.map(str::to_string);
        }
    }

    pub fn get(&self, path: &str) -> Option<&RemoteFile> {
        self.files.get(path)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stores `file` if nothing was cleared since `generation`. Returns whether it was kept.
    pub fn insert(&mut self, generation: u64, file: RemoteFile) -> bool {
        if generation != self.generation {
            return false;
        }
        self.files.insert(file.path.clone(), file);
        true
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> RemoteFile {
        RemoteFile {
            path: path.to_string(),
            content: "x".to_string(),
            version: "v".to_string(),
        }
    }

    #[test]
    fn test_cache_follows_repo_and_version() {
        let repo = RepoRef::new("me", "notes");
        let mut cache = FileCache::new();
        cache.sync_to(Some(&repo), Some("1"));
        assert!(cache.insert(cache.generation(), file("a.png")));

        cache.sync_to(Some(&repo), Some("1"));
        assert!(cache.get("a.png").is_some());

        cache.sync_to(Some(&repo), Some("2"));
        assert!(cache.is_empty());

        assert!(cache.insert(cache.generation(), file("a.png")));
        cache.sync_to(Some(&RepoRef::new("me", "other")), Some("2"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_insert_is_dropped() {
        let mut cache = FileCache::new();
        let started = cache.generation();
        cache.clear();
        assert!(!cache.insert(started, file("late.png")));
        assert_eq!(cache.len(), 0);
    }
}
