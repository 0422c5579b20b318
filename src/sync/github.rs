//! A [`NoteStore`] over the GitHub contents API.
//!
//! Notes live at the repository root as `<id>.md`. Blob versions are the git blob SHAs GitHub
//! reports, and the collection version is the SHA of `HEAD`. Listing reads the root tree of
//! `HEAD` in one request.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::NotesyncError,
    sync::store::{is_note_path, NoteStore, RemoteEntry, RemoteFile, Session},
};

pub const DEFAULT_API_URL: &str = "https://api.github.com/";

const USER_AGENT: &str = concat!("notesync/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct GitTree {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

fn note_entries(tree: GitTree) -> Result<Vec<RemoteEntry>, NotesyncError> {
    if tree.truncated {
        return Err(NotesyncError::Remote(
            "the repository root has more entries than GitHub lists in one tree".to_string(),
        ));
    }
    let mut entries: Vec<RemoteEntry> = tree
        .tree
        .into_iter()
        .filter(|entry| entry.kind == "blob" && is_note_path(&entry.path))
        .map(|entry| RemoteEntry {
            path: entry.path,
            version: entry.sha,
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct PutContent<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: BlobRef,
}

#[derive(Debug, Deserialize)]
struct BlobRef {
    sha: String,
}

#[derive(Debug, Serialize)]
struct DeleteContent<'a> {
    message: String,
    sha: &'a str,
}

fn decode_content(encoded: &str) -> Result<String, NotesyncError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(compact)?;
    String::from_utf8(bytes)
        .map_err(|e| NotesyncError::Serialization(format!("note is not valid UTF-8: {e}")))
}

/// Turns a non-success response into an error. Version mismatches become conflicts on `path`.
async fn check(
    response: Response,
    path: &str,
    expected: Option<&str>,
) -> Result<Response, NotesyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::debug!("GitHub answered {status} for {path}: {message}");
    match status {
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(NotesyncError::Conflict {
            path: path.to_string(),
            expected: expected.map(str::to_string),
            actual: None,
        }),
        _ => Err(NotesyncError::from_status(status, format!("{path}: {message}"))),
    }
}

#[derive(Debug, Clone)]
pub struct GitHubNoteStore {
    client: Client,
    api: Url,
}

impl GitHubNoteStore {
    pub fn new() -> Result<GitHubNoteStore, NotesyncError> {
        GitHubNoteStore::with_api_url(DEFAULT_API_URL)
    }

    /// Talks to the API at `api_url`, e.g. a GitHub Enterprise host.
    pub fn with_api_url(api_url: &str) -> Result<GitHubNoteStore, NotesyncError> {
        let mut api = Url::parse(api_url)?;
        if !api.path().ends_with('/') {
            let path = format!("{}/", api.path());
            api.set_path(&path);
        }
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(GitHubNoteStore { client, api })
    }

    fn repo_url(&self, session: &Session, tail: &str) -> Result<Url, NotesyncError> {
        Ok(self.api.join(&format!(
            "repos/{}/{}/{tail}",
            session.repo.owner, session.repo.name
        ))?)
    }

    fn request(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&session.auth_token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

#[async_trait]
impl NoteStore for GitHubNoteStore {
    async fn latest_version(&self, session: &Session) -> Result<String, NotesyncError> {
        let url = self.repo_url(session, "commits/HEAD")?;
        let response = self
            .request(Method::GET, url, session)
            .header(header::ACCEPT, "application/vnd.github.sha")
            .send()
            .await?;
        // Empty repositories have no HEAD yet.
        if response.status() == StatusCode::CONFLICT {
            return Ok(String::new());
        }
        let response = check(response, "HEAD", None).await?;
        Ok(response.text().await?.trim().to_string())
    }

    async fn list(&self, session: &Session) -> Result<Vec<RemoteEntry>, NotesyncError> {
        let url = self.repo_url(session, "git/trees/HEAD")?;
        let response = self.request(Method::GET, url, session).send().await?;
        // 409 for an empty repository, 404 before the first commit on some hosts.
        if matches!(
            response.status(),
            StatusCode::CONFLICT | StatusCode::NOT_FOUND
        ) {
            tracing::debug!("{} has no contents yet", session.repo);
            return Ok(Vec::new());
        }
        let tree: GitTree = check(response, "/", None).await?.json().await?;
        note_entries(tree)
    }

    async fn read(&self, session: &Session, path: &str) -> Result<RemoteFile, NotesyncError> {
        let url = self.repo_url(session, &format!("contents/{path}"))?;
        let response = self.request(Method::GET, url, session).send().await?;
        let file: ContentFile = check(response, path, None).await?.json().await?;
        Ok(RemoteFile {
            content: decode_content(&file.content)?,
            path: file.path,
            version: file.sha,
        })
    }

    async fn write(
        &self,
        session: &Session,
        path: &str,
        content: &str,
        expected: Option<&str>,
    ) -> Result<String, NotesyncError> {
        let url = self.repo_url(session, &format!("contents/{path}"))?;
        let body = PutContent {
            message: format!("Update {path}"),
            content: BASE64.encode(content.as_bytes()),
            sha: expected,
        };
        let response = self
            .request(Method::PUT, url, session)
            .json(&body)
            .send()
            .await?;
        let written: PutResponse = check(response, path, expected).await?.json().await?;
        Ok(written.content.sha)
    }

    async fn delete(
        &self,
        session: &Session,
        path: &str,
        expected: Option<&str>,
    ) -> Result<(), NotesyncError> {
        let Some(sha) = expected else {
            // GitHub needs the blob SHA to delete. Without one, only a missing file is fine.
            let current = self.read(session, path).await?;
            return Err(NotesyncError::Conflict {
                path: path.to_string(),
                expected: None,
                actual: Some(current.version),
            });
        };
        let url = self.repo_url(session, &format!("contents/{path}"))?;
        let body = DeleteContent {
            message: format!("Delete {path}"),
            sha,
        };
        let response = self
            .request(Method::DELETE, url, session)
            .json(&body)
            .send()
            .await?;
        check(response, path, expected).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::store::RepoRef;

    #[test]
    fn test_repo_urls() {
        let store = GitHubNoteStore::with_api_url("https://ghe.example.com/api/v3").unwrap();
        let session = Session {
            auth_token: "t".to_string(),
            repo: RepoRef::new("octocat", "notes"),
        };
        assert_eq!(
            store.repo_url(&session, "contents/12.md").unwrap().as_str(),
            "https://ghe.example.com/api/v3/repos/octocat/notes/contents/12.md"
        );
    }

    #[test]
    fn test_decode_wrapped_content() {
        // GitHub wraps base64 bodies at 60 columns.
        let encoded = "IyBIZWxsbwoKI3Rh\nZyBbWzEyXV0=\n";
        assert_eq!(decode_content(encoded).unwrap(), "# Hello\n\n#tag [[12]]");
        assert!(decode_content("not base64!").is_err());
    }

    #[test]
    fn test_tree_listing_keeps_root_notes() {
        let tree: GitTree = serde_json::from_str(
            r#"{
                "sha": "c0ffee",
                "tree": [
                    {"path": "README.txt", "mode": "100644", "type": "blob", "sha": "r1"},
                    {"path": "12.md", "mode": "100644", "type": "blob", "sha": "b12"},
                    {"path": "3.md", "mode": "040000", "type": "tree", "sha": "t3"},
                    {"path": "2.md", "mode": "100644", "type": "blob", "sha": "b2", "size": 5},
                    {"path": "notes.txt", "mode": "100644", "type": "blob", "sha": "n"}
                ],
                "truncated": false
            }"#,
        )
        .unwrap();
        assert_eq!(
            note_entries(tree).unwrap(),
            vec![
                RemoteEntry {
                    path: "12.md".to_string(),
                    version: "b12".to_string(),
                },
                RemoteEntry {
                    path: "2.md".to_string(),
                    version: "b2".to_string(),
                },
            ]
        );

        let truncated: GitTree =
            serde_json::from_str(r#"{"sha": "c0ffee", "tree": [], "truncated": true}"#).unwrap();
        assert!(matches!(
            note_entries(truncated),
            Err(NotesyncError::Remote(_))
        ));
    }
}
