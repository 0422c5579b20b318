use std::{fmt, io};

use http::status::StatusCode;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum NotesyncError {
    #[error("Authentication rejected by the remote note store: {0}")]
    Auth(String),
    #[error("Version conflict on '{path}': expected {expected:?}, remote has {actual:?}")]
    Conflict {
        path: String,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[error("Invalid Command: {0}")]
    Command(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Note '{id}' is linked from {} other note(s) and cannot be deleted", .backlinks.len())]
    HasBacklinks { id: String, backlinks: Vec<String> },
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Note parse error: {0}")]
    Parse(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Remote note store error: {0}")]
    Remote(String),
    #[error("Remote call timed out after {0} seconds")]
    Timeout(u64),
}

impl NotesyncError {
    /// Maps an HTTP status returned by a remote note store onto the error taxonomy.
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> NotesyncError {
        let context = context.into();
        match status {
            StatusCode::UNAUTHORIZED => NotesyncError::Auth(context),
            StatusCode::FORBIDDEN => NotesyncError::PermissionDenied,
            StatusCode::NOT_FOUND => NotesyncError::NotFound(context),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => NotesyncError::Conflict {
                path: context,
                expected: None,
                actual: None,
            },
            _ => NotesyncError::Remote(format!("{status}: {context}")),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            NotesyncError::Auth(_) => StatusCode::UNAUTHORIZED,
            NotesyncError::Conflict { .. } => StatusCode::CONFLICT,
            NotesyncError::Command(_) => StatusCode::BAD_REQUEST,
            NotesyncError::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NotesyncError::HasBacklinks { .. } => StatusCode::CONFLICT,
            NotesyncError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NotesyncError::NotFound(_) => StatusCode::NOT_FOUND,
            NotesyncError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            NotesyncError::PermissionDenied => StatusCode::FORBIDDEN,
            NotesyncError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NotesyncError::Remote(_) => StatusCode::BAD_GATEWAY,
            NotesyncError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<toml::de::Error> for NotesyncError {
    fn from(src: toml::de::Error) -> NotesyncError {
        NotesyncError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for NotesyncError {
    fn from(src: toml::ser::Error) -> NotesyncError {
        NotesyncError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for NotesyncError {
    fn from(src: JsonError) -> NotesyncError {
        NotesyncError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<serde_yaml::Error> for NotesyncError {
    fn from(src: serde_yaml::Error) -> NotesyncError {
        NotesyncError::Parse(format!("Frontmatter is not valid YAML: {src}"))
    }
}

impl From<UrlParseError> for NotesyncError {
    fn from(src: UrlParseError) -> NotesyncError {
        NotesyncError::Serialization(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for NotesyncError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => NotesyncError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => NotesyncError::PermissionDenied,
            _ => NotesyncError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<walkdir::Error> for NotesyncError {
    fn from(x: walkdir::Error) -> Self {
        match x.into_io_error() {
            Some(io_error) => NotesyncError::from(io_error),
            None => NotesyncError::Io("directory walk hit a filesystem loop".to_string()),
        }
    }
}

impl From<fmt::Error> for NotesyncError {
    fn from(x: fmt::Error) -> Self {
        NotesyncError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for NotesyncError {
    fn from(x: RegexError) -> Self {
        NotesyncError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<tokio::task::JoinError> for NotesyncError {
    fn from(x: tokio::task::JoinError) -> Self {
        NotesyncError::Custom(format!("Background sync task failed: {x}"))
    }
}

#[cfg(feature = "github")]
impl From<reqwest::Error> for NotesyncError {
    fn from(x: reqwest::Error) -> Self {
        if x.is_timeout() {
            NotesyncError::Remote(format!("request timed out: {x}"))
        } else if let Some(status) = x.status() {
            NotesyncError::from_status(status, format!("{x}"))
        } else {
            NotesyncError::Remote(format!("{x}"))
        }
    }
}

#[cfg(feature = "github")]
impl From<base64::DecodeError> for NotesyncError {
    fn from(x: base64::DecodeError) -> Self {
        NotesyncError::Serialization(format!("Base64 decode failed: {x}"))
    }
}
