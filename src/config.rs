use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::NotesyncError;

/// Default bound on one remote pull or push.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_online() -> bool {
    true
}

/// Sync settings, usually read from a TOML file:
///
/// ```toml
/// repo_owner = "octocat"
/// repo_name = "notes"
/// auth_token = "ghp_..."
/// timeout_secs = 10
/// context_path = "context.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub repo_owner: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_online")]
    pub online: bool,
    /// Where the sync context is persisted between runs.
    #[serde(default)]
    pub context_path: Option<PathBuf>,
    /// Use a directory as the remote note store instead of GitHub.
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,
    /// GitHub API base, for GitHub Enterprise hosts.
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            repo_owner: None,
            repo_name: None,
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            online: true,
            context_path: None,
            remote_dir: None,
            api_url: None,
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<SyncConfig, NotesyncError>;
    fn set_config(&self, config: &SyncConfig) -> Result<(), NotesyncError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<SyncConfig, NotesyncError> {
        tracing::debug!("Attempting to read sync config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(SyncConfig::default());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn set_config(&self, config: &SyncConfig) -> Result<(), NotesyncError> {
        tracing::debug!("Attempting to write sync config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
