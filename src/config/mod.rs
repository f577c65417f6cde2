//! Configuration management.
//!
//! Settings live in `<home>/config.json`, where `<home>` is `$CLOUDSAVE_HOME`
//! or `~/.cloudsave`. Resolution order, lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. The config file
//! 3. `CLOUDSAVE_*` environment variables
//! 4. Command-line flags (applied by the CLI)
//!
//! The same home directory also holds the local manifest database, the
//! filesystem blob store and the persisted login session.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::CommitMode;

/// Environment variable naming the cloudsave home directory.
pub const HOME_ENV: &str = "CLOUDSAVE_HOME";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which reconciliation service the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// HTTP API with Cognito authentication and pre-signed URLs.
    #[default]
    Remote,
    /// In-process service over the local manifest database and blob directory.
    Local,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            _ => Err(Error::InvalidArgument(format!("Unknown backend: {s}"))),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognito_user_pool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognito_app_client_id: Option<String>,
    /// Overrides the regional Cognito endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognito_endpoint: Option<String>,
    /// Identity used by the local backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_dir: Option<PathBuf>,
    pub sync_interval_seconds: u64,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub commit_mode: CommitMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api_base_url: None,
            game_id: None,
            aws_region: None,
            cognito_user_pool_id: None,
            cognito_app_client_id: None,
            cognito_endpoint: None,
            user_id: None,
            save_dir: None,
            blob_dir: None,
            sync_interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            commit_mode: CommitMode::default(),
        }
    }
}

/// Files and directories under the cloudsave home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paths {
    pub home: PathBuf,
    pub config: PathBuf,
    pub database: PathBuf,
    pub blobs: PathBuf,
    pub session: PathBuf,
}

impl Paths {
    #[must_use]
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            config: home.join("config.json"),
            database: home.join("data").join("manifests.db"),
            blobs: home.join("blobs"),
            session: home.join("session.json"),
        }
    }

    /// Paths under the resolved home directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no home directory can be determined.
    pub fn resolve() -> Result<Self> {
        Ok(Self::new(&home_dir()?))
    }
}

/// The cloudsave home: `$CLOUDSAVE_HOME` or `~/.cloudsave`.
///
/// # Errors
///
/// Returns `Error::Configuration` if neither is available.
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".cloudsave"))
        .ok_or_else(|| Error::Configuration("Could not determine home directory".into()))
}

/// Default Ren'Py save directory (`~/.renpy/saves`).
#[must_use]
pub fn default_save_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".renpy").join("saves"))
}

fn non_empty(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl Config {
    /// Load a config file. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read config file: {e}")))?;

        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;
        config.normalize();
        Ok(Some(config))
    }

    /// Write the config as pretty JSON, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Configuration(format!("Failed to create config directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {e}")))
    }

    /// Apply `CLOUDSAVE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment in production).
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("CLOUDSAVE_API_URL") {
            self.api_base_url = Some(url);
        }
        if let Some(game_id) = get("CLOUDSAVE_GAME_ID") {
            self.game_id = Some(game_id);
        }
        if let Some(dir) = get("CLOUDSAVE_SAVE_DIR") {
            self.save_dir = Some(PathBuf::from(dir));
        }
        if let Some(backend) = get("CLOUDSAVE_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(user_id) = get("CLOUDSAVE_USER_ID") {
            self.user_id = Some(user_id);
        }
        if let Some(interval) = get("CLOUDSAVE_SYNC_INTERVAL") {
            self.sync_interval_seconds = interval.parse().map_err(|_| {
                Error::Configuration(format!("CLOUDSAVE_SYNC_INTERVAL must be a number of seconds, got {interval:?}"))
            })?;
        }

        self.normalize();
        Ok(())
    }

    /// Trim a trailing `/` from the API base URL.
    pub fn normalize(&mut self) {
        if let Some(url) = &mut self.api_base_url {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }
    }

    /// Names of required keys that are unset for the selected backend.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, Option<&String>)> = match self.backend {
            Backend::Remote => vec![
                ("api_base_url", self.api_base_url.as_ref()),
                ("game_id", self.game_id.as_ref()),
                ("aws_region", self.aws_region.as_ref()),
                ("cognito_user_pool_id", self.cognito_user_pool_id.as_ref()),
                ("cognito_app_client_id", self.cognito_app_client_id.as_ref()),
            ],
            Backend::Local => vec![
                ("game_id", self.game_id.as_ref()),
                ("user_id", self.user_id.as_ref()),
            ],
        };

        required
            .into_iter()
            .filter(|(_, value)| !non_empty(*value))
            .map(|(name, _)| name)
            .collect()
    }

    /// Check that every required key for the backend is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming every missing key.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }

    /// The configured game id, or an error if unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if `game_id` is missing.
    pub fn require_game_id(&self) -> Result<&str> {
        self.game_id
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| Error::Configuration("Missing required configuration: game_id".into()))
    }

    /// Save directory: configured value or `~/.renpy/saves`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if neither is available.
    pub fn resolved_save_dir(&self) -> Result<PathBuf> {
        self.save_dir
            .clone()
            .or_else(default_save_dir)
            .ok_or_else(|| Error::Configuration("Could not determine save directory".into()))
    }

    /// Blob directory: configured value or `<home>/blobs`.
    #[must_use]
    pub fn resolved_blob_dir(&self, paths: &Paths) -> PathBuf {
        self.blob_dir.clone().unwrap_or_else(|| paths.blobs.clone())
    }

    /// Cognito endpoint: explicit override or the regional default.
    #[must_use]
    pub fn resolved_cognito_endpoint(&self) -> Option<String> {
        self.cognito_endpoint
            .clone()
            .or_else(|| self.aws_region.as_deref().map(crate::auth::cognito::endpoint_for_region))
    }

    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
