//! Error types for cloudsave.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=config, 3=auth, 4=network, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cloudsave operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Configuration (exit 2)
    NotConfigured,
    AlreadyInitialized,
    ConfigError,

    // Authentication (exit 3)
    AuthError,

    // Network (exit 4)
    NetworkError,

    // Sync (exit 5)
    SyncError,

    // Storage (exit 6)
    StorageError,
    DatabaseError,

    // Validation (exit 7)
    InvalidArgument,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::AuthError => "AUTH_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotConfigured | Self::AlreadyInitialized | Self::ConfigError => 2,
            Self::AuthError => 3,
            Self::NetworkError => 4,
            Self::SyncError => 5,
            Self::StorageError | Self::DatabaseError => 6,
            Self::InvalidArgument => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// True for transport failures and API rejections that are usually
    /// transient. False for configuration, validation, or local errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::SyncError | Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in cloudsave operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not configured: run `cloudsave init` first")]
    NotConfigured,

    #[error("Already initialized at {}", path.display())]
    AlreadyInitialized { path: PathBuf },

    /// Missing or invalid setup; fatal to anything attempted before configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credential missing, expired, or refresh failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport-level failure, distinct from an API rejection.
    #[error("Network error: {0}")]
    Network(String),

    /// The API rejected a request, or a generic sync failure.
    #[error("Sync error: {0}")]
    Sync(String),

    /// Local filesystem operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotConfigured => ErrorCode::NotConfigured,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Configuration(_) => ErrorCode::ConfigError,
            Self::Authentication(_) => ErrorCode::AuthError,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Storage(_) => ErrorCode::StorageError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotConfigured => {
                Some("Run `cloudsave init --game-id <id> --api-url <url>` to create a config".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Config already exists at {}. Use `--force` to overwrite it.",
                path.display()
            )),

            Self::Configuration(msg) if msg.contains("Missing required") => Some(
                "Set the missing keys in config.json, via CLOUDSAVE_* environment \
                 variables, or re-run `cloudsave init --force`."
                    .to_string(),
            ),

            Self::Authentication(_) => Some(
                "Log in again: cloudsave login <username>".to_string(),
            ),

            Self::Network(_) => Some(
                "Check your connection and the configured api_base_url, then retry.".to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("backend") => Some(
                "Valid backends: remote, local".to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("commit") => Some(
                "Valid commit modes: eager, confirmed".to_string(),
            ),

            Self::Configuration(_)
            | Self::Sync(_)
            | Self::Storage(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
