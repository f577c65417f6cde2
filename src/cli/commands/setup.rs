//! Shared command setup: resolve configuration and wire the backend.
//!
//! The `local` backend runs the reconciliation service in-process over the
//! SQLite manifest store and the filesystem blob store. The `remote` backend
//! talks to the HTTP sync API with Cognito tokens and pre-signed URLs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::auth::{CognitoProvider, IdentityProvider, LocalIdentity};
use crate::config::{Backend, Config, Paths};
use crate::error::{Error, Result};
use crate::remote::{
    BlobTransport, DispatchTransport, HttpSyncApi, HttpTransport, LocalSyncApi, ReconcileService, SyncApi,
};
use crate::storage::{FsBlobStore, SqliteManifestStore};
use crate::sync::{LocalInventory, SyncManager};

/// Resolved configuration plus the paths it came from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub paths: Paths,
    pub config_path: PathBuf,
}

impl Settings {
    /// Load config file, then environment, then CLI flag overrides.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConfigured` if the config file does not exist, or a
    /// configuration error if it or an override is invalid.
    pub fn load(config_flag: Option<&Path>, save_dir_flag: Option<&Path>) -> Result<Self> {
        let paths = Paths::resolve()?;
        let config_path = config_flag.map_or_else(|| paths.config.clone(), Path::to_path_buf);

        let mut config = Config::load(&config_path)?.ok_or(Error::NotConfigured)?;
        config.apply_env()?;
        if let Some(dir) = save_dir_flag {
            config.save_dir = Some(dir.to_path_buf());
        }

        debug!(config = %config_path.display(), backend = %config.backend, "Configuration loaded");
        Ok(Self { config, paths, config_path })
    }

    /// Inventory over the resolved save directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no save directory can be determined.
    pub fn inventory(&self) -> Result<LocalInventory> {
        Ok(LocalInventory::new(self.config.resolved_save_dir()?))
    }

    /// Cognito client for the configured user pool.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` on the local backend, or a
    /// configuration error if the region or app client id is missing.
    pub fn cognito(&self) -> Result<CognitoProvider> {
        if self.config.backend == Backend::Local {
            return Err(Error::InvalidArgument(
                "The local backend has no login; set backend to remote".to_string(),
            ));
        }

        let endpoint = self
            .config
            .resolved_cognito_endpoint()
            .ok_or_else(|| Error::Configuration("Missing required configuration: aws_region".to_string()))?;
        let client_id = self
            .config
            .cognito_app_client_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                Error::Configuration("Missing required configuration: cognito_app_client_id".to_string())
            })?;

        CognitoProvider::new(
            &endpoint,
            client_id,
            Some(self.paths.session.clone()),
            self.config.timeout(),
        )
    }
}

/// Everything a sync needs, wired for the configured backend.
pub struct Client {
    pub game_id: String,
    pub identity: Arc<dyn IdentityProvider>,
    pub api: Arc<dyn SyncApi>,
    pub transport: Arc<dyn BlobTransport>,
    /// Present on the local backend only
    pub local: Option<LocalBackend>,
}

/// Handles into the in-process backend.
pub struct LocalBackend {
    pub user_id: String,
    pub service: Arc<ReconcileService>,
    pub store: Arc<SqliteManifestStore>,
}

impl Client {
    /// Validate the configuration and build the backend it selects.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if required keys are missing, or an
    /// error if the manifest database, blob directory, or HTTP clients cannot
    /// be opened.
    pub fn connect(settings: &Settings) -> Result<Self> {
        let config = &settings.config;
        config.validate()?;
        let game_id = config.require_game_id()?.to_string();

        match config.backend {
            Backend::Local => {
                let user_id = config.user_id.clone().unwrap_or_default();
                let store = Arc::new(SqliteManifestStore::open(&settings.paths.database)?);
                let blobs = FsBlobStore::open(&config.resolved_blob_dir(&settings.paths))?;
                let service = Arc::new(ReconcileService::new(
                    store.clone(),
                    Arc::new(blobs.clone()),
                    config.commit_mode,
                ));

                Ok(Self {
                    game_id,
                    identity: Arc::new(LocalIdentity::new(user_id.clone())),
                    api: Arc::new(LocalSyncApi::new(service.clone(), user_id.clone())),
                    transport: Arc::new(blobs),
                    local: Some(LocalBackend { user_id, service, store }),
                })
            }
            Backend::Remote => {
                let identity: Arc<dyn IdentityProvider> = Arc::new(settings.cognito()?);
                let base_url = config.api_base_url.clone().unwrap_or_default();
                let api = HttpSyncApi::new(&base_url, identity.clone(), config.timeout(), config.max_retries)?;
                let transport = DispatchTransport::new(None, HttpTransport::new(config.timeout())?);

                Ok(Self {
                    game_id,
                    identity,
                    api: Arc::new(api),
                    transport: Arc::new(transport),
                    local: None,
                })
            }
        }
    }

    /// Orchestrator over this client and the settings' save directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no save directory can be determined.
    pub fn manager(&self, settings: &Settings) -> Result<SyncManager> {
        Ok(SyncManager::new(
            self.game_id.clone(),
            settings.inventory()?,
            self.identity.clone(),
            self.api.clone(),
            self.transport.clone(),
        )
        .with_interval(settings.config.sync_interval()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_settings(temp: &TempDir) -> Settings {
        let paths = Paths::new(temp.path());
        Settings {
            config: Config {
                backend: Backend::Local,
                game_id: Some("vn".into()),
                user_id: Some("player".into()),
                save_dir: Some(temp.path().join("saves")),
                ..Config::default()
            },
            config_path: paths.config.clone(),
            paths,
        }
    }

    #[test]
    fn test_connect_local_backend() {
        let temp = TempDir::new().unwrap();
        let settings = local_settings(&temp);

        let client = Client::connect(&settings).unwrap();
        assert!(client.identity.is_authenticated());
        assert_eq!(client.local.as_ref().unwrap().user_id, "player");
        assert!(settings.paths.database.exists());
        assert!(settings.paths.blobs.is_dir());
    }

    #[test]
    fn test_connect_validates_first() {
        let temp = TempDir::new().unwrap();
        let mut settings = local_settings(&temp);
        settings.config.user_id = None;

        let err = Client::connect(&settings).err().unwrap();
        assert!(err.to_string().contains("user_id"));
        assert!(!settings.paths.database.exists());
    }

    #[test]
    fn test_cognito_rejected_on_local_backend() {
        let temp = TempDir::new().unwrap();
        let settings = local_settings(&temp);
        assert!(matches!(settings.cognito(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_cognito_requires_client_id() {
        let temp = TempDir::new().unwrap();
        let mut settings = local_settings(&temp);
        settings.config.backend = Backend::Remote;
        settings.config.aws_region = Some("eu-west-1".into());

        let err = settings.cognito().err().unwrap();
        assert!(err.to_string().contains("cognito_app_client_id"));
    }
}
