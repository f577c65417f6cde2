//! HTTP sync API client and pre-signed URL transport.
//!
//! Both use reqwest's blocking client: a sync run is sequential and the
//! orchestrator expects every call to return before the next one starts.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{BlobTransport, SyncApi};
use crate::auth::IdentityProvider;
use crate::error::{Error, Result};
use crate::model::{CompletionAck, CompletionRequest, Manifest, SyncPlan, SyncPlanRequest, TransferHandle};

const USER_AGENT: &str = concat!("cloudsave/", env!("CARGO_PKG_VERSION"));

/// Pause between transport retries, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Network(format!("Failed to build HTTP client: {e}")))
}

/// Pull a human-readable message out of an error body.
///
/// Prefers a JSON `message` or `error` field, falling back to the raw text.
pub(crate) fn api_error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|value| {
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
    });

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "no response body".to_string(),
        None => body.trim().to_string(),
    }
}

/// Client for the remote reconciliation service.
pub struct HttpSyncApi {
    client: reqwest::blocking::Client,
    base_url: String,
    identity: Arc<dyn IdentityProvider>,
    max_retries: u32,
}

impl HttpSyncApi {
    /// Create a client for `base_url` (trailing `/` ignored).
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        identity: Arc<dyn IdentityProvider>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
            max_retries,
        })
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let token = self.identity.access_token()?;
        let url = format!("{}{path}", self.base_url);

        let mut attempt = 0;
        let response = loop {
            match self.client.post(&url).bearer_auth(&token).json(body).send() {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(url = %url, attempt, error = %e, "Request failed; retrying");
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                }
                Err(e) => return Err(Error::Network(format!("Request to {url} failed: {e}"))),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Sync(format!(
                "API request failed ({}): {}",
                status.as_u16(),
                api_error_message(&body)
            )));
        }

        response
            .json::<T>()
            .map_err(|e| Error::Sync(format!("Invalid response from {url}: {e}")))
    }
}

impl SyncApi for HttpSyncApi {
    fn request_plan(&self, game_id: &str, manifest: &Manifest) -> Result<SyncPlan> {
        let request = SyncPlanRequest {
            game_id: game_id.to_string(),
            manifest: manifest.clone(),
        };
        debug!(game = game_id, files = manifest.len(), "Requesting sync plan");
        self.post("/sync/plan", &request)
    }

    fn complete_sync(&self, request: &CompletionRequest) -> Result<CompletionAck> {
        self.post("/sync/complete", request)
    }
}

/// Transfers bytes through pre-signed URLs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

impl BlobTransport for HttpTransport {
    fn write_via_handle(&self, handle: &TransferHandle, bytes: &[u8]) -> Result<()> {
        let response = self
            .client
            .put(handle.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .map_err(|e| Error::Network(format!("Upload to {handle} failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Sync(format!("Upload failed ({})", status.as_u16())));
        }
        Ok(())
    }

    fn read_via_handle(&self, handle: &TransferHandle) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(handle.as_str())
            .send()
            .map_err(|e| Error::Network(format!("Download from {handle} failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Sync(format!("Download failed ({})", status.as_u16())));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Download from {handle} failed: {}", e.without_url())))
    }
}
