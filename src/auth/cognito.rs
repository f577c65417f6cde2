//! Amazon Cognito user pool authentication.
//!
//! Talks to the Cognito Identity Provider JSON API directly: `SignUp` and
//! `InitiateAuth` with the `USER_PASSWORD_AUTH` and `REFRESH_TOKEN_AUTH`
//! flows. The app client is assumed public (no client secret).

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::IdentityProvider;
use super::session::{TokenSession, clear_session, read_session, write_session};
use crate::error::{Error, Result};
use crate::remote::http::api_error_message;

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// Token lifetime assumed when Cognito omits `ExpiresIn`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Regional Cognito Identity Provider endpoint.
#[must_use]
pub fn endpoint_for_region(region: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN
}

/// Cognito-backed identity with a persisted token session.
pub struct CognitoProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    client_id: String,
    session_path: Option<PathBuf>,
    session: Mutex<Option<TokenSession>>,
}

impl CognitoProvider {
    /// Create a provider, restoring any session saved at `session_path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        client_id: &str,
        session_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {e}")))?;
        let session = session_path.as_deref().and_then(read_session);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            client_id: client_id.to_string(),
            session_path,
            session: Mutex::new(session),
        })
    }

    /// Username of the logged-in user, if any.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.lock().ok()?.as_ref().map(|s| s.username.clone())
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Option<TokenSession> {
        self.lock().ok()?.clone()
    }

    /// Register a new user. Email confirmation may still be required.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if Cognito rejects the signup, or
    /// `Error::Network` on transport failure.
    pub fn signup(&self, username: &str, password: &str, email: &str) -> Result<()> {
        let payload = serde_json::json!({
            "ClientId": self.client_id,
            "Username": username,
            "Password": password,
            "UserAttributes": [{"Name": "email", "Value": email}],
        });
        self.request("SignUp", &payload)?;
        info!(user = username, "Signed up");
        Ok(())
    }

    /// Log in with a username and password and persist the session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if the credentials are rejected or no
    /// tokens come back.
    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        let payload = serde_json::json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {"USERNAME": username, "PASSWORD": password},
        });
        let result = self.initiate_auth(&payload)?.ok_or_else(|| {
            Error::Authentication("Login failed: No authentication result returned".to_string())
        })?;

        let session = TokenSession {
            username: username.to_string(),
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            id_token: result.id_token,
            expires_at: chrono::Utc::now().timestamp() + result.expires_in,
        };
        self.store(Some(session))?;
        info!(user = username, "Logged in");
        Ok(())
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if there is no refresh token or the
    /// exchange is rejected.
    pub fn refresh(&self) -> Result<()> {
        let Some(mut session) = self.session() else {
            return Err(Error::Authentication("Not authenticated. Please log in.".to_string()));
        };
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Err(Error::Authentication("No refresh token available".to_string()));
        };

        let payload = serde_json::json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {"REFRESH_TOKEN": refresh_token},
        });
        let result = self.initiate_auth(&payload)?.ok_or_else(|| {
            Error::Authentication("Token refresh returned no authentication result".to_string())
        })?;

        session.access_token = result.access_token;
        if result.id_token.is_some() {
            session.id_token = result.id_token;
        }
        session.expires_at = chrono::Utc::now().timestamp() + result.expires_in;
        self.store(Some(session))?;
        debug!("Access token refreshed");
        Ok(())
    }

    /// Forget the session in memory and on disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the session file cannot be removed.
    pub fn logout(&self) -> Result<()> {
        self.store(None)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<TokenSession>>> {
        self.session
            .lock()
            .map_err(|_| Error::Other("Session lock poisoned".to_string()))
    }

    fn store(&self, session: Option<TokenSession>) -> Result<()> {
        if let Some(path) = &self.session_path {
            match &session {
                Some(s) => write_session(path, s)?,
                None => clear_session(path)?,
            }
        }
        *self.lock()? = session;
        Ok(())
    }

    fn initiate_auth(&self, payload: &serde_json::Value) -> Result<Option<AuthenticationResult>> {
        let body = self.request("InitiateAuth", payload)?;
        let response: InitiateAuthResponse = serde_json::from_value(body)
            .map_err(|e| Error::Authentication(format!("Unexpected Cognito response: {e}")))?;
        Ok(response.authentication_result)
    }

    fn request(&self, target: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{target}"))
            .body(payload.to_string())
            .send()
            .map_err(|e| Error::Network(format!("Network error: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::Network(format!("Network error: {e}")))?;

        if !status.is_success() {
            return Err(Error::Authentication(format!(
                "Cognito request failed: {}",
                api_error_message(&text)
            )));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Authentication(format!("Unexpected Cognito response: {e}")))
    }
}

impl IdentityProvider for CognitoProvider {
    fn is_authenticated(&self) -> bool {
        self.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn access_token(&self) -> Result<String> {
        let Some(session) = self.session() else {
            return Err(Error::Authentication("Not authenticated. Please log in.".to_string()));
        };

        if !session.needs_refresh(chrono::Utc::now().timestamp()) {
            return Ok(session.access_token);
        }

        match self.refresh() {
            Ok(()) => self
                .session()
                .map(|s| s.access_token)
                .ok_or_else(|| Error::Authentication("Not authenticated. Please log in.".to_string())),
            Err(Error::Authentication(reason)) => {
                warn!(reason = %reason, "Token refresh failed; logging out");
                if let Err(e) = self.logout() {
                    warn!(error = %e, "Failed to clear session");
                }
                Err(Error::Authentication("Session expired. Please log in again.".to_string()))
            }
            Err(other) => Err(other),
        }
    }
}
