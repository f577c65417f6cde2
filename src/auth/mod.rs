//! Identity providers.
//!
//! The sync core only ever asks two questions: is anyone logged in, and
//! what bearer token should the next request carry.
//!
//! - [`LocalIdentity`] - fixed identity for the `local` backend
//! - [`CognitoProvider`] - Amazon Cognito user pool tokens
//! - [`session`] - token persistence between runs

pub mod cognito;
pub mod session;

pub use cognito::CognitoProvider;
pub use session::TokenSession;

use crate::error::Result;

/// Supplies access capabilities to the sync API.
pub trait IdentityProvider: Send + Sync {
    /// Whether a credential is available at all.
    fn is_authenticated(&self) -> bool;

    /// A currently valid access token, refreshed if necessary.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if no credential is available or it
    /// cannot be refreshed.
    fn access_token(&self) -> Result<String>;
}

/// Always-authenticated identity whose token is a fixed string.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    token: String,
}

impl LocalIdentity {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl IdentityProvider for LocalIdentity {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
