//! Driven port: where API credentials come from.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// API key and secret for one outbound attempt. Not cached by the client.
#[derive(Clone)]
pub struct AuthContext {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
}

impl AuthContext {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The secret store could not be reached.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    /// The secret store has no value for this entry.
    #[error("credential missing: {0}")]
    Missing(String),
}

/// Source of API credentials, shared read-only across all requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetch the current credentials. Called once per outbound attempt.
    async fn credentials(&self) -> Result<AuthContext, CredentialError>;
}
