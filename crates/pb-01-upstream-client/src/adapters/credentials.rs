//! Credential providers.

use async_trait::async_trait;

use crate::ports::outbound::{AuthContext, CredentialError, CredentialProvider};

/// Fixed key and secret, for local runs and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    context: AuthContext,
}

impl StaticCredentialProvider {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            context: AuthContext::new(api_key, api_secret),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credentials(&self) -> Result<AuthContext, CredentialError> {
        Ok(self.context.clone())
    }
}

/// Reads key and secret from environment variables on every call, so rotated
/// values are picked up without a restart.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    key_var: String,
    secret_var: String,
}

impl EnvCredentialProvider {
    pub const DEFAULT_KEY_VAR: &'static str = "PB_API_KEY";
    pub const DEFAULT_SECRET_VAR: &'static str = "PB_API_SECRET";

    pub fn new(key_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            key_var: key_var.into(),
            secret_var: secret_var.into(),
        }
    }

    fn read(var: &str) -> Result<String, CredentialError> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) | Err(std::env::VarError::NotPresent) => {
                Err(CredentialError::Missing(var.to_string()))
            }
            Err(e) => Err(CredentialError::Unavailable(format!("{}: {}", var, e))),
        }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEY_VAR, Self::DEFAULT_SECRET_VAR)
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self) -> Result<AuthContext, CredentialError> {
        let key = Self::read(&self.key_var)?;
        let secret = Self::read(&self.secret_var)?;
        Ok(AuthContext::new(key, secret))
    }
}
