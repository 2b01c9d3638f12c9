//! Token-issuing collaborator.
//!
//! OAuth flows, refresh scheduling and secure persistence all live behind
//! this seam; adapters only ever ask for a bearer string to stamp onto an
//! outgoing request.

use async_trait::async_trait;

use crate::error::Result;

/// Issues short-lived bearer tokens for a configured credential.
///
/// Implementations are expected to refresh transparently: `access_token`
/// returns a token that is valid at the time of the call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A bearer token ready to be placed into an `Authorization` header.
    async fn access_token(&self) -> Result<String>;
}

/// Fixed-token provider for tests and short-lived tools.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
