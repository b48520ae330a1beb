pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    /// Empty when the provider wants the email address confirmed first.
    pub access_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthProviderError {
    /// The provider answered and said no: bad credentials, expired token,
    /// address already registered.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Hosted identity service: owns passwords and issues bearer tokens.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        phone: &str,
    ) -> Result<AuthSession, AuthProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError>;

    /// Resolves a bearer token to the user it was issued to.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthProviderError>;

    /// Asks the provider to email a password recovery link.
    async fn reset_password(&self, email: &str) -> Result<(), AuthProviderError>;
}
