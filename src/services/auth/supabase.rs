use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{AuthProvider, AuthProviderError, AuthSession, AuthUser};

pub struct SupabaseAuthProvider {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct UserResource {
    id: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct SessionResource {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<UserResource>,
    // Sign-up without an immediate session returns the bare user object.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorResource {
    #[serde(default, alias = "error_description", alias = "message")]
    msg: Option<String>,
}

impl SupabaseAuthProvider {
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            client: reqwest::Client::new(),
        }
    }

    async fn read_session(&self, res: reqwest::Response) -> Result<AuthSession, AuthProviderError> {
        let res = reject_client_errors(res).await?;
        let session: SessionResource = res.json().await.context("unexpected auth response")?;

        let user = match (session.user, session.id) {
            (Some(user), _) => user,
            (None, Some(id)) => UserResource {
                id,
                email: session.email.unwrap_or_default(),
            },
            (None, None) => {
                return Err(anyhow::anyhow!("auth response carried no user").into());
            }
        };

        Ok(AuthSession {
            user: AuthUser {
                id: user.id,
                email: user.email,
            },
            access_token: session.access_token.unwrap_or_default(),
        })
    }
}

/// 4xx answers are the provider declining the request; 5xx and transport
/// failures mean it could not be asked.
async fn reject_client_errors(res: reqwest::Response) -> Result<reqwest::Response, AuthProviderError> {
    let status = res.status();
    if status.is_client_error() {
        let body: ErrorResource = res.json().await.unwrap_or_default();
        let msg = body.msg.unwrap_or_else(|| match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "invalid authentication token".to_string(),
            _ => "request rejected by authentication service".to_string(),
        });
        return Err(AuthProviderError::Rejected(msg));
    }
    res.error_for_status()
        .context("authentication service error")
        .map_err(AuthProviderError::Unavailable)
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        phone: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        let res = self
            .client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name, "phone": phone },
            }))
            .send()
            .await
            .context("failed to reach authentication service")?;

        self.read_session(res).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError> {
        let res = self
            .client
            .post(format!("{}/auth/v1/token?grant_type=password", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("failed to reach authentication service")?;

        self.read_session(res).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthProviderError> {
        let res = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("failed to reach authentication service")?;

        let user: UserResource = reject_client_errors(res)
            .await?
            .json()
            .await
            .context("unexpected auth response")?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthProviderError> {
        let res = self
            .client
            .post(format!("{}/auth/v1/recover", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .context("failed to reach authentication service")?;

        reject_client_errors(res).await?;
        Ok(())
    }
}
