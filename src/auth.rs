//! Request guards built on the hosted identity service.

use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Profile, Role};
use crate::services::auth::{AuthProviderError, AuthUser};
use crate::state::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn resolve(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    match state.auth.get_user(token).await {
        Ok(user) => Ok(user),
        Err(AuthProviderError::Rejected(_)) => Err(AppError::Auth("invalid or expired session".to_string())),
        Err(AuthProviderError::Unavailable(e)) => Err(AppError::Internal(e)),
    }
}

/// The signed-in caller, or 401.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers).ok_or_else(|| AppError::Auth("sign in required".to_string()))?;
    resolve(state, token).await
}

/// The caller if a token was sent. A token that is sent but not accepted is
/// still an error.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<AuthUser>, AppError> {
    match bearer_token(headers) {
        Some(token) => resolve(state, token).await.map(Some),
        None => Ok(None),
    }
}

/// Signed in with an admin profile, or 401/403.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let user = current_user(state, headers).await?;
    let profile = {
        let db = state.lock_db()?;
        queries::get_profile(&db, &user.id)?
    };
    match profile {
        Some(p) if p.role == Role::Admin => Ok(user),
        _ => Err(AppError::Forbidden("admin access required".to_string())),
    }
}

/// The customer profile a first-time user gets.
pub fn customer_profile(user: &AuthUser, full_name: &str, phone: &str) -> Profile {
    Profile {
        id: user.id.clone(),
        full_name: full_name.to_string(),
        phone: phone.to_string(),
        email: user.email.clone(),
        role: Role::Customer,
    }
}

/// Creates the caller's profile on first contact. Existing profiles, and
/// their roles, are not touched.
pub fn ensure_profile_for(
    state: &AppState,
    user: &AuthUser,
    full_name: &str,
    phone: &str,
) -> Result<(), AppError> {
    let db = state.lock_db()?;
    let created = queries::ensure_profile(&db, &customer_profile(user, full_name, phone))?;
    if created {
        tracing::info!(user_id = %user.id, "profile created");
    }
    Ok(())
}
