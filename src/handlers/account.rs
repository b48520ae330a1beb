use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::contact::is_valid_email;
use crate::models::{Appointment, Profile};
use crate::services::auth::{AuthProviderError, AuthSession};
use crate::services::booking;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    user_id: String,
    email: String,
    access_token: String,
    linked_appointments: usize,
}

fn provider_error(err: AuthProviderError) -> AppError {
    match err {
        AuthProviderError::Rejected(msg) => AppError::Auth(msg),
        AuthProviderError::Unavailable(e) => AppError::Internal(e),
    }
}

/// Local profile plus any guest bookings made under the same address.
fn adopt_session(
    state: &AppState,
    session: AuthSession,
    full_name: &str,
    phone: &str,
) -> Result<SessionResponse, AppError> {
    auth::ensure_profile_for(state, &session.user, full_name, phone)?;
    let linked = {
        let db = state.lock_db()?;
        queries::link_guest_appointments(&db, &session.user.id, &session.user.email)?
    };
    if linked > 0 {
        tracing::info!(user_id = %session.user.id, linked, "linked guest appointments");
    }

    Ok(SessionResponse {
        user_id: session.user.id,
        email: session.user.email,
        access_token: session.access_token,
        linked_appointments: linked,
    })
}

// POST /api/auth/signup
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let email = req.email.trim();
    if !is_valid_email(email) {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    if req.password.len() < 6 {
        return Err(AppError::Validation("password must be at least 6 characters".to_string()));
    }

    let session = state
        .auth
        .sign_up(email, &req.password, req.full_name.trim(), req.phone.trim())
        .await
        .map_err(|e| match e {
            AuthProviderError::Rejected(msg) => AppError::Validation(msg),
            other => provider_error(other),
        })?;
    let response = adopt_session(&state, session, req.full_name.trim(), req.phone.trim())?;
    Ok((StatusCode::CREATED, Json(response)))
}

// POST /api/auth/signin
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("email and password are required".to_string()));
    }

    let session = state
        .auth
        .sign_in(req.email.trim(), &req.password)
        .await
        .map_err(provider_error)?;
    Ok(Json(adopt_session(&state, session, "", "")?))
}

// POST /api/auth/reset-password
#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = req.email.trim();
    if !is_valid_email(email) {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    state.auth.reset_password(email).await.map_err(|e| match e {
        AuthProviderError::Rejected(msg) => AppError::Validation(msg),
        other => provider_error(other),
    })?;
    tracing::info!("password reset requested");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// PUT /api/account/profile
#[derive(Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let user = auth::current_user(&state, &headers).await?;
    let full_name = req.full_name.trim();
    let phone = req.phone.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("full_name is required".to_string()));
    }

    let db = state.lock_db()?;
    queries::ensure_profile(&db, &auth::customer_profile(&user, full_name, phone))?;
    queries::update_profile(&db, &user.id, full_name, phone)?;
    let profile = queries::get_profile(&db, &user.id)?
        .ok_or_else(|| AppError::NotFound("profile".to_string()))?;
    Ok(Json(profile))
}

// GET /api/account/appointments
pub async fn my_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let user = auth::current_user(&state, &headers).await?;
    let db = state.lock_db()?;
    Ok(Json(queries::appointments_for_user(&db, &user.id, &user.email)?))
}

// POST /api/account/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let user = auth::current_user(&state, &headers).await?;
    let db = state.lock_db()?;
    let appointment = booking::cancel_own_appointment(&db, &user.id, &user.email, &id)?;
    Ok(Json(appointment))
}
