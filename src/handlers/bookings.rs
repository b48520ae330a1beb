use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::auth;
use crate::errors::AppError;
use crate::models::Appointment;
use crate::services::booking::{self, BookingRequest};
use crate::services::notifications;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    appointment: Appointment,
    client_secret: String,
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let account = auth::optional_user(&state, &headers)
        .await?
        .map(|user| auth::customer_profile(&user, req.customer_name.trim(), req.customer_phone.trim()));

    let outcome = booking::submit_booking(&state, &req, account.as_ref()).await?;

    let notify_state = Arc::clone(&state);
    let appointment = outcome.appointment.clone();
    let service = outcome.service;
    tokio::spawn(async move {
        notifications::dispatch_booking_notifications(&notify_state, &appointment, &service).await;
    });

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            appointment: outcome.appointment,
            client_secret: outcome.client_secret,
        }),
    ))
}
