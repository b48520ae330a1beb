use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Barber, Service};
use crate::services::availability::{self, SlotView};
use crate::state::AppState;

// GET /api/config
#[derive(Serialize)]
pub struct PublicConfig {
    shop_name: String,
    hours: String,
    slot_minutes: u32,
    currency: String,
    supabase_url: String,
    supabase_anon_key: String,
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<PublicConfig> {
    let config = &state.config;
    Json(PublicConfig {
        shop_name: config.shop_name.clone(),
        hours: config.schedule.to_human_readable(),
        slot_minutes: config.schedule.slot_minutes,
        currency: config.payment_currency.clone(),
        supabase_url: config.supabase_url.clone(),
        supabase_anon_key: config.supabase_anon_key.clone(),
    })
}

// GET /api/services
pub async fn list_services(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.lock_db()?;
    Ok(Json(queries::list_services(&db, true)?))
}

// GET /api/barbers
pub async fn list_barbers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Barber>>, AppError> {
    let db = state.lock_db()?;
    Ok(Json(queries::list_active_barbers(&db)?))
}

// GET /api/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub barber_id: Option<String>,
    pub date: Option<String>,
    pub duration_minutes: Option<i32>,
}

#[derive(Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub slots: Vec<SlotView>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let barber_id = query
        .barber_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("barber_id is required".to_string()))?;
    let date = query
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| AppError::Validation("date must be YYYY-MM-DD".to_string()))?;
    let duration = query
        .duration_minutes
        .ok_or_else(|| AppError::Validation("duration_minutes is required".to_string()))?;
    if duration <= 0 {
        return Err(AppError::Validation("duration_minutes must be positive".to_string()));
    }

    let now = state.config.shop_now();
    let slots = {
        let db = state.lock_db()?;
        availability::available_slots_for_barber(
            &db,
            &state.config.schedule,
            barber_id.trim(),
            date,
            duration,
            now,
        )?
    };

    Ok(Json(AvailabilityResponse { slots }))
}
