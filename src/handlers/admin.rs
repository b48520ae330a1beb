use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::require_admin;
use crate::db::queries::{self, AppointmentDetail, DashboardStats};
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, Barber, Profile, Service};
use crate::services::booking::{self, AppointmentEdit, BookingRequest};
use crate::state::AppState;

// GET /api/admin/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Service>>, AppError> {
    require_admin(&state, &headers).await?;
    let db = state.lock_db()?;
    Ok(Json(queries::list_services(&db, false)?))
}

// POST /api/admin/services, PUT /api/admin/services/:id
#[derive(Deserialize)]
pub struct ServicePayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub price_cents: Option<i64>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl ServicePayload {
    fn apply(self, service: &mut Service) {
        if let Some(name) = self.name {
            service.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            service.description = description;
        }
        if let Some(minutes) = self.duration_minutes {
            service.duration_minutes = minutes;
        }
        if let Some(cents) = self.price_cents {
            service.price_cents = cents;
        }
        if let Some(order) = self.display_order {
            service.display_order = order;
        }
        if let Some(active) = self.is_active {
            service.is_active = active;
        }
    }
}

fn validate_service(service: &Service) -> Result<(), AppError> {
    if service.name.is_empty() {
        return Err(AppError::Validation("service name is required".to_string()));
    }
    if service.duration_minutes <= 0 {
        return Err(AppError::Validation("duration_minutes must be positive".to_string()));
    }
    if service.price_cents < 0 {
        return Err(AppError::Validation("price_cents cannot be negative".to_string()));
    }
    Ok(())
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ServicePayload>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    require_admin(&state, &headers).await?;

    let mut service = Service {
        id: Uuid::new_v4().to_string(),
        name: String::new(),
        description: String::new(),
        duration_minutes: 0,
        price_cents: 0,
        is_active: true,
        display_order: 0,
    };
    body.apply(&mut service);
    validate_service(&service)?;

    let db = state.lock_db()?;
    queries::create_service(&db, &service)?;
    tracing::info!(service_id = %service.id, name = %service.name, "service created");
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ServicePayload>,
) -> Result<Json<Service>, AppError> {
    require_admin(&state, &headers).await?;

    let db = state.lock_db()?;
    let mut service = queries::get_service(&db, &id)?
        .ok_or_else(|| AppError::NotFound("service".to_string()))?;
    body.apply(&mut service);
    validate_service(&service)?;
    queries::update_service(&db, &service)?;
    Ok(Json(service))
}

// DELETE /api/admin/services/:id
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &headers).await?;

    let db = state.lock_db()?;
    if queries::get_service(&db, &id)?.is_none() {
        return Err(AppError::NotFound("service".to_string()));
    }
    if queries::service_has_appointments(&db, &id)? {
        return Err(AppError::Validation(
            "cannot delete a service with appointments; deactivate it instead".to_string(),
        ));
    }
    queries::delete_service(&db, &id)?;
    tracing::info!(service_id = %id, "service deleted");
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/admin/barbers
pub async fn list_barbers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Barber>>, AppError> {
    require_admin(&state, &headers).await?;
    let db = state.lock_db()?;
    Ok(Json(queries::list_active_barbers(&db)?))
}

// POST /api/admin/barbers
#[derive(Deserialize)]
pub struct BarberPayload {
    pub name: String,
    #[serde(default)]
    pub nickname: String,
}

pub async fn create_barber(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BarberPayload>,
) -> Result<(StatusCode, Json<Barber>), AppError> {
    require_admin(&state, &headers).await?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("barber name is required".to_string()));
    }
    let barber = Barber {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        nickname: body.nickname.trim().to_string(),
        is_active: true,
    };

    let db = state.lock_db()?;
    queries::create_barber(&db, &barber)?;
    Ok((StatusCode::CREATED, Json(barber)))
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<AppointmentDetail>>, AppError> {
    require_admin(&state, &headers).await?;

    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        Some(d) => Some(
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| AppError::Validation("date must be YYYY-MM-DD".to_string()))?,
        ),
        None => None,
    };
    let status = match query.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let db = state.lock_db()?;
    let details = queries::list_appointment_details(&db, date, status, query.limit.unwrap_or(100))?;
    Ok(Json(details))
}

// POST /api/admin/appointments
#[derive(Deserialize)]
pub struct NewAppointment {
    #[serde(flatten)]
    pub booking: BookingRequest,
    pub status: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    require_admin(&state, &headers).await?;

    let status = match body.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => AppointmentStatus::parse(s)
            .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        None => AppointmentStatus::Confirmed,
    };
    let now = state.config.shop_now();
    let mut db = state.lock_db()?;
    let appointment =
        booking::admin_create_appointment(&mut db, &state.config.schedule, now, &body.booking, status)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

// PUT /api/admin/appointments/:id
pub async fn edit_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(edit): Json<AppointmentEdit>,
) -> Result<Json<Appointment>, AppError> {
    require_admin(&state, &headers).await?;

    let now = state.config.shop_now();
    let mut db = state.lock_db()?;
    Ok(Json(booking::edit_appointment(&mut db, &state.config.schedule, now, &id, &edit)?))
}

// PUT /api/admin/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Appointment>, AppError> {
    require_admin(&state, &headers).await?;

    let next = AppointmentStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status: {}", body.status)))?;
    let db = state.lock_db()?;
    Ok(Json(booking::change_status(&db, &id, next)?))
}

// GET /api/admin/customers
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Profile>>, AppError> {
    require_admin(&state, &headers).await?;
    let db = state.lock_db()?;
    Ok(Json(queries::list_customers(&db)?))
}

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    require_admin(&state, &headers).await?;

    let today = state.config.shop_now().date();
    let db = state.lock_db()?;
    Ok(Json(queries::get_dashboard_stats(&db, today)?))
}
