use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/config", get(handlers::public::get_config))
        .route("/api/services", get(handlers::public::list_services))
        .route("/api/barbers", get(handlers::public::list_barbers))
        .route("/api/availability", get(handlers::public::get_availability))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/auth/signup", post(handlers::account::sign_up))
        .route("/api/auth/signin", post(handlers::account::sign_in))
        .route(
            "/api/auth/reset-password",
            post(handlers::account::reset_password),
        )
        .route("/api/account/profile", put(handlers::account::update_profile))
        .route(
            "/api/account/appointments",
            get(handlers::account::my_appointments),
        )
        .route(
            "/api/account/appointments/:id/cancel",
            post(handlers::account::cancel_appointment),
        )
        .route(
            "/api/admin/services",
            get(handlers::admin::list_services).post(handlers::admin::create_service),
        )
        .route(
            "/api/admin/services/:id",
            put(handlers::admin::update_service).delete(handlers::admin::delete_service),
        )
        .route(
            "/api/admin/barbers",
            get(handlers::admin::list_barbers).post(handlers::admin::create_barber),
        )
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments).post(handlers::admin::create_appointment),
        )
        .route(
            "/api/admin/appointments/:id",
            put(handlers::admin::edit_appointment),
        )
        .route(
            "/api/admin/appointments/:id/status",
            put(handlers::admin::update_appointment_status),
        )
        .route("/api/admin/customers", get(handlers::admin::list_customers))
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
