//! Booking submission and appointment lifecycle.
//!
//! A submission first takes a provisional hold on the slot (an appointment
//! row in `pending` with no payment reference) under the database lock, then
//! authorizes payment with the lock released, then records the authorization
//! on the hold. Every failure after the hold undoes what came before it.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::appointment::hhmm;
use crate::models::{Appointment, AppointmentStatus, CustomerContact, Profile, Service, ShopSchedule};
use crate::services::availability::{evaluate_slot, SlotVerdict};
use crate::state::AppState;

/// Body of `POST /api/bookings`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BookingRequest {
    #[serde(default)]
    pub barber_id: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub appointment_date: String,
    #[serde(default)]
    pub appointment_time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub service: Service,
    pub client_secret: String,
}

struct ValidatedRequest {
    barber_id: String,
    service_id: String,
    contact: CustomerContact,
    date: NaiveDate,
    time: NaiveTime,
    notes: Option<String>,
}

fn validate_request(req: &BookingRequest) -> Result<ValidatedRequest, AppError> {
    let barber_id = req.barber_id.trim();
    let service_id = req.service_id.trim();
    if barber_id.is_empty()
        || service_id.is_empty()
        || req.appointment_date.trim().is_empty()
        || req.appointment_time.trim().is_empty()
    {
        return Err(AppError::Validation("missing required fields".to_string()));
    }

    let contact = CustomerContact {
        name: req.customer_name.clone(),
        phone: req.customer_phone.clone(),
        email: req.customer_email.clone(),
    }
    .trimmed();
    let invalid = contact.invalid_fields();
    if !invalid.is_empty() {
        return Err(AppError::Validation(format!(
            "invalid customer details: {}",
            invalid.join(", ")
        )));
    }

    let date = NaiveDate::parse_from_str(req.appointment_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("appointment_date must be YYYY-MM-DD".to_string()))?;
    let time = hhmm::parse_time(req.appointment_time.trim())
        .ok_or_else(|| AppError::Validation("appointment_time must be HH:MM".to_string()))?;

    let notes = req
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(ValidatedRequest {
        barber_id: barber_id.to_string(),
        service_id: service_id.to_string(),
        contact,
        date,
        time,
        notes,
    })
}

fn active_service(conn: &Connection, id: &str) -> Result<Service, AppError> {
    queries::get_service(conn, id)?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::Validation("invalid service".to_string()))
}

fn ensure_active_barber(conn: &Connection, id: &str) -> Result<(), AppError> {
    queries::get_barber(conn, id)?
        .filter(|b| b.is_active)
        .map(|_| ())
        .ok_or_else(|| AppError::Validation("invalid barber".to_string()))
}

fn check_slot(
    schedule: &ShopSchedule,
    now: NaiveDateTime,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
    existing: &[Appointment],
) -> Result<(), AppError> {
    match evaluate_slot(schedule, date, time, duration_minutes, existing, now) {
        SlotVerdict::Available => Ok(()),
        SlotVerdict::Occupied => Err(AppError::SlotConflict),
        SlotVerdict::Unbookable(reason) => Err(AppError::Validation(reason)),
    }
}

fn slot_write_error(e: rusqlite::Error) -> AppError {
    if queries::is_unique_violation(&e) {
        AppError::SlotConflict
    } else {
        AppError::Database(e)
    }
}

/// Checks the slot and inserts the row in one immediate transaction, so no
/// other writer can slip in between the check and the insert. The booking
/// account's profile is created in the same transaction, so a rejected
/// booking leaves nothing behind.
fn reserve_slot(
    conn: &mut Connection,
    schedule: &ShopSchedule,
    now: NaiveDateTime,
    req: &ValidatedRequest,
    account: Option<&Profile>,
    status: AppointmentStatus,
) -> Result<(Appointment, Service), AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let service = active_service(&tx, &req.service_id)?;
    ensure_active_barber(&tx, &req.barber_id)?;

    let existing = queries::active_appointments_for_barber_on(&tx, &req.barber_id, req.date)?;
    check_slot(schedule, now, req.date, req.time, service.duration_minutes, &existing)?;

    if let Some(profile) = account {
        if queries::ensure_profile(&tx, profile)? {
            tracing::info!(user_id = %profile.id, "profile created");
        }
    }

    let created_at = Utc::now().naive_utc();
    let appointment = Appointment {
        id: Uuid::new_v4().to_string(),
        user_id: account.map(|p| p.id.clone()),
        barber_id: req.barber_id.clone(),
        service_id: service.id.clone(),
        customer_name: req.contact.name.clone(),
        customer_phone: req.contact.phone.clone(),
        customer_email: req.contact.email.clone(),
        appointment_date: req.date,
        appointment_time: req.time,
        duration_minutes: service.duration_minutes,
        price_cents: service.price_cents,
        status,
        payment_reference: None,
        notes: req.notes.clone(),
        sms_sent: false,
        email_sent: false,
        created_at,
        updated_at: created_at,
    };

    queries::insert_appointment(&tx, &appointment).map_err(slot_write_error)?;
    tx.commit()?;

    Ok((appointment, service))
}

fn release_hold(state: &AppState, appointment_id: &str) {
    let released = state
        .lock_db()
        .map_err(anyhow::Error::from)
        .and_then(|db| queries::delete_hold(&db, appointment_id));
    if let Err(e) = released {
        tracing::error!(appointment_id = %appointment_id, error = %e, "failed to release slot hold");
    }
}

/// Records the reference and returns the row as stored now, since an admin
/// may have confirmed it while payment was in flight.
fn record_authorization(state: &AppState, appointment_id: &str, reference: &str) -> anyhow::Result<Appointment> {
    let db = state.lock_db()?;
    let updated = queries::set_payment_reference(&db, appointment_id, reference)?;
    anyhow::ensure!(
        updated,
        "appointment {appointment_id} was cancelled or removed before payment was recorded"
    );
    queries::get_appointment(&db, appointment_id)?
        .ok_or_else(|| anyhow::anyhow!("appointment {appointment_id} vanished after payment was recorded"))
}

/// Validates, secures the slot, authorizes payment and records it. The
/// returned appointment carries the payment reference. A hold cancelled
/// while payment was in flight fails the submission and voids the charge.
pub async fn submit_booking(
    state: &AppState,
    req: &BookingRequest,
    account: Option<&Profile>,
) -> Result<BookingOutcome, AppError> {
    let req = validate_request(req)?;
    let now = state.config.shop_now();

    let (appointment, service) = {
        let mut db = state.lock_db()?;
        reserve_slot(
            &mut db,
            &state.config.schedule,
            now,
            &req,
            account,
            AppointmentStatus::Pending,
        )?
    };
    tracing::info!(
        appointment_id = %appointment.id,
        barber_id = %appointment.barber_id,
        date = %appointment.appointment_date,
        time = %appointment.appointment_time.format("%H:%M"),
        "slot held"
    );

    let mut metadata = BTreeMap::new();
    metadata.insert("appointment_id".to_string(), appointment.id.clone());
    metadata.insert("customer_name".to_string(), appointment.customer_name.clone());
    metadata.insert("customer_email".to_string(), appointment.customer_email.clone());
    metadata.insert("service_name".to_string(), service.name.clone());
    metadata.insert("appointment_date".to_string(), appointment.appointment_date.to_string());
    metadata.insert(
        "appointment_time".to_string(),
        appointment.appointment_time.format("%H:%M").to_string(),
    );

    let authorization = match state
        .payments
        .create_authorization(appointment.price_cents, &state.config.payment_currency, &metadata)
        .await
    {
        Ok(auth) => auth,
        Err(e) => {
            tracing::error!(appointment_id = %appointment.id, error = %e, "payment authorization failed");
            release_hold(state, &appointment.id);
            return Err(AppError::Payment(
                "could not authorize payment, no booking was made".to_string(),
            ));
        }
    };

    let appointment = match record_authorization(state, &appointment.id, &authorization.id) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!(appointment_id = %appointment.id, error = %e, "failed to persist booking");
            if let Err(cancel_err) = state.payments.cancel_authorization(&authorization.id).await {
                tracing::error!(
                    payment_reference = %authorization.id,
                    error = %cancel_err,
                    "failed to void payment authorization"
                );
            }
            release_hold(state, &appointment.id);
            return Err(AppError::BookingPersistFailed);
        }
    };
    tracing::info!(appointment_id = %appointment.id, "booking created");

    Ok(BookingOutcome {
        appointment,
        service,
        client_secret: authorization.client_secret,
    })
}

/// Moves an appointment to `next` if its lifecycle allows it.
pub fn change_status(
    conn: &Connection,
    appointment_id: &str,
    next: AppointmentStatus,
) -> Result<Appointment, AppError> {
    let mut appointment = queries::get_appointment(conn, appointment_id)?
        .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;

    if !appointment.status.can_transition_to(next) {
        return Err(AppError::Validation(format!(
            "cannot change a {} appointment to {}",
            appointment.status.as_str(),
            next.as_str()
        )));
    }

    queries::update_appointment_status(conn, appointment_id, next)?;
    appointment.status = next;
    tracing::info!(appointment_id = %appointment_id, status = next.as_str(), "appointment status changed");
    Ok(appointment)
}

/// Appointments created by staff: same slot rules and transaction as a
/// customer booking, but no payment and no notifications.
pub fn admin_create_appointment(
    conn: &mut Connection,
    schedule: &ShopSchedule,
    now: NaiveDateTime,
    req: &BookingRequest,
    status: AppointmentStatus,
) -> Result<Appointment, AppError> {
    if !matches!(status, AppointmentStatus::Pending | AppointmentStatus::Confirmed) {
        return Err(AppError::Validation(
            "new appointments must be pending or confirmed".to_string(),
        ));
    }
    let req = validate_request(req)?;
    let (appointment, _) = reserve_slot(conn, schedule, now, &req, None, status)?;
    tracing::info!(appointment_id = %appointment.id, "appointment created by admin");
    Ok(appointment)
}

/// Fields an admin may change on an existing appointment. Status has its own
/// endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentEdit {
    pub barber_id: Option<String>,
    pub service_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub notes: Option<String>,
}

/// Applies `edit` and re-checks the slot against every other active
/// appointment of the barber, in one immediate transaction. A service change
/// copies the new service's duration and price.
pub fn edit_appointment(
    conn: &mut Connection,
    schedule: &ShopSchedule,
    now: NaiveDateTime,
    appointment_id: &str,
    edit: &AppointmentEdit,
) -> Result<Appointment, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut appt = queries::get_appointment(&tx, appointment_id)?
        .ok_or_else(|| AppError::NotFound("appointment".to_string()))?;
    if matches!(appt.status, AppointmentStatus::Cancelled | AppointmentStatus::Completed) {
        return Err(AppError::Validation(format!(
            "cannot edit a {} appointment",
            appt.status.as_str()
        )));
    }
    let before = (appt.barber_id.clone(), appt.appointment_date, appt.appointment_time, appt.duration_minutes);

    if let Some(barber_id) = edit.barber_id.as_deref().map(str::trim) {
        ensure_active_barber(&tx, barber_id)?;
        appt.barber_id = barber_id.to_string();
    }
    if let Some(service_id) = edit.service_id.as_deref().map(str::trim) {
        if service_id != appt.service_id {
            let service = active_service(&tx, service_id)?;
            appt.service_id = service.id;
            appt.duration_minutes = service.duration_minutes;
            appt.price_cents = service.price_cents;
        }
    }
    if let Some(date) = edit.appointment_date.as_deref() {
        appt.appointment_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::Validation("appointment_date must be YYYY-MM-DD".to_string()))?;
    }
    if let Some(time) = edit.appointment_time.as_deref() {
        appt.appointment_time = hhmm::parse_time(time.trim())
            .ok_or_else(|| AppError::Validation("appointment_time must be HH:MM".to_string()))?;
    }

    let contact = CustomerContact {
        name: edit.customer_name.clone().unwrap_or_else(|| appt.customer_name.clone()),
        phone: edit.customer_phone.clone().unwrap_or_else(|| appt.customer_phone.clone()),
        email: edit.customer_email.clone().unwrap_or_else(|| appt.customer_email.clone()),
    }
    .trimmed();
    let invalid = contact.invalid_fields();
    if !invalid.is_empty() {
        return Err(AppError::Validation(format!(
            "invalid customer details: {}",
            invalid.join(", ")
        )));
    }
    appt.customer_name = contact.name;
    appt.customer_phone = contact.phone;
    appt.customer_email = contact.email;
    if let Some(notes) = &edit.notes {
        let notes = notes.trim();
        appt.notes = (!notes.is_empty()).then(|| notes.to_string());
    }

    let after = (appt.barber_id.clone(), appt.appointment_date, appt.appointment_time, appt.duration_minutes);
    if after != before {
        let others: Vec<Appointment> =
            queries::active_appointments_for_barber_on(&tx, &appt.barber_id, appt.appointment_date)?
                .into_iter()
                .filter(|a| a.id != appt.id)
                .collect();
        check_slot(
            schedule,
            now,
            appt.appointment_date,
            appt.appointment_time,
            appt.duration_minutes,
            &others,
        )?;
    }

    queries::update_appointment(&tx, &appt).map_err(slot_write_error)?;
    tx.commit()?;
    tracing::info!(appointment_id = %appt.id, "appointment edited by admin");
    Ok(appt)
}

/// Customer-initiated cancellation. The caller owns an appointment linked to
/// their account, or an unclaimed guest booking under their email.
pub fn cancel_own_appointment(
    conn: &Connection,
    user_id: &str,
    email: &str,
    appointment_id: &str,
) -> Result<Appointment, AppError> {
    let owned = queries::get_appointment(conn, appointment_id)?.is_some_and(|a| match a.user_id.as_deref() {
        Some(owner) => owner == user_id,
        None => !email.is_empty() && a.customer_email.eq_ignore_ascii_case(email),
    });
    if !owned {
        return Err(AppError::NotFound("appointment".to_string()));
    }
    change_status(conn, appointment_id, AppointmentStatus::Cancelled)
}
