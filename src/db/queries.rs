use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;

use crate::models::{Appointment, AppointmentStatus, Barber, Profile, Role, Service};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn now_str() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FMT).to_string()
}

/// True when the error is the storage layer rejecting a duplicate key, such
/// as a second active appointment in the same barber/date/time slot.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ── Services ──

const SERVICE_COLUMNS: &str =
    "id, name, description, duration_minutes, price_cents, is_active, display_order";

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        duration_minutes: row.get(3)?,
        price_cents: row.get(4)?,
        is_active: row.get(5)?,
        display_order: row.get(6)?,
    })
}

pub fn list_services(conn: &Connection, active_only: bool) -> anyhow::Result<Vec<Service>> {
    let sql = if active_only {
        format!("SELECT {SERVICE_COLUMNS} FROM services WHERE is_active = 1 ORDER BY display_order ASC, name ASC")
    } else {
        format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY display_order ASC, name ASC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
            params![id],
            parse_service_row,
        )
        .optional()?;
    Ok(service)
}

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, description, duration_minutes, price_cents, is_active, display_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id,
            service.name,
            service.description,
            service.duration_minutes,
            service.price_cents,
            service.is_active,
            service.display_order,
        ],
    )?;
    Ok(())
}

pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET name = ?1, description = ?2, duration_minutes = ?3, price_cents = ?4,
         is_active = ?5, display_order = ?6, updated_at = ?7 WHERE id = ?8",
        params![
            service.name,
            service.description,
            service.duration_minutes,
            service.price_cents,
            service.is_active,
            service.display_order,
            now_str(),
            service.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn service_has_appointments(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE service_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn delete_service(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Barbers ──

fn parse_barber_row(row: &rusqlite::Row) -> rusqlite::Result<Barber> {
    Ok(Barber {
        id: row.get(0)?,
        name: row.get(1)?,
        nickname: row.get(2)?,
        is_active: row.get(3)?,
    })
}

pub fn list_active_barbers(conn: &Connection) -> anyhow::Result<Vec<Barber>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, nickname, is_active FROM barbers WHERE is_active = 1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], parse_barber_row)?;

    let mut barbers = vec![];
    for row in rows {
        barbers.push(row?);
    }
    Ok(barbers)
}

pub fn get_barber(conn: &Connection, id: &str) -> anyhow::Result<Option<Barber>> {
    let barber = conn
        .query_row(
            "SELECT id, name, nickname, is_active FROM barbers WHERE id = ?1",
            params![id],
            parse_barber_row,
        )
        .optional()?;
    Ok(barber)
}

pub fn create_barber(conn: &Connection, barber: &Barber) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO barbers (id, name, nickname, is_active) VALUES (?1, ?2, ?3, ?4)",
        params![barber.id, barber.name, barber.nickname, barber.is_active],
    )?;
    Ok(())
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "a.id, a.user_id, a.barber_id, a.service_id, a.customer_name, \
     a.customer_phone, a.customer_email, a.appointment_date, a.appointment_time, a.duration_minutes, \
     a.price_cents, a.status, a.payment_reference, a.notes, a.sms_sent, a.email_sent, \
     a.created_at, a.updated_at";

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(7)?;
    let time_str: String = row.get(8)?;
    let status_str: String = row.get(11)?;
    let created_at_str: String = row.get(16)?;
    let updated_at_str: String = row.get(17)?;

    let appointment_date = NaiveDate::parse_from_str(&date_str, DATE_FMT)?;
    let appointment_time = NaiveTime::parse_from_str(&time_str, TIME_FMT)?;
    let status = AppointmentStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown appointment status: {status_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        barber_id: row.get(2)?,
        service_id: row.get(3)?,
        customer_name: row.get(4)?,
        customer_phone: row.get(5)?,
        customer_email: row.get(6)?,
        appointment_date,
        appointment_time,
        duration_minutes: row.get(9)?,
        price_cents: row.get(10)?,
        status,
        payment_reference: row.get(12)?,
        notes: row.get(13)?,
        sms_sent: row.get(14)?,
        email_sent: row.get(15)?,
        created_at,
        updated_at,
    })
}

fn collect_appointments(
    stmt: &mut rusqlite::Statement,
    params: impl rusqlite::Params,
) -> anyhow::Result<Vec<Appointment>> {
    let rows = stmt.query_map(params, |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Raw rusqlite result so callers can tell a slot-uniqueness violation apart
/// from other failures.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, user_id, barber_id, service_id, customer_name, customer_phone,
         customer_email, appointment_date, appointment_time, duration_minutes, price_cents, status,
         payment_reference, notes, sms_sent, email_sent, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            appt.id,
            appt.user_id,
            appt.barber_id,
            appt.service_id,
            appt.customer_name,
            appt.customer_phone,
            appt.customer_email,
            appt.appointment_date.format(DATE_FMT).to_string(),
            appt.appointment_time.format(TIME_FMT).to_string(),
            appt.duration_minutes,
            appt.price_cents,
            appt.status.as_str(),
            appt.payment_reference,
            appt.notes,
            appt.sms_sent,
            appt.email_sent,
            appt.created_at.format(TIMESTAMP_FMT).to_string(),
            appt.updated_at.format(TIMESTAMP_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1"
    ))?;
    Ok(collect_appointments(&mut stmt, params![id])?.into_iter().next())
}

/// Every non-cancelled appointment of one barber on one date, by start time.
pub fn active_appointments_for_barber_on(
    conn: &Connection,
    barber_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.barber_id = ?1 AND a.appointment_date = ?2 AND a.status != 'cancelled'
         ORDER BY a.appointment_time ASC"
    ))?;
    collect_appointments(&mut stmt, params![barber_id, date.format(DATE_FMT).to_string()])
}

/// Only a live booking takes the reference; a hold cancelled meanwhile
/// reports `false`.
pub fn set_payment_reference(conn: &Connection, id: &str, reference: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET payment_reference = ?1, updated_at = ?2
         WHERE id = ?3 AND status IN ('pending', 'confirmed')",
        params![reference, now_str(), id],
    )?;
    Ok(count > 0)
}

/// Removes a provisional hold: a pending row with no payment recorded. Rows
/// that were cancelled or confirmed in the meantime are left alone.
pub fn delete_hold(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM appointments
         WHERE id = ?1 AND status = 'pending' AND payment_reference IS NULL",
        params![id],
    )?;
    Ok(count > 0)
}

/// Rewrites the editable columns of an existing appointment. Raw rusqlite
/// result, like `insert_appointment`, so slot-uniqueness violations show.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET barber_id = ?1, service_id = ?2, customer_name = ?3,
         customer_phone = ?4, customer_email = ?5, appointment_date = ?6, appointment_time = ?7,
         duration_minutes = ?8, price_cents = ?9, notes = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            appt.barber_id,
            appt.service_id,
            appt.customer_name,
            appt.customer_phone,
            appt.customer_email,
            appt.appointment_date.format(DATE_FMT).to_string(),
            appt.appointment_time.format(TIME_FMT).to_string(),
            appt.duration_minutes,
            appt.price_cents,
            appt.notes,
            now_str(),
            appt.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

pub fn set_notifications_sent(
    conn: &Connection,
    id: &str,
    sms_sent: bool,
    email_sent: bool,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE appointments SET sms_sent = ?1, email_sent = ?2, updated_at = ?3 WHERE id = ?4",
        params![sms_sent, email_sent, now_str(), id],
    )?;
    Ok(())
}

/// The account's appointments, plus guest bookings made under its email that
/// no account has claimed yet.
pub fn appointments_for_user(
    conn: &Connection,
    user_id: &str,
    email: &str,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.user_id = ?1 OR (a.user_id IS NULL AND lower(a.customer_email) = lower(?2))
         ORDER BY a.appointment_date DESC, a.appointment_time DESC"
    ))?;
    collect_appointments(&mut stmt, params![user_id, email])
}

/// Attaches guest bookings made with `email` to the account `user_id`.
pub fn link_guest_appointments(conn: &Connection, user_id: &str, email: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE appointments SET user_id = ?1, updated_at = ?2
         WHERE user_id IS NULL AND lower(customer_email) = lower(?3)",
        params![user_id, now_str(), email],
    )?;
    Ok(count)
}

/// Admin listing row: the appointment plus the names it references.
#[derive(Debug, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub barber_name: String,
    pub barber_nickname: String,
    pub service_name: String,
}

pub fn list_appointment_details(
    conn: &Connection,
    date: Option<NaiveDate>,
    status: Option<AppointmentStatus>,
    limit: i64,
) -> anyhow::Result<Vec<AppointmentDetail>> {
    let date_str = date.map(|d| d.format(DATE_FMT).to_string());
    let status_str = status.map(|s| s.as_str());

    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS}, COALESCE(b.name, 'Unknown Barber'), COALESCE(b.nickname, ''),
                COALESCE(s.name, 'Unknown Service')
         FROM appointments a
         LEFT JOIN barbers b ON b.id = a.barber_id
         LEFT JOIN services s ON s.id = a.service_id
         WHERE (?1 IS NULL OR a.appointment_date = ?1)
           AND (?2 IS NULL OR a.status = ?2)
         ORDER BY a.appointment_date DESC, a.appointment_time DESC
         LIMIT ?3"
    ))?;

    let rows = stmt.query_map(params![date_str, status_str, limit], |row| {
        Ok((
            parse_appointment_row(row),
            row.get::<_, String>(18)?,
            row.get::<_, String>(19)?,
            row.get::<_, String>(20)?,
        ))
    })?;

    let mut details = vec![];
    for row in rows {
        let (appointment, barber_name, barber_nickname, service_name) = row?;
        details.push(AppointmentDetail {
            appointment: appointment?,
            barber_name,
            barber_nickname,
            service_name,
        });
    }
    Ok(details)
}

// ── Profiles ──

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<Profile>> {
    let profile = conn
        .query_row(
            "SELECT id, full_name, phone, email, role FROM profiles WHERE id = ?1",
            params![id],
            |row| {
                let role: String = row.get(4)?;
                Ok(Profile {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    phone: row.get(2)?,
                    email: row.get(3)?,
                    role: Role::parse(&role),
                })
            },
        )
        .optional()?;
    Ok(profile)
}

/// Creates the profile if it does not exist yet. An existing profile,
/// including its role, is left untouched.
pub fn ensure_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT INTO profiles (id, full_name, phone, email, role) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO NOTHING",
        params![
            profile.id,
            profile.full_name,
            profile.phone,
            profile.email,
            profile.role.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn update_profile(conn: &Connection, id: &str, full_name: &str, phone: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE profiles SET full_name = ?1, phone = ?2 WHERE id = ?3",
        params![full_name, phone, id],
    )?;
    Ok(count > 0)
}

/// Customer profiles, newest first.
pub fn list_customers(conn: &Connection) -> anyhow::Result<Vec<Profile>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, phone, email, role FROM profiles
         WHERE role = 'customer'
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        let role: String = row.get(4)?;
        Ok(Profile {
            id: row.get(0)?,
            full_name: row.get(1)?,
            phone: row.get(2)?,
            email: row.get(3)?,
            role: Role::parse(&role),
        })
    })?;

    let mut customers = vec![];
    for row in rows {
        customers.push(row?);
    }
    Ok(customers)
}

// ── Dashboard ──

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub today_appointments: i64,
    pub total_customers: i64,
    pub monthly_revenue_cents: i64,
    pub pending_appointments: i64,
}

pub fn get_dashboard_stats(conn: &Connection, today: NaiveDate) -> anyhow::Result<DashboardStats> {
    let today_str = today.format(DATE_FMT).to_string();
    let month_start = today
        .with_day(1)
        .unwrap_or(today)
        .format(DATE_FMT)
        .to_string();

    let today_appointments: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE appointment_date = ?1 AND status != 'cancelled'",
        params![today_str],
        |row| row.get(0),
    )?;

    let total_customers: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT lower(customer_email)) FROM appointments",
        [],
        |row| row.get(0),
    )?;

    let monthly_revenue_cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(price_cents), 0) FROM appointments
         WHERE appointment_date >= ?1 AND appointment_date <= ?2
           AND status IN ('confirmed', 'completed')",
        params![month_start, today_str],
        |row| row.get(0),
    )?;

    let pending_appointments: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        today_appointments,
        total_customers,
        monthly_revenue_cents,
        pending_appointments,
    })
}
