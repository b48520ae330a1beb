//! Slot availability. The same predicate serves the slot list shown to
//! customers and the re-check made when a booking is submitted.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::models::appointment::hhmm;
use crate::models::{Appointment, ShopSchedule};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotView {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub display: String,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotVerdict {
    Available,
    /// Overlaps an active appointment of the same barber.
    Occupied,
    /// Not a slot the shop offers at all: closed day, past, outside hours or
    /// off the slot grid.
    Unbookable(String),
}

/// Half-open interval overlap: back-to-back appointments do not collide.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_minutes: i32,
    b_start: NaiveDateTime,
    b_minutes: i32,
) -> bool {
    let a_end = a_start + Duration::minutes(a_minutes as i64);
    let b_end = b_start + Duration::minutes(b_minutes as i64);
    a_start < b_end && b_start < a_end
}

/// True when `[date time, +duration)` intersects no active appointment in
/// `existing`. Callers pass one barber's appointments.
pub fn is_slot_free(
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
    existing: &[Appointment],
) -> bool {
    let start = date.and_time(time);
    !existing.iter().any(|appt| {
        appt.status.is_active()
            && overlaps(start, duration_minutes, appt.starts_at(), appt.duration_minutes)
    })
}

/// Bookable start times for one barber on `date`. Closed and past dates give
/// an empty list; on the current date, times at or before `now` are left out.
/// Remaining slots are flagged unavailable when they overlap `existing`.
pub fn compute_available_slots(
    schedule: &ShopSchedule,
    date: NaiveDate,
    duration_minutes: i32,
    existing: &[Appointment],
    now: NaiveDateTime,
) -> Vec<SlotView> {
    if schedule.is_closed(date) || date < now.date() {
        return vec![];
    }

    schedule
        .candidate_times(duration_minutes)
        .into_iter()
        .filter(|time| date.and_time(*time) > now)
        .map(|time| SlotView {
            time,
            display: display_time(time),
            available: is_slot_free(date, time, duration_minutes, existing),
        })
        .collect()
}

/// Verdict for a single requested slot. Overlap is checked first so that a
/// clash is always reported as such, even for an off-grid time.
pub fn evaluate_slot(
    schedule: &ShopSchedule,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
    existing: &[Appointment],
    now: NaiveDateTime,
) -> SlotVerdict {
    if !is_slot_free(date, time, duration_minutes, existing) {
        return SlotVerdict::Occupied;
    }

    let offered = compute_available_slots(schedule, date, duration_minutes, existing, now)
        .into_iter()
        .any(|slot| slot.time == time && slot.available);
    if offered {
        return SlotVerdict::Available;
    }

    let reason = if schedule.is_closed(date) {
        "the shop is closed on that day".to_string()
    } else if date.and_time(time) <= now {
        "that time has already passed".to_string()
    } else if !schedule.is_on_grid(time) {
        format!("appointments start every {} minutes", schedule.slot_minutes)
    } else {
        format!(
            "that time is outside business hours ({})",
            schedule.to_human_readable()
        )
    };
    SlotVerdict::Unbookable(reason)
}

/// Slot list for a barber straight from storage.
pub fn available_slots_for_barber(
    conn: &Connection,
    schedule: &ShopSchedule,
    barber_id: &str,
    date: NaiveDate,
    duration_minutes: i32,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<SlotView>> {
    let existing = queries::active_appointments_for_barber_on(conn, barber_id, date)?;
    Ok(compute_available_slots(
        schedule,
        date,
        duration_minutes,
        &existing,
        now,
    ))
}

/// `2:30 PM` style label.
pub fn display_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}
