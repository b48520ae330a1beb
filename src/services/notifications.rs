use crate::db::queries;
use crate::errors::NotificationError;
use crate::models::{Appointment, Service};
use crate::services::availability::display_time;
use crate::state::AppState;

fn confirmation_text(shop_name: &str, appt: &Appointment, service: &Service) -> String {
    format!(
        "{shop_name}: your {} appointment is booked for {} at {}. See you soon!",
        service.name,
        appt.appointment_date.format("%a %b %-d"),
        display_time(appt.appointment_time),
    )
}

/// Sends the booking confirmation by SMS and email. Best effort: failures are
/// logged and the appointment is left as it is, apart from the sent flags.
pub async fn dispatch_booking_notifications(state: &AppState, appt: &Appointment, service: &Service) {
    let body = confirmation_text(&state.config.shop_name, appt, service);
    let subject = format!("Appointment Confirmation - {}", state.config.shop_name);

    let sms_sent = match state.sms.send_message(&appt.customer_phone, &body).await {
        Ok(()) => true,
        Err(source) => {
            let err = NotificationError {
                channel: "sms",
                recipient: appt.customer_phone.clone(),
                source,
            };
            tracing::warn!(appointment_id = %appt.id, error = %err, "notification failed");
            false
        }
    };

    let email_body = format!("{body}\n\nPrice: {}", service.price_display());
    let email_sent = match state.email.send_email(&appt.customer_email, &subject, &email_body).await {
        Ok(()) => true,
        Err(source) => {
            let err = NotificationError {
                channel: "email",
                recipient: appt.customer_email.clone(),
                source,
            };
            tracing::warn!(appointment_id = %appt.id, error = %err, "notification failed");
            false
        }
    };

    let recorded = state
        .lock_db()
        .map_err(anyhow::Error::from)
        .and_then(|db| queries::set_notifications_sent(&db, &appt.id, sms_sent, email_sent));
    if let Err(e) = recorded {
        tracing::warn!(appointment_id = %appt.id, error = %e, "failed to record notification flags");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    use crate::models::AppointmentStatus;

    #[test]
    fn test_confirmation_text() {
        let now = Utc::now().naive_utc();
        let appt = Appointment {
            id: "a1".to_string(),
            user_id: None,
            barber_id: "b1".to_string(),
            service_id: "s1".to_string(),
            customer_name: "Jay".to_string(),
            customer_phone: "555-0100".to_string(),
            customer_email: "jay@example.com".to_string(),
            appointment_date: NaiveDate::from_ymd_opt(2025, 6, 17).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            duration_minutes: 30,
            price_cents: 3500,
            status: AppointmentStatus::Pending,
            payment_reference: None,
            notes: None,
            sms_sent: false,
            email_sent: false,
            created_at: now,
            updated_at: now,
        };
        let service = Service {
            id: "s1".to_string(),
            name: "Skin Fade".to_string(),
            description: String::new(),
            duration_minutes: 30,
            price_cents: 3500,
            is_active: true,
            display_order: 0,
        };

        assert_eq!(
            confirmation_text("West Coast Kutz", &appt, &service),
            "West Coast Kutz: your Skin Fade appointment is booked for Tue Jun 17 at 2:30 PM. See you soon!"
        );
    }
}
