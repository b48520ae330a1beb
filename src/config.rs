use std::env;

use chrono::{Duration, NaiveDateTime, Utc};

use crate::models::ShopSchedule;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub shop_name: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub stripe_secret_key: String,
    pub payment_currency: String,
    pub schedule: ShopSchedule,
    /// Shop local time offset from UTC, used to decide which slots are past.
    pub utc_offset_minutes: i32,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub sendgrid_api_key: String,
    pub notify_from_email: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let schedule = ShopSchedule::parse(
            &env::var("SHOP_OPENS_AT").unwrap_or_else(|_| "09:00".to_string()),
            &env::var("SHOP_CLOSES_AT").unwrap_or_else(|_| "18:00".to_string()),
            env::var("SLOT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            &env::var("CLOSED_DAYS").unwrap_or_else(|_| "sun,mon".to_string()),
        )?;

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "barberbook.db".to_string()),
            shop_name: env::var("SHOP_NAME").unwrap_or_else(|_| "West Coast Kutz".to_string()),
            supabase_url: env::var("SUPABASE_URL").unwrap_or_default(),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            schedule,
            utc_offset_minutes: env::var("SHOP_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            notify_from_email: env::var("NOTIFY_FROM_EMAIL").unwrap_or_default(),
        })
    }

    /// Current wall-clock time in the shop's timezone.
    pub fn shop_now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::minutes(self.utc_offset_minutes as i64)
    }
}
