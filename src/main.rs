use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use barberbook::config::AppConfig;
use barberbook::db;
use barberbook::router::build_router;
use barberbook::services::auth::supabase::SupabaseAuthProvider;
use barberbook::services::messaging::log::LogOnlyProvider;
use barberbook::services::messaging::sendgrid::SendGridEmailProvider;
use barberbook::services::messaging::twilio::TwilioSmsProvider;
use barberbook::services::messaging::{EmailProvider, MessagingProvider};
use barberbook::services::payments::stripe::StripePaymentProvider;
use barberbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let conn = db::init_db(&config.database_url)?;

    anyhow::ensure!(
        !config.supabase_url.is_empty() && !config.supabase_anon_key.is_empty(),
        "SUPABASE_URL and SUPABASE_ANON_KEY must be set"
    );
    anyhow::ensure!(!config.stripe_secret_key.is_empty(), "STRIPE_SECRET_KEY must be set");

    let sms: Box<dyn MessagingProvider> = if config.twilio_account_sid.is_empty() {
        tracing::warn!("twilio not configured, sms confirmations will only be logged");
        Box::new(LogOnlyProvider)
    } else {
        Box::new(TwilioSmsProvider::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
        ))
    };
    let email: Box<dyn EmailProvider> = if config.sendgrid_api_key.is_empty() {
        tracing::warn!("sendgrid not configured, email confirmations will only be logged");
        Box::new(LogOnlyProvider)
    } else {
        Box::new(SendGridEmailProvider::new(
            config.sendgrid_api_key.clone(),
            config.notify_from_email.clone(),
        ))
    };

    tracing::info!(hours = %config.schedule.to_human_readable(), "schedule loaded");

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        auth: Box::new(SupabaseAuthProvider::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        )),
        payments: Box::new(StripePaymentProvider::new(config.stripe_secret_key.clone())),
        sms,
        email,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
