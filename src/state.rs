use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::auth::AuthProvider;
use crate::services::messaging::{EmailProvider, MessagingProvider};
use crate::services::payments::PaymentProvider;

pub struct AppState {
    /// Single writer for the appointment table: slot checks and inserts happen
    /// under one acquisition of this lock.
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub auth: Box<dyn AuthProvider>,
    pub payments: Box<dyn PaymentProvider>,
    pub sms: Box<dyn MessagingProvider>,
    pub email: Box<dyn EmailProvider>,
}

impl AppState {
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
