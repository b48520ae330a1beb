use async_trait::async_trait;

use super::{EmailProvider, MessagingProvider};

/// Stand-in sender used when no SMS or email credentials are configured:
/// the message is written to the log and counts as delivered.
pub struct LogOnlyProvider;

#[async_trait]
impl MessagingProvider for LogOnlyProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, body = %body, "sms (not sent, no provider configured)");
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for LogOnlyProvider {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "email (not sent, no provider configured)");
        Ok(())
    }
}
