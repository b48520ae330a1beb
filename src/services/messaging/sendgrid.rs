use anyhow::Context;
use async_trait::async_trait;

use super::EmailProvider;

pub struct SendGridEmailProvider {
    api_key: String,
    from_email: String,
    client: reqwest::Client,
}

impl SendGridEmailProvider {
    pub fn new(api_key: String, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailProvider for SendGridEmailProvider {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_email },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        self.client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to send SendGrid email")?
            .error_for_status()
            .context("SendGrid API returned error")?;

        Ok(())
    }
}
