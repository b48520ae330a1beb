use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{PaymentAuthorization, PaymentProvider};

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Payment intents with manual capture, so creating one only authorizes.
pub struct StripePaymentProvider {
    secret_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
}

impl StripePaymentProvider {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            base_url: STRIPE_API.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    async fn create_authorization(
        &self,
        amount_minor_units: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> anyhow::Result<PaymentAuthorization> {
        anyhow::ensure!(!self.secret_key.is_empty(), "STRIPE_SECRET_KEY is not configured");

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor_units.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("capture_method".to_string(), "manual".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let intent: PaymentIntent = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("failed to reach Stripe")?
            .error_for_status()
            .context("Stripe rejected payment intent")?
            .json()
            .await
            .context("unexpected Stripe response")?;

        tracing::info!(payment_intent = %intent.id, amount_minor_units, "payment authorization created");

        Ok(PaymentAuthorization {
            client_secret: intent.client_secret.unwrap_or_default(),
            id: intent.id,
        })
    }

    async fn cancel_authorization(&self, id: &str) -> anyhow::Result<()> {
        self.client
            .post(format!("{}/payment_intents/{id}/cancel", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to reach Stripe")?
            .error_for_status()
            .context("Stripe refused to cancel payment intent")?;

        tracing::info!(payment_intent = %id, "payment authorization cancelled");
        Ok(())
    }
}
