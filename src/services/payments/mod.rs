pub mod stripe;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A reserved charge: capturable later, or voidable before settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentAuthorization {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_authorization(
        &self,
        amount_minor_units: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> anyhow::Result<PaymentAuthorization>;

    async fn cancel_authorization(&self, id: &str) -> anyhow::Result<()>;
}
