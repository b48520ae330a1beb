use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{BookingClient, BookingConfirmation, RequestFailure};
use crate::services::availability::SlotView;
use crate::services::booking::BookingRequest;

/// Talks to `/api/availability` and `/api/bookings` over HTTP.
pub struct HttpBookingClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SlotsBody {
    slots: Vec<SlotView>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

impl HttpBookingClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Bookings made through this client are linked to the signed-in account.
    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Maps a non-success response onto what the customer can do about it.
async fn failure_from(res: reqwest::Response) -> RequestFailure {
    let status = res.status();
    let body: ErrorBody = res.json().await.unwrap_or_default();
    let msg = if body.error.is_empty() {
        status.to_string()
    } else {
        body.error
    };
    match status {
        StatusCode::CONFLICT => RequestFailure::SlotTaken,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => RequestFailure::Rejected(msg),
        StatusCode::BAD_GATEWAY => RequestFailure::Payment(msg),
        _ => RequestFailure::Unavailable(msg),
    }
}

#[async_trait]
impl BookingClient for HttpBookingClient {
    async fn fetch_slots(
        &self,
        barber_id: &str,
        date: NaiveDate,
        duration_minutes: i32,
    ) -> Result<Vec<SlotView>, RequestFailure> {
        let date = date.format("%Y-%m-%d").to_string();
        let duration = duration_minutes.to_string();
        let res = self
            .client
            .get(format!("{}/api/availability", self.base_url))
            .query(&[
                ("barber_id", barber_id),
                ("date", date.as_str()),
                ("duration_minutes", duration.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RequestFailure::Unavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(failure_from(res).await);
        }
        let body: SlotsBody = res
            .json()
            .await
            .map_err(|e| RequestFailure::Unavailable(e.to_string()))?;
        Ok(body.slots)
    }

    async fn submit_booking(&self, request: &BookingRequest) -> Result<BookingConfirmation, RequestFailure> {
        let res = self
            .authorize(self.client.post(format!("{}/api/bookings", self.base_url)))
            .json(request)
            .send()
            .await
            .map_err(|e| RequestFailure::Unavailable(e.to_string()))?;

        if res.status() != StatusCode::CREATED {
            let failure = failure_from(res).await;
            tracing::warn!(error = %failure, "booking request failed");
            return Err(failure);
        }
        res.json()
            .await
            .map_err(|e| RequestFailure::Unavailable(e.to_string()))
    }
}
