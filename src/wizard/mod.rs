//! The customer-facing booking flow: pick a service, a barber, a date and
//! time, enter contact details, submit. One implementation serves both the
//! full booking page and the quick-book modal.
//!
//! The wizard holds no transport. Slot lists and submissions go through a
//! [`BookingClient`]; [`client::HttpBookingClient`] talks to this service's
//! HTTP API.

pub mod client;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{Appointment, Barber, CustomerContact, Service};
use crate::services::availability::SlotView;
use crate::services::booking::BookingRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Service = 1,
    Barber = 2,
    DateTime = 3,
    CustomerInfo = 4,
}

impl Stage {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Option<Stage> {
        match self {
            Stage::Service => Some(Stage::Barber),
            Stage::Barber => Some(Stage::DateTime),
            Stage::DateTime => Some(Stage::CustomerInfo),
            Stage::CustomerInfo => None,
        }
    }

    fn prev(self) -> Option<Stage> {
        match self {
            Stage::Service => None,
            Stage::Barber => Some(Stage::Service),
            Stage::DateTime => Some(Stage::Barber),
            Stage::CustomerInfo => Some(Stage::DateTime),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    SelectingService,
    SelectingBarber,
    SelectingDateTime,
    EnteringCustomerInfo,
    Submitting,
    Succeeded,
    /// Submission failed; the draft is kept at the customer-info stage.
    Failed,
}

impl WizardState {
    fn editing(stage: Stage) -> Self {
        match stage {
            Stage::Service => WizardState::SelectingService,
            Stage::Barber => WizardState::SelectingBarber,
            Stage::DateTime => WizardState::SelectingDateTime,
            Stage::CustomerInfo => WizardState::EnteringCustomerInfo,
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            WizardState::SelectingService => Stage::Service,
            WizardState::SelectingBarber => Stage::Barber,
            WizardState::SelectingDateTime => Stage::DateTime,
            WizardState::EnteringCustomerInfo
            | WizardState::Submitting
            | WizardState::Succeeded
            | WizardState::Failed => Stage::CustomerInfo,
        }
    }
}

/// Where the wizard is rendered. Behaviour is identical; the context only
/// labels logs and lets the caller pick its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationContext {
    Page,
    Modal,
}

impl PresentationContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationContext::Page => "page",
            PresentationContext::Modal => "modal",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingDraft {
    pub service: Option<Service>,
    pub barber: Option<Barber>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub contact: CustomerContact,
    pub notes: Option<String>,
}

/// Slots as last fetched, and the selection they were fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub barber_id: String,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("stage {} incomplete: {}", .stage.number(), .fields.join(", "))]
pub struct StageError {
    pub stage: Stage,
    pub fields: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestFailure {
    #[error("that time is no longer available, please pick another time")]
    SlotTaken,

    /// The server refused the details as given.
    #[error("{0}")]
    Rejected(String),

    #[error("payment could not be authorized: {0}")]
    Payment(String),

    #[error("booking failed, please try again: {0}")]
    Unavailable(String),
}

impl RequestFailure {
    /// The stage the customer should go to before trying again.
    pub fn retry_stage(&self) -> Stage {
        match self {
            RequestFailure::SlotTaken => Stage::DateTime,
            _ => Stage::CustomerInfo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub client_secret: String,
}

#[async_trait]
pub trait BookingClient: Send + Sync {
    async fn fetch_slots(
        &self,
        barber_id: &str,
        date: NaiveDate,
        duration_minutes: i32,
    ) -> Result<Vec<SlotView>, RequestFailure>;

    async fn submit_booking(&self, request: &BookingRequest) -> Result<BookingConfirmation, RequestFailure>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Moved(Stage),
    /// The draft is complete and now in flight; send this request.
    Submit(BookingRequest),
    /// A submission is already in flight, or the booking already succeeded.
    Ignored,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Booked(BookingConfirmation),
    Invalid(StageError),
    Failed(RequestFailure),
    Ignored,
}

pub struct BookingWizard {
    context: PresentationContext,
    state: WizardState,
    draft: BookingDraft,
    slots: Option<SlotSnapshot>,
    confirmation: Option<BookingConfirmation>,
    last_error: Option<RequestFailure>,
}

impl BookingWizard {
    pub fn new(context: PresentationContext) -> Self {
        Self {
            context,
            state: WizardState::SelectingService,
            draft: BookingDraft::default(),
            slots: None,
            confirmation: None,
            last_error: None,
        }
    }

    pub fn context(&self) -> PresentationContext {
        self.context
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn slots(&self) -> Option<&SlotSnapshot> {
        self.slots.as_ref()
    }

    pub fn confirmation(&self) -> Option<&BookingConfirmation> {
        self.confirmation.as_ref()
    }

    pub fn last_error(&self) -> Option<&RequestFailure> {
        self.last_error.as_ref()
    }

    fn invalidate_time(&mut self) {
        self.draft.time = None;
        self.slots = None;
    }

    /// A different duration changes which slots are free, so the chosen time
    /// and the slot list are dropped.
    pub fn select_service(&mut self, service: Service) {
        if self.state == WizardState::Submitting {
            return;
        }
        let duration_changed = self
            .draft
            .service
            .as_ref()
            .is_some_and(|current| current.duration_minutes != service.duration_minutes);
        if duration_changed {
            self.invalidate_time();
        }
        self.draft.service = Some(service);
    }

    pub fn select_barber(&mut self, barber: Barber) {
        if self.state == WizardState::Submitting {
            return;
        }
        let changed = self
            .draft
            .barber
            .as_ref()
            .is_some_and(|current| current.id != barber.id);
        if changed {
            self.invalidate_time();
        }
        self.draft.barber = Some(barber);
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        if self.state == WizardState::Submitting {
            return;
        }
        if self.draft.date != Some(date) {
            self.invalidate_time();
        }
        self.draft.date = Some(date);
    }

    pub fn select_time(&mut self, time: NaiveTime) {
        if self.state == WizardState::Submitting {
            return;
        }
        self.draft.time = Some(time);
    }

    /// The in-flight request was built from the draft, so edits are ignored
    /// until it settles.
    pub fn set_contact(&mut self, contact: CustomerContact) {
        if self.state == WizardState::Submitting {
            return;
        }
        self.draft.contact = contact;
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        if self.state == WizardState::Submitting {
            return;
        }
        self.draft.notes = notes;
    }

    /// The (barber, date, duration) a slot list must be fetched for, once all
    /// three are chosen.
    pub fn slot_query(&self) -> Option<(String, NaiveDate, i32)> {
        let service = self.draft.service.as_ref()?;
        let barber = self.draft.barber.as_ref()?;
        let date = self.draft.date?;
        Some((barber.id.clone(), date, service.duration_minutes))
    }

    /// Stores a fetched slot list. Returns false, and drops the list, when it
    /// no longer matches the current selection.
    pub fn load_slots(
        &mut self,
        barber_id: &str,
        date: NaiveDate,
        duration_minutes: i32,
        slots: Vec<SlotView>,
    ) -> bool {
        let current = self.slot_query();
        if current.as_ref() != Some(&(barber_id.to_string(), date, duration_minutes)) {
            return false;
        }
        self.slots = Some(SlotSnapshot {
            barber_id: barber_id.to_string(),
            date,
            duration_minutes,
            slots,
        });
        true
    }

    pub fn validate_stage(&self, stage: Stage) -> Result<(), StageError> {
        let mut fields = vec![];
        match stage {
            Stage::Service => {
                if self.draft.service.is_none() {
                    fields.push("service");
                }
            }
            Stage::Barber => {
                if self.draft.barber.is_none() {
                    fields.push("barber");
                }
            }
            Stage::DateTime => {
                if self.draft.date.is_none() {
                    fields.push("date");
                }
                match self.draft.time {
                    None => fields.push("time"),
                    Some(time) => {
                        let fresh = self
                            .slots
                            .as_ref()
                            .filter(|snap| {
                                self.slot_query().as_ref()
                                    == Some(&(snap.barber_id.clone(), snap.date, snap.duration_minutes))
                            });
                        match fresh {
                            None => fields.push("slots"),
                            Some(snap) => {
                                let available =
                                    snap.slots.iter().any(|s| s.time == time && s.available);
                                if !available {
                                    fields.push("time");
                                }
                            }
                        }
                    }
                }
            }
            Stage::CustomerInfo => fields.extend(self.draft.contact.invalid_fields()),
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(StageError { stage, fields })
        }
    }

    fn build_request(&self) -> Option<BookingRequest> {
        let service = self.draft.service.as_ref()?;
        let barber = self.draft.barber.as_ref()?;
        let contact = self.draft.contact.trimmed();
        Some(BookingRequest {
            barber_id: barber.id.clone(),
            service_id: service.id.clone(),
            customer_name: contact.name,
            customer_phone: contact.phone,
            customer_email: contact.email,
            appointment_date: self.draft.date?.format("%Y-%m-%d").to_string(),
            appointment_time: self.draft.time?.format("%H:%M").to_string(),
            notes: self.draft.notes.clone(),
        })
    }

    /// Moves forward one stage after validating the current one. On the last
    /// stage this starts the submission instead.
    pub fn advance(&mut self) -> Result<Advance, StageError> {
        match self.state {
            WizardState::Submitting | WizardState::Succeeded => Ok(Advance::Ignored),
            WizardState::EnteringCustomerInfo | WizardState::Failed => self.begin_submit(),
            state => {
                let stage = state.stage();
                self.validate_stage(stage)?;
                let next = stage.next().unwrap_or(stage);
                self.state = WizardState::editing(next);
                tracing::debug!(context = self.context.as_str(), stage = next.number(), "wizard advanced");
                Ok(Advance::Moved(next))
            }
        }
    }

    /// Back one stage. Selections made on later stages are kept.
    pub fn retreat(&mut self) {
        let stage = match self.state {
            WizardState::Submitting | WizardState::Succeeded => return,
            state => state.stage(),
        };
        if let Some(prev) = stage.prev() {
            self.state = WizardState::editing(prev);
        }
    }

    /// Puts the draft in flight. At most one submission runs per draft, so a
    /// second call while the first is pending is ignored.
    pub fn begin_submit(&mut self) -> Result<Advance, StageError> {
        if matches!(self.state, WizardState::Submitting | WizardState::Succeeded) {
            return Ok(Advance::Ignored);
        }

        for stage in [Stage::Service, Stage::Barber, Stage::DateTime, Stage::CustomerInfo] {
            self.validate_stage(stage)?;
        }
        let request = match self.build_request() {
            Some(request) => request,
            None => {
                return Err(StageError {
                    stage: Stage::Service,
                    fields: vec!["service"],
                })
            }
        };

        self.state = WizardState::Submitting;
        self.last_error = None;
        tracing::debug!(context = self.context.as_str(), "booking submitted");
        Ok(Advance::Submit(request))
    }

    /// Records the server's answer to the in-flight submission. Failures
    /// leave the draft in place for a retry. A lost slot drops the chosen
    /// time and the slot list, so the date/time stage needs a fresh list.
    pub fn finish_submit(&mut self, result: Result<BookingConfirmation, RequestFailure>) {
        if self.state != WizardState::Submitting {
            return;
        }
        match result {
            Ok(confirmation) => {
                self.state = WizardState::Succeeded;
                self.confirmation = Some(confirmation);
            }
            Err(failure) => {
                if failure == RequestFailure::SlotTaken {
                    self.invalidate_time();
                }
                tracing::debug!(context = self.context.as_str(), error = %failure, "booking failed");
                self.state = WizardState::Failed;
                self.last_error = Some(failure);
            }
        }
    }

    /// Clears every selection and returns to the first stage.
    pub fn reset(&mut self) {
        *self = Self::new(self.context);
    }

    /// Fetches slots for the current selection.
    pub async fn refresh_slots<C: BookingClient + ?Sized>(&mut self, client: &C) -> Result<(), RequestFailure> {
        let Some((barber_id, date, duration)) = self.slot_query() else {
            return Ok(());
        };
        let slots = client.fetch_slots(&barber_id, date, duration).await?;
        self.load_slots(&barber_id, date, duration, slots);
        Ok(())
    }

    /// Validates and sends the draft, then records the result.
    pub async fn submit<C: BookingClient + ?Sized>(&mut self, client: &C) -> SubmitOutcome {
        let request = match self.begin_submit() {
            Ok(Advance::Submit(request)) => request,
            Ok(_) => return SubmitOutcome::Ignored,
            Err(e) => return SubmitOutcome::Invalid(e),
        };

        let result = client.submit_booking(&request).await;
        let outcome = match &result {
            Ok(confirmation) => SubmitOutcome::Booked(confirmation.clone()),
            Err(failure) => SubmitOutcome::Failed(failure.clone()),
        };
        self.finish_submit(result);
        outcome
    }
}
