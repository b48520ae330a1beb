use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use tower::ServiceExt;

use barberbook::config::AppConfig;
use barberbook::db::{self, queries};
use barberbook::models::{Barber, Profile, Role, Service, ShopSchedule};
use barberbook::router::build_router;
use barberbook::services::auth::{AuthProvider, AuthProviderError, AuthSession, AuthUser};
use barberbook::services::messaging::{EmailProvider, MessagingProvider};
use barberbook::services::payments::{PaymentAuthorization, PaymentProvider};
use barberbook::state::AppState;

// ── Mock Providers ──

/// Tokens are `token-<user id>`; the user's email is `<user id>@example.com`.
#[derive(Default)]
struct MockAuth {
    resets: Arc<Mutex<Vec<String>>>,
}

fn mock_user(id: &str) -> AuthUser {
    AuthUser {
        id: id.to_string(),
        email: format!("{id}@example.com"),
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _full_name: &str,
        _phone: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        let id = email.split('@').next().unwrap_or_default();
        Ok(AuthSession {
            user: AuthUser {
                id: id.to_string(),
                email: email.to_string(),
            },
            access_token: format!("token-{id}"),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError> {
        if password != "hunter22" {
            return Err(AuthProviderError::Rejected("Invalid login credentials".to_string()));
        }
        let id = email.split('@').next().unwrap_or_default();
        Ok(AuthSession {
            user: mock_user(id),
            access_token: format!("token-{id}"),
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthProviderError> {
        match access_token.strip_prefix("token-") {
            Some(id) => Ok(mock_user(id)),
            None => Err(AuthProviderError::Rejected("invalid JWT".to_string())),
        }
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthProviderError> {
        self.resets.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct PaymentLog {
    created: AtomicUsize,
    cancelled: Mutex<Vec<String>>,
}

struct MockPayments {
    log: Arc<PaymentLog>,
    fail: bool,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_authorization(
        &self,
        amount_minor_units: i64,
        _currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> anyhow::Result<PaymentAuthorization> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail {
            anyhow::bail!("card declined");
        }
        assert!(metadata.contains_key("appointment_id"));
        let n = self.log.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentAuthorization {
            id: format!("pi_{n}_{amount_minor_units}"),
            client_secret: format!("pi_{n}_secret"),
        })
    }

    async fn cancel_authorization(&self, id: &str) -> anyhow::Result<()> {
        self.log.cancelled.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// Authorizes normally, but an admin cancels the hold while the processor is
/// still answering.
struct CancelledMidPayment {
    db: Arc<Mutex<rusqlite::Connection>>,
    log: Arc<PaymentLog>,
}

#[async_trait]
impl PaymentProvider for CancelledMidPayment {
    async fn create_authorization(
        &self,
        amount_minor_units: i64,
        _currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> anyhow::Result<PaymentAuthorization> {
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "UPDATE appointments SET status = 'cancelled' WHERE id = ?1",
                [&metadata["appointment_id"]],
            )?;
        }
        let n = self.log.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentAuthorization {
            id: format!("pi_{n}_{amount_minor_units}"),
            client_secret: format!("pi_{n}_secret"),
        })
    }

    async fn cancel_authorization(&self, id: &str) -> anyhow::Result<()> {
        self.log.cancelled.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Outbox {
    sms: Arc<Mutex<Vec<(String, String)>>>,
    email: Arc<Mutex<Vec<(String, String)>>>,
}

struct MockSms(Outbox);

#[async_trait]
impl MessagingProvider for MockSms {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.0.sms.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}

struct MockEmail(Outbox);

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send_email(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.0.email.lock().unwrap().push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        shop_name: "West Coast Kutz".to_string(),
        supabase_url: "https://auth.example.com".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        stripe_secret_key: String::new(),
        payment_currency: "usd".to_string(),
        schedule: ShopSchedule::default(),
        utc_offset_minutes: 0,
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(),
        twilio_phone_number: String::new(),
        sendgrid_api_key: String::new(),
        notify_from_email: String::new(),
    }
}

struct Harness {
    state: Arc<AppState>,
    payments: Arc<PaymentLog>,
    outbox: Outbox,
    resets: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_payments(false)
    }

    fn with_payments(fail: bool) -> Self {
        Self::with_payment_provider(|_, log| Box::new(MockPayments { log, fail }))
    }

    fn with_payment_provider(
        make: impl FnOnce(Arc<Mutex<rusqlite::Connection>>, Arc<PaymentLog>) -> Box<dyn PaymentProvider>,
    ) -> Self {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn);
        let db = Arc::new(Mutex::new(conn));
        let payments = Arc::new(PaymentLog::default());
        let outbox = Outbox::default();
        let auth = MockAuth::default();
        let resets = Arc::clone(&auth.resets);
        let state = Arc::new(AppState {
            db: Arc::clone(&db),
            config: test_config(),
            auth: Box::new(auth),
            payments: make(db, Arc::clone(&payments)),
            sms: Box::new(MockSms(outbox.clone())),
            email: Box::new(MockEmail(outbox.clone())),
        });
        Self {
            state,
            payments,
            outbox,
            resets,
        }
    }

    fn profile(&self, id: &str) -> Option<Profile> {
        let db = self.state.db.lock().unwrap();
        queries::get_profile(&db, id).unwrap()
    }

    fn app(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    fn appointment_count(&self) -> i64 {
        let db = self.state.db.lock().unwrap();
        db.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
            .unwrap()
    }
}

fn seed(conn: &rusqlite::Connection) {
    queries::create_barber(
        conn,
        &Barber {
            id: "barber-1".to_string(),
            name: "Marcus".to_string(),
            nickname: "The Blade".to_string(),
            is_active: true,
        },
    )
    .unwrap();
    for (id, name, minutes, cents, order) in [
        ("svc-cut", "Classic Cut", 30, 3000, 1),
        ("svc-fade", "Skin Fade", 60, 4500, 2),
    ] {
        queries::create_service(
            conn,
            &Service {
                id: id.to_string(),
                name: name.to_string(),
                description: String::new(),
                duration_minutes: minutes,
                price_cents: cents,
                is_active: true,
                display_order: order,
            },
        )
        .unwrap();
    }
    queries::ensure_profile(
        conn,
        &Profile {
            id: "boss".to_string(),
            full_name: "Shop Owner".to_string(),
            phone: String::new(),
            email: "boss@example.com".to_string(),
            role: Role::Admin,
        },
    )
    .unwrap();
}

/// A Tuesday at least a week out, so the shop is open and nothing is past.
fn open_day() -> NaiveDate {
    let mut day = Utc::now().date_naive() + chrono::Duration::days(7);
    while day.weekday() != Weekday::Tue {
        day += chrono::Duration::days(1);
    }
    day
}

fn booking_body(service_id: &str, date: NaiveDate, time: &str) -> serde_json::Value {
    serde_json::json!({
        "barber_id": "barber-1",
        "service_id": service_id,
        "customer_name": "Jay Smith",
        "customer_phone": "555-0100",
        "customer_email": "jay@example.com",
        "appointment_date": date.format("%Y-%m-%d").to_string(),
        "appointment_time": time,
    })
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn read_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn book(h: &Harness, service_id: &str, date: NaiveDate, time: &str) -> (StatusCode, serde_json::Value) {
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            None,
            &booking_body(service_id, date, time),
        ))
        .await
        .unwrap();
    let status = res.status();
    (status, read_json(res).await)
}

// ── Public catalogue ──

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let res = h.app().oneshot(get_request("/api/health", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["status"], "ok");
}

#[tokio::test]
async fn test_catalogue_lists_active_entries() {
    let h = Harness::new();
    {
        let db = h.state.db.lock().unwrap();
        let mut fade = queries::get_service(&db, "svc-fade").unwrap().unwrap();
        fade.is_active = false;
        queries::update_service(&db, &fade).unwrap();
    }

    let res = h.app().oneshot(get_request("/api/services", None)).await.unwrap();
    let services = read_json(res).await;
    assert_eq!(services.as_array().unwrap().len(), 1);
    assert_eq!(services[0]["name"], "Classic Cut");

    let res = h.app().oneshot(get_request("/api/barbers", None)).await.unwrap();
    let barbers = read_json(res).await;
    assert_eq!(barbers[0]["nickname"], "The Blade");

    let res = h.app().oneshot(get_request("/api/config", None)).await.unwrap();
    let config = read_json(res).await;
    assert_eq!(config["supabase_anon_key"], "anon-key");
    assert!(config.get("stripe_secret_key").is_none());
}

#[tokio::test]
async fn test_availability_reflects_bookings() {
    let h = Harness::new();
    let day = open_day();
    let (status, _) = book(&h, "svc-cut", day, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!(
        "/api/availability?barber_id=barber-1&date={}&duration_minutes=60",
        day.format("%Y-%m-%d")
    );
    let res = h.app().oneshot(get_request(&uri, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    let slots = json["slots"].as_array().unwrap();

    let slot = |time: &str| slots.iter().find(|s| s["time"] == time).unwrap().clone();
    assert_eq!(slot("09:00")["available"], true);
    assert_eq!(slot("09:30")["available"], false);
    assert_eq!(slot("10:00")["available"], false);
    assert_eq!(slot("10:30")["available"], true);
    assert_eq!(slot("10:30")["display"], "10:30 AM");
    // A 60 minute service cannot start at 17:30 and still end by closing.
    assert_eq!(slots.last().unwrap()["time"], "17:00");
}

#[tokio::test]
async fn test_availability_closed_day_is_empty() {
    let h = Harness::new();
    let monday = open_day() - chrono::Duration::days(1);
    let uri = format!(
        "/api/availability?barber_id=barber-1&date={}&duration_minutes=30",
        monday.format("%Y-%m-%d")
    );
    let res = h.app().oneshot(get_request(&uri, None)).await.unwrap();
    assert_eq!(read_json(res).await["slots"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_availability_requires_duration() {
    let h = Harness::new();
    let uri = format!(
        "/api/availability?barber_id=barber-1&date={}",
        open_day().format("%Y-%m-%d")
    );
    let res = h.app().oneshot(get_request(&uri, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(res).await["error"].as_str().unwrap().contains("duration_minutes"));
}

#[tokio::test]
async fn test_availability_requires_valid_date() {
    let h = Harness::new();
    let res = h
        .app()
        .oneshot(get_request("/api/availability?barber_id=barber-1&date=tomorrow", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ── Booking submission ──

#[tokio::test]
async fn test_booking_succeeds_and_notifies() {
    let h = Harness::new();
    let day = open_day();
    let (status, json) = book(&h, "svc-fade", day, "14:00").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["client_secret"], "pi_1_secret");
    assert_eq!(json["appointment"]["status"], "pending");
    assert_eq!(json["appointment"]["price_cents"], 4500);
    assert_eq!(json["appointment"]["duration_minutes"], 60);
    assert_eq!(json["appointment"]["payment_reference"], "pi_1_4500");
    assert_eq!(json["appointment"]["appointment_time"], "14:00");

    let mut waited = 0;
    while h.outbox.sms.lock().unwrap().is_empty() && waited < 50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 1;
    }
    let sms = h.outbox.sms.lock().unwrap().clone();
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].0, "555-0100");
    assert!(sms[0].1.contains("Skin Fade"));
    assert!(sms[0].1.contains("2:00 PM"));
}

#[tokio::test]
async fn test_overlapping_booking_conflicts_and_back_to_back_succeeds() {
    let h = Harness::new();
    let day = open_day();
    assert_eq!(book(&h, "svc-cut", day, "10:00").await.0, StatusCode::CREATED);

    let (status, json) = book(&h, "svc-cut", day, "10:15").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "time slot no longer available");

    let (status, _) = book(&h, "svc-cut", day, "10:30").await;
    assert_eq!(status, StatusCode::CREATED);

    // The conflict never reached the payment processor.
    assert_eq!(h.payments.created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_booking_closed_day_rejected() {
    let h = Harness::new();
    let monday = open_day() - chrono::Duration::days(1);
    let (status, json) = book(&h, "svc-cut", monday, "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("closed"));
    assert_eq!(h.appointment_count(), 0);
}

#[tokio::test]
async fn test_booking_invalid_fields_rejected() {
    let h = Harness::new();
    let mut body = booking_body("svc-cut", open_day(), "10:00");
    body["customer_email"] = serde_json::json!("jay-at-example");
    let res = h
        .app()
        .oneshot(json_request("POST", "/api/bookings", None, &body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (status, json) = book(&h, "svc-unknown", open_day(), "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid service");
    assert_eq!(h.payments.created.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_submissions_one_wins() {
    let h = Harness::new();
    let day = open_day();

    let first = tokio::spawn(
        h.app()
            .oneshot(json_request("POST", "/api/bookings", None, &booking_body("svc-cut", day, "11:00"))),
    );
    let second = tokio::spawn(
        h.app()
            .oneshot(json_request("POST", "/api/bookings", None, &booking_body("svc-fade", day, "11:00"))),
    );
    let a = first.await.unwrap().unwrap().status();
    let b = second.await.unwrap().unwrap().status();

    let mut statuses = [a.as_u16(), b.as_u16()];
    statuses.sort();
    assert_eq!(statuses, [201, 409]);
    assert_eq!(h.payments.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.appointment_count(), 1);
}

#[tokio::test]
async fn test_payment_failure_leaves_no_appointment() {
    let h = Harness::with_payments(true);
    let day = open_day();
    let (status, json) = book(&h, "svc-cut", day, "12:00").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("no booking was made"));
    assert_eq!(h.appointment_count(), 0);
    assert!(h.outbox.sms.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_persist_failure_voids_authorization() {
    let h = Harness::new();
    {
        let db = h.state.db.lock().unwrap();
        db.execute_batch(
            "CREATE TRIGGER fail_payment_reference BEFORE UPDATE OF payment_reference ON appointments
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();
    }

    let day = open_day();
    let (status, json) = book(&h, "svc-cut", day, "12:00").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("not been charged"));
    assert_eq!(h.payments.created.load(Ordering::SeqCst), 1);
    assert_eq!(*h.payments.cancelled.lock().unwrap(), vec!["pi_1_3000".to_string()]);
    assert_eq!(h.appointment_count(), 0);

    // The slot is free again.
    {
        let db = h.state.db.lock().unwrap();
        db.execute_batch("DROP TRIGGER fail_payment_reference;").unwrap();
    }
    assert_eq!(book(&h, "svc-cut", day, "12:00").await.0, StatusCode::CREATED);
}

#[tokio::test]
async fn test_hold_cancelled_during_payment_is_not_confirmed() {
    let h = Harness::with_payment_provider(|db, log| Box::new(CancelledMidPayment { db, log }));
    let day = open_day();
    let (status, json) = book(&h, "svc-cut", day, "12:00").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("not been charged"));
    assert_eq!(*h.payments.cancelled.lock().unwrap(), vec!["pi_1_3000".to_string()]);

    // The cancelled row stays, without the payment reference.
    let db = h.state.db.lock().unwrap();
    let (status, reference): (String, Option<String>) = db
        .query_row("SELECT status, payment_reference FROM appointments", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(status, "cancelled");
    assert_eq!(reference, None);
    assert!(h.outbox.sms.lock().unwrap().is_empty());
}

// ── Accounts ──

#[tokio::test]
async fn test_signup_links_guest_bookings() {
    let h = Harness::new();
    let day = open_day();
    assert_eq!(book(&h, "svc-cut", day, "09:00").await.0, StatusCode::CREATED);

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            None,
            &serde_json::json!({
                "email": "jay@example.com",
                "password": "hunter22",
                "full_name": "Jay Smith",
                "phone": "555-0100",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let session = read_json(res).await;
    assert_eq!(session["user_id"], "jay");
    assert_eq!(session["linked_appointments"], 1);

    let res = h
        .app()
        .oneshot(get_request("/api/account/appointments", Some("token-jay")))
        .await
        .unwrap();
    let mine = read_json(res).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["appointment_time"], "09:00");
}

#[tokio::test]
async fn test_signin_rejects_bad_password() {
    let h = Harness::new();
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/auth/signin",
            None,
            &serde_json::json!({ "email": "jay@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_in_booking_and_cancel() {
    let h = Harness::new();
    let day = open_day();
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some("token-jay"),
            &booking_body("svc-cut", day, "15:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let json = read_json(res).await;
    assert_eq!(json["appointment"]["user_id"], "jay");
    let id = json["appointment"]["id"].as_str().unwrap().to_string();

    // Someone else cannot see or cancel it.
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            &format!("/api/account/appointments/{id}/cancel"),
            Some("token-mallory"),
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            &format!("/api/account/appointments/{id}/cancel"),
            Some("token-jay"),
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["status"], "cancelled");
    assert_eq!(h.appointment_count(), 1);

    // The cancelled slot can be booked again.
    assert_eq!(book(&h, "svc-cut", day, "15:00").await.0, StatusCode::CREATED);
}

#[tokio::test]
async fn test_rejected_signed_in_booking_creates_no_profile() {
    let h = Harness::new();
    let day = open_day();
    assert_eq!(book(&h, "svc-cut", day, "10:00").await.0, StatusCode::CREATED);

    let mut invalid = booking_body("svc-cut", day, "11:00");
    invalid["customer_email"] = serde_json::json!("not-an-email");
    let res = h
        .app()
        .oneshot(json_request("POST", "/api/bookings", Some("token-kim"), &invalid))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some("token-kim"),
            &booking_body("svc-cut", day, "10:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(h.profile("kim").is_none());

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some("token-kim"),
            &booking_body("svc-cut", day, "11:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let profile = h.profile("kim").unwrap();
    assert_eq!(profile.full_name, "Jay Smith");
    assert_eq!(profile.role, Role::Customer);
}

#[tokio::test]
async fn test_guest_booking_under_account_email_is_listed() {
    let h = Harness::new();
    let day = open_day();
    // Guest booking made with jay's address, never linked to the account.
    let (status, json) = book(&h, "svc-cut", day, "16:00").await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["appointment"]["id"].as_str().unwrap().to_string();

    let res = h
        .app()
        .oneshot(get_request("/api/account/appointments", Some("token-jay")))
        .await
        .unwrap();
    let mine = read_json(res).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], id.as_str());

    let res = h
        .app()
        .oneshot(get_request("/api/account/appointments", Some("token-kim")))
        .await
        .unwrap();
    assert_eq!(read_json(res).await.as_array().unwrap().len(), 0);

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            &format!("/api/account/appointments/{id}/cancel"),
            Some("token-jay"),
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_password_reset_request() {
    let h = Harness::new();
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/auth/reset-password",
            None,
            &serde_json::json!({ "email": " jay@example.com " }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["ok"], true);
    assert_eq!(*h.resets.lock().unwrap(), vec!["jay@example.com".to_string()]);

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/auth/reset-password",
            None,
            &serde_json::json!({ "email": "jay" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.resets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_profile_update() {
    let h = Harness::new();
    let update = |token: Option<&str>, name: &str| {
        json_request(
            "PUT",
            "/api/account/profile",
            token,
            &serde_json::json!({ "full_name": name, "phone": "555-0199" }),
        )
    };

    let res = h.app().oneshot(update(None, "Jay")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = h.app().oneshot(update(Some("token-jay"), "  ")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h.app().oneshot(update(Some("token-jay"), "Jay Smith")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = h.app().oneshot(update(Some("token-jay"), "Jay S.")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    assert_eq!(json["full_name"], "Jay S.");
    assert_eq!(json["phone"], "555-0199");
    assert_eq!(json["email"], "jay@example.com");
    assert_eq!(h.profile("jay").unwrap().full_name, "Jay S.");
}

#[tokio::test]
async fn test_booking_with_bad_token_is_rejected() {
    let h = Harness::new();
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some("garbage"),
            &booking_body("svc-cut", open_day(), "15:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.appointment_count(), 0);
}

// ── Admin ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let h = Harness::new();
    let res = h.app().oneshot(get_request("/api/admin/services", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = h
        .app()
        .oneshot(get_request("/api/admin/services", Some("not-a-token")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_forbidden_for_customers() {
    let h = Harness::new();
    let res = h
        .app()
        .oneshot(get_request("/api/admin/stats", Some("token-jay")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_service_crud() {
    let h = Harness::new();

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/admin/services",
            Some("token-boss"),
            &serde_json::json!({
                "name": "Beard Trim",
                "duration_minutes": 15,
                "price_cents": 1500,
                "display_order": 3,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = read_json(res).await;
    let id = created["id"].as_str().unwrap().to_string();

    let res = h
        .app()
        .oneshot(json_request(
            "PUT",
            &format!("/api/admin/services/{id}"),
            Some("token-boss"),
            &serde_json::json!({ "price_cents": 1800 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["price_cents"], 1800);

    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/admin/services",
            Some("token-boss"),
            &serde_json::json!({ "name": "Nothing", "duration_minutes": 0, "price_cents": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h
        .app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/services/{id}"))
                .header("Authorization", "Bearer token-boss")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = h
        .app()
        .oneshot(get_request("/api/admin/services", Some("token-boss")))
        .await
        .unwrap();
    assert_eq!(read_json(res).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_cannot_delete_booked_service() {
    let h = Harness::new();
    assert_eq!(book(&h, "svc-cut", open_day(), "10:00").await.0, StatusCode::CREATED);

    let res = h
        .app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/services/svc-cut")
                .header("Authorization", "Bearer token-boss")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(res).await["error"].as_str().unwrap().contains("deactivate"));
}

#[tokio::test]
async fn test_admin_appointments_and_status() {
    let h = Harness::new();
    let day = open_day();
    let (_, json) = book(&h, "svc-fade", day, "13:00").await;
    let id = json["appointment"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/appointments?date={}", day.format("%Y-%m-%d"));
    let res = h.app().oneshot(get_request(&uri, Some("token-boss"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list = read_json(res).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["barber_name"], "Marcus");
    assert_eq!(list[0]["service_name"], "Skin Fade");

    let set_status = |status: &str| {
        json_request(
            "PUT",
            &format!("/api/admin/appointments/{id}/status"),
            Some("token-boss"),
            &serde_json::json!({ "status": status }),
        )
    };

    let res = h.app().oneshot(set_status("confirmed")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = h.app().oneshot(set_status("completed")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = h.app().oneshot(set_status("cancelled")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = h.app().oneshot(set_status("bogus")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h
        .app()
        .oneshot(get_request("/api/admin/appointments?status=completed", Some("token-boss")))
        .await
        .unwrap();
    assert_eq!(read_json(res).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_stats() {
    let h = Harness::new();
    let day = open_day();
    book(&h, "svc-cut", day, "09:00").await;
    book(&h, "svc-cut", day, "09:30").await;

    let res = h
        .app()
        .oneshot(get_request("/api/admin/stats", Some("token-boss")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stats = read_json(res).await;
    assert_eq!(stats["pending_appointments"], 2);
    assert_eq!(stats["total_customers"], 1);
}

#[tokio::test]
async fn test_admin_lists_customers_newest_first() {
    let h = Harness::new();
    for (token, name) in [("token-amy", "Amy"), ("token-ben", "Ben")] {
        let res = h
            .app()
            .oneshot(json_request(
                "PUT",
                "/api/account/profile",
                Some(token),
                &serde_json::json!({ "full_name": name }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = h
        .app()
        .oneshot(get_request("/api/admin/customers", Some("token-amy")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = h
        .app()
        .oneshot(get_request("/api/admin/customers", Some("token-boss")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let customers = read_json(res).await;
    let names: Vec<&str> = customers
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["full_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ben", "Amy"]);
}

#[tokio::test]
async fn test_admin_create_appointment_respects_bookings() {
    let h = Harness::new();
    let day = open_day();
    assert_eq!(book(&h, "svc-fade", day, "10:00").await.0, StatusCode::CREATED);

    let create = |time: &str| {
        json_request(
            "POST",
            "/api/admin/appointments",
            Some("token-boss"),
            &booking_body("svc-cut", day, time),
        )
    };

    // 10:30 falls inside the 60 minute fade.
    let res = h.app().oneshot(create("10:30")).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = h.app().oneshot(create("11:00")).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let json = read_json(res).await;
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["price_cents"], 3000);
    assert_eq!(json["payment_reference"], serde_json::Value::Null);
    assert_eq!(h.payments.created.load(Ordering::SeqCst), 1);

    // Customers now lose that slot too.
    assert_eq!(book(&h, "svc-cut", day, "11:00").await.0, StatusCode::CONFLICT);

    let mut pending = booking_body("svc-cut", day, "12:00");
    pending["status"] = serde_json::json!("pending");
    let res = h
        .app()
        .oneshot(json_request("POST", "/api/admin/appointments", Some("token-boss"), &pending))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(read_json(res).await["status"], "pending");

    let monday = day - chrono::Duration::days(1);
    let res = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/admin/appointments",
            Some("token-boss"),
            &booking_body("svc-cut", monday, "11:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.appointment_count(), 3);
}

#[tokio::test]
async fn test_admin_edit_appointment() {
    let h = Harness::new();
    let day = open_day();
    book(&h, "svc-cut", day, "09:00").await;
    let (_, json) = book(&h, "svc-cut", day, "11:00").await;
    let id = json["appointment"]["id"].as_str().unwrap().to_string();

    let edit = |body: serde_json::Value| {
        json_request(
            "PUT",
            &format!("/api/admin/appointments/{id}"),
            Some("token-boss"),
            &body,
        )
    };

    let res = h
        .app()
        .oneshot(edit(serde_json::json!({ "appointment_time": "09:00" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = h
        .app()
        .oneshot(edit(serde_json::json!({
            "service_id": "svc-fade",
            "appointment_time": "13:00",
            "notes": "wants a hot towel",
        })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    assert_eq!(json["appointment_time"], "13:00");
    assert_eq!(json["duration_minutes"], 60);
    assert_eq!(json["price_cents"], 4500);
    assert_eq!(json["notes"], "wants a hot towel");

    // The old slot is free, the new hour is not.
    assert_eq!(book(&h, "svc-cut", day, "11:00").await.0, StatusCode::CREATED);
    assert_eq!(book(&h, "svc-cut", day, "13:30").await.0, StatusCode::CONFLICT);

    let res = h
        .app()
        .oneshot(json_request(
            "PUT",
            "/api/admin/appointments/missing",
            Some("token-boss"),
            &serde_json::json!({ "appointment_time": "15:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
