//! End-to-end flows through the assembled router.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use compliance_api::ApiServer;
use compliance_billing::gateways::stripe::sign_payload;
use compliance_billing::{BillingCycle, BillingEngine, PaymentProvider, PaymentStatus, PlanTier};
use compliance_channels::{EmailService, EmailTemplate};
use compliance_core::AppConfig;
use compliance_management::models::OrganizationStatus;
use compliance_management::ManagementState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const STRIPE_SECRET: &str = "whsec_integration";

fn app() -> (Router, ManagementState) {
    app_with(AppConfig::default())
}

fn app_with(mut config: AppConfig) -> (Router, ManagementState) {
    config.stripe.webhook_secret = STRIPE_SECRET.to_string();
    let config = Arc::new(config);
    let state = ManagementState::new(
        config.clone(),
        Arc::new(BillingEngine::new(config.billing.clone())),
        Arc::new(EmailService::new(config.email.clone())),
    );
    let server = ApiServer::new(state.clone());
    (server.router(), state)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, org: &str, email: &str) -> (String, Uuid) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "organizationName": org,
            "email": email,
            "password": "correct-horse-battery",
            "firstName": "Wanjiku",
            "lastName": "Kamau",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["token"].as_str().unwrap().to_string();
    let org_id = body["organization"]["id"].as_str().unwrap().parse().unwrap();
    (token, org_id)
}

#[tokio::test]
async fn test_probes_and_openapi_are_public() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = call(&app, Method::GET, "/live", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/schedules"].is_object());

    let (status, body) = call(&app, Method::GET, "/api/v1/payments/plans", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_readiness_requires_a_real_token_secret() {
    let (app, _) = app();
    let (status, _) = call(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let mut config = AppConfig::default();
    config.auth.token_secret = "b7e1c0d94f2a6e38".to_string();
    let (app, _) = app_with(config);
    let (status, _) = call(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/standards", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_auth");

    let (status, _) = call(&app, Method::GET, "/api/v1/subscription", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_work_with_standards_and_schedules() {
    let (app, _) = app();
    let (token, _) = register(&app, "Coast Savings Bank", "admin@coast.example").await;

    let (status, standard) = call(
        &app,
        Method::POST,
        "/api/v1/standards",
        Some(&token),
        Some(json!({ "name": "AML/CFT Guidelines", "code": "AML-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{standard}");

    let (status, clause) = call(
        &app,
        Method::POST,
        &format!("/api/v1/standards/{}/clauses", standard["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({ "clauseNumber": "4.1", "title": "Customer due diligence", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{clause}");

    let due = (chrono::Utc::now().date_naive() + chrono::Duration::days(10)).to_string();
    let (status, schedule) = call(
        &app,
        Method::POST,
        "/api/v1/schedules",
        Some(&token),
        Some(json!({ "title": "Monthly STR return", "frequency": "monthly", "dueDate": due })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{schedule}");

    let (status, done) = call(
        &app,
        Method::POST,
        &format!("/api/v1/schedules/{}/complete", schedule["id"].as_str().unwrap()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_ne!(done["schedule"]["dueDate"], Value::String(due));

    let (status, dashboard) = call(&app, Method::GET, "/api/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["standards"], 1);
}

#[tokio::test]
async fn test_tenant_guard_rejects_foreign_organization_id() {
    let (app, _) = app();
    let (token, _) = register(&app, "Rift Valley Bank", "admin@rift.example").await;
    let (_, other_org) = register(&app, "Lake Basin Bank", "admin@lake.example").await;

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/risks?organizationId={other_org}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "tenant_violation");

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/v1/organizations/{other_org}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signed_stripe_webhook_completes_payment() {
    let (app, state) = app();
    let (token, org_id) = register(&app, "Highlands Bank", "admin@highlands.example").await;
    let me = call(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await.1;
    let admin_id: Uuid = me["user"]["id"].as_str().unwrap().parse().unwrap();

    let payment = state
        .billing
        .create_payment(org_id, admin_id, PlanTier::Premium, BillingCycle::Yearly, PaymentProvider::Stripe, None)
        .unwrap();
    state.billing.attach_reference(payment.id, "pi_3Nabc").unwrap();

    let event = json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_3Nabc", "latest_charge": "ch_3Nabc" } }
    })
    .to_string();
    let send = |signature: String| {
        let app = app.clone();
        let event = event.clone();
        async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/v1/payments/webhooks/stripe")
                .header(header::CONTENT_TYPE, "application/json")
                .header("stripe-signature", signature)
                .body(Body::from(event))
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }
    };

    assert_eq!(send("t=1,v1=deadbeef".into()).await, StatusCode::UNAUTHORIZED);

    let ts = chrono::Utc::now().timestamp();
    let signature = sign_payload(STRIPE_SECRET, ts, event.as_bytes()).unwrap();
    assert_eq!(send(format!("t={ts},v1={signature}")).await, StatusCode::OK);

    let stored = state.billing.payment(org_id, payment.id).unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(stored.receipt.as_deref(), Some("ch_3Nabc"));

    let (status, payments) = call(&app, Method::GET, "/api/v1/payments", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments[0]["status"], "completed");

    let (_, unread) = call(&app, Method::GET, "/api/v1/notifications/unread-count", Some(&token), None).await;
    assert_eq!(unread["count"], 1);
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn add_user(app: &Router, admin_token: &str, email: &str, role: &str) -> Uuid {
    let (status, user) = call(
        app,
        Method::POST,
        "/api/v1/users",
        Some(admin_token),
        Some(json!({
            "email": email,
            "firstName": "Otieno",
            "lastName": "Mwangi",
            "role": role,
            "password": "officer-password-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");
    user["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_and_duplicate_registration() {
    let (app, state) = app();
    register(&app, "Mount Kenya Bank", "admin@mtkenya.example").await;

    let (status, body) = login(&app, "admin@mtkenya.example", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    let (status, _) = login(&app, "nobody@mtkenya.example", "correct-horse-battery").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = login(&app, "ADMIN@mtkenya.example", "correct-horse-battery").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["token"].is_string());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "organizationName": "Copycat Bank",
            "email": "admin@mtkenya.example",
            "password": "correct-horse-battery",
            "firstName": "Juma",
            "lastName": "Hassan",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert_eq!(state.store.organization_count(), 1);
}

#[tokio::test]
async fn test_login_refused_for_inactive_user_and_disabled_organization() {
    let (app, state) = app();
    let (admin_token, org_id) = register(&app, "Tana River Bank", "admin@tana.example").await;
    let officer = add_user(&app, &admin_token, "officer@tana.example", "compliance_officer").await;

    let (status, _) = login(&app, "officer@tana.example", "officer-password-1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/v1/users/{officer}/deactivate"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = login(&app, "officer@tana.example", "officer-password-1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    for status in [OrganizationStatus::Suspended, OrganizationStatus::Cancelled] {
        state.store.set_organization_status(org_id, None, status).unwrap();
        let (code, body) = login(&app, "admin@tana.example", "correct-horse-battery").await;
        assert_eq!(code, StatusCode::FORBIDDEN, "{status:?}");
        assert_eq!(body["error"], "forbidden");
    }

    state.store.set_organization_status(org_id, None, OrganizationStatus::Active).unwrap();
    let (status, _) = login(&app, "admin@tana.example", "correct-horse-battery").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_reset_through_emailed_token() {
    let (app, state) = app();
    register(&app, "Nyanza Bank", "admin@nyanza.example").await;

    // Unknown addresses get the same reply.
    let (status, unknown) = call(
        &app,
        Method::POST,
        "/api/v1/auth/forgot-password",
        None,
        Some(json!({ "email": "ghost@nyanza.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, known) = call(
        &app,
        Method::POST,
        "/api/v1/auth/forgot-password",
        None,
        Some(json!({ "email": "admin@nyanza.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown["message"], known["message"]);
    assert!(state.mailer.sent_to("ghost@nyanza.example").is_empty());

    let email = state
        .mailer
        .sent_to("admin@nyanza.example")
        .into_iter()
        .find(|m| m.template == EmailTemplate::PasswordReset)
        .expect("reset email");
    let start = email.html.find("token=").expect("token in link") + "token=".len();
    let token: String = email.html[start..].chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    assert_eq!(token.len(), 64);

    let reset = |token: String| {
        call(
            &app,
            Method::POST,
            "/api/v1/auth/reset-password",
            None,
            Some(json!({ "token": token, "newPassword": "fresh-password-42" })),
        )
    };
    let (status, body) = reset("0".repeat(64)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, body) = reset(token.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = reset(token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = login(&app, "admin@nyanza.example", "correct-horse-battery").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "admin@nyanza.example", "fresh-password-42").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_only_admins_can_broadcast() {
    let (app, _) = app();
    let (admin_token, _) = register(&app, "Kilifi Bank", "admin@kilifi.example").await;
    add_user(&app, &admin_token, "officer@kilifi.example", "compliance_officer").await;
    let (_, body) = login(&app, "officer@kilifi.example", "officer-password-1").await;
    let officer_token = body["token"].as_str().unwrap().to_string();

    let message = json!({ "title": "Board meeting", "message": "Quarterly review on Friday" });
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/notifications/broadcast",
        Some(&officer_token),
        Some(message.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/notifications/broadcast",
        Some(&admin_token),
        Some(message),
    )
    .await;
    assert!(status.is_success(), "{body}");

    let (_, unread) = call(&app, Method::GET, "/api/v1/notifications/unread-count", Some(&officer_token), None).await;
    assert_eq!(unread["count"], 1);
}
