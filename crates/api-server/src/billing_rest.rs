//! REST handlers for plans, payments, gateway webhooks and the
//! organization's subscription.

use crate::payments::{InitiatePaymentRequest, InitiatePaymentResponse, PaymentService, WebhookAck};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use compliance_billing::{Payment, PricingPlan, Subscription};
use compliance_management::{ApiResult, AuthUser};
use compliance_platform::Permission;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Shared state for billing routes.
#[derive(Clone)]
pub struct BillingState {
    pub payments: Arc<PaymentService>,
}

/// GET /api/v1/payments/plans — Public plan catalogue.
#[utoipa::path(
    get,
    path = "/api/v1/payments/plans",
    tag = "Billing",
    responses((status = 200, description = "Available plans", body = Vec<PricingPlan>))
)]
pub async fn list_plans(State(state): State<BillingState>) -> Json<Vec<PricingPlan>> {
    Json(state.payments.billing().list_plans())
}

/// POST /api/v1/payments/initiate
#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate",
    tag = "Billing",
    security(("bearer" = [])),
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "Checkout started", body = InitiatePaymentResponse),
        (status = 422, description = "Invalid plan or phone number", body = compliance_management::ErrorResponse),
        (status = 502, description = "Provider rejected the checkout", body = compliance_management::ErrorResponse)
    )
)]
pub async fn initiate_payment(
    State(state): State<BillingState>,
    caller: AuthUser,
    Json(req): Json<InitiatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<InitiatePaymentResponse>)> {
    caller.require(Permission::BillingManage)?;
    let response = state.payments.initiate(caller.org(), caller.user_id(), req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/payments
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    tag = "Billing",
    security(("bearer" = [])),
    responses((status = 200, description = "Payments, newest first", body = Vec<Payment>))
)]
pub async fn list_payments(State(state): State<BillingState>, caller: AuthUser) -> ApiResult<Json<Vec<Payment>>> {
    caller.require(Permission::BillingRead)?;
    Ok(Json(state.payments.billing().list_payments(caller.org())))
}

/// GET /api/v1/payments/:id
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "Billing",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment", body = Payment),
        (status = 404, description = "Not found", body = compliance_management::ErrorResponse)
    )
)]
pub async fn get_payment(
    State(state): State<BillingState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    caller.require(Permission::BillingRead)?;
    Ok(Json(state.payments.billing().payment(caller.org(), id)?))
}

/// POST /api/v1/payments/:id/query — Refresh status from the provider.
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/query",
    tag = "Billing",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment with the provider's latest status", body = Payment),
        (status = 502, description = "Provider unavailable", body = compliance_management::ErrorResponse)
    )
)]
pub async fn query_payment(
    State(state): State<BillingState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    caller.require(Permission::BillingRead)?;
    Ok(Json(state.payments.query_status(caller.org(), id).await?))
}

/// POST /api/v1/payments/webhooks/mpesa — Daraja STK push callback.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhooks/mpesa",
    tag = "Billing",
    request_body = Value,
    responses((status = 200, description = "Callback accepted", body = WebhookAck))
)]
pub async fn mpesa_webhook(State(state): State<BillingState>, Json(body): Json<Value>) -> ApiResult<Json<WebhookAck>> {
    debug!("M-Pesa callback received");
    Ok(Json(state.payments.handle_mpesa_callback(&body).await?))
}

/// POST /api/v1/payments/webhooks/paypal
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhooks/paypal",
    tag = "Billing",
    request_body = Value,
    responses((status = 200, description = "Event accepted", body = WebhookAck))
)]
pub async fn paypal_webhook(State(state): State<BillingState>, Json(body): Json<Value>) -> ApiResult<Json<WebhookAck>> {
    debug!("PayPal webhook received");
    Ok(Json(state.payments.handle_paypal_webhook(&body).await?))
}

/// POST /api/v1/payments/webhooks/stripe — Signed with `Stripe-Signature`.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhooks/stripe",
    tag = "Billing",
    request_body = Value,
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 401, description = "Missing or invalid signature", body = compliance_management::ErrorResponse)
    )
)]
pub async fn stripe_webhook(
    State(state): State<BillingState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());
    Ok(Json(state.payments.handle_stripe_webhook(&body, signature).await?))
}

/// GET /api/v1/subscription
#[utoipa::path(
    get,
    path = "/api/v1/subscription",
    tag = "Billing",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current subscription", body = Subscription),
        (status = 404, description = "No subscription", body = compliance_management::ErrorResponse)
    )
)]
pub async fn get_subscription(State(state): State<BillingState>, caller: AuthUser) -> ApiResult<Json<Subscription>> {
    caller.require(Permission::BillingRead)?;
    Ok(Json(state.payments.billing().subscription(caller.org())?))
}

/// POST /api/v1/subscription/cancel — Cancel at the end of the current period.
#[utoipa::path(
    post,
    path = "/api/v1/subscription/cancel",
    tag = "Billing",
    security(("bearer" = [])),
    responses((status = 200, description = "Subscription set to cancel at period end", body = Subscription))
)]
pub async fn cancel_subscription(
    State(state): State<BillingState>,
    caller: AuthUser,
) -> ApiResult<Json<Subscription>> {
    caller.require(Permission::BillingManage)?;
    Ok(Json(state.payments.billing().cancel_subscription(caller.org())?))
}
