//! Payment gateway clients: M-Pesa Daraja STK push, PayPal Orders v2 and
//! Stripe PaymentIntents.
//!
//! Request bodies and webhook parsing are plain functions so they can be
//! tested without network access; the async methods only add transport.

pub mod mpesa;
pub mod paypal;
pub mod stripe;

use crate::billing::{PaymentProvider, PaymentStatus};
use compliance_core::{AppConfig, ComplianceError, ComplianceResult};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub use mpesa::MpesaGateway;
pub use paypal::PaypalGateway;
pub use stripe::StripeGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What a gateway needs to start a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub payment_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub phone_number: Option<String>,
}

/// Provider response to a started checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub reference: String,
    /// PayPal approval page.
    pub approval_url: Option<String>,
    /// Stripe client secret for confirming the intent in the browser.
    pub client_secret: Option<String>,
    /// Customer-facing text (M-Pesa: "check your phone").
    pub message: Option<String>,
}

/// A provider status report mapped onto the payment ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayUpdate {
    pub reference: String,
    pub status: PaymentStatus,
    pub receipt: Option<String>,
    pub reason: Option<String>,
}

/// The three configured gateways sharing one HTTP client.
pub struct Gateways {
    mpesa: MpesaGateway,
    paypal: PaypalGateway,
    stripe: StripeGateway,
}

impl Gateways {
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            mpesa: MpesaGateway::new(config.mpesa.clone(), client.clone()),
            paypal: PaypalGateway::new(config.paypal.clone(), client.clone()),
            stripe: StripeGateway::new(config.stripe.clone(), client),
        }
    }

    pub fn mpesa(&self) -> &MpesaGateway {
        &self.mpesa
    }

    pub fn paypal(&self) -> &PaypalGateway {
        &self.paypal
    }

    pub fn stripe(&self) -> &StripeGateway {
        &self.stripe
    }

    pub fn is_configured(&self, provider: PaymentProvider) -> bool {
        match provider {
            PaymentProvider::Mpesa => self.mpesa.is_configured(),
            PaymentProvider::Paypal => self.paypal.is_configured(),
            PaymentProvider::Stripe => self.stripe.is_configured(),
        }
    }

    /// Start a checkout with the provider.
    pub async fn checkout(
        &self,
        provider: PaymentProvider,
        request: &CheckoutRequest,
    ) -> ComplianceResult<CheckoutResponse> {
        self.ensure_configured(provider)?;
        debug!(payment_id = %request.payment_id, provider = provider.as_str(), "Starting checkout");
        match provider {
            PaymentProvider::Mpesa => self.mpesa.stk_push(request).await,
            PaymentProvider::Paypal => self.paypal.create_order(request).await,
            PaymentProvider::Stripe => self.stripe.create_intent(request).await,
        }
    }

    /// Ask the provider for the current status of a checkout.
    pub async fn query(&self, provider: PaymentProvider, reference: &str) -> ComplianceResult<GatewayUpdate> {
        self.ensure_configured(provider)?;
        match provider {
            PaymentProvider::Mpesa => self.mpesa.query(reference).await,
            PaymentProvider::Paypal => self.paypal.query(reference).await,
            PaymentProvider::Stripe => self.stripe.query(reference).await,
        }
    }

    fn ensure_configured(&self, provider: PaymentProvider) -> ComplianceResult<()> {
        if self.is_configured(provider) {
            Ok(())
        } else {
            Err(ComplianceError::Gateway(format!("{provider} is not configured")))
        }
    }
}

/// Send a request and decode the JSON body, turning transport and HTTP
/// errors into gateway errors.
pub(crate) async fn send_json(
    provider: PaymentProvider,
    operation: &str,
    request: reqwest::RequestBuilder,
) -> ComplianceResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| ComplianceError::Gateway(format!("{provider} {operation}: {e}")))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        warn!(provider = provider.as_str(), operation, %status, "Gateway request failed");
        return Err(ComplianceError::Gateway(format!(
            "{provider} {operation}: HTTP {status}: {body}"
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| ComplianceError::Gateway(format!("{provider} {operation}: invalid JSON: {e}")))
}

pub(crate) fn str_field(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

/// Cached OAuth access token.
#[derive(Default)]
pub(crate) struct TokenCache {
    inner: Mutex<Option<(String, Instant)>>,
}

impl TokenCache {
    pub(crate) fn get(&self) -> Option<String> {
        match &*self.inner.lock() {
            Some((token, expires)) if *expires > Instant::now() => Some(token.clone()),
            _ => None,
        }
    }

    /// Store a token, expiring it a minute early.
    pub(crate) fn put(&self, token: &str, expires_in_secs: u64) {
        let ttl = Duration::from_secs(expires_in_secs.saturating_sub(60));
        *self.inner.lock() = Some((token.to_string(), Instant::now() + ttl));
    }
}

/// `expires_in` arrives as a number from PayPal and as a string from Daraja.
pub(crate) fn expires_in(body: &Value) -> u64 {
    match body.get("expires_in") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_gateways_are_reported() {
        let gateways = Gateways::new(&AppConfig::default());
        assert!(!gateways.is_configured(PaymentProvider::Mpesa));
        assert!(!gateways.is_configured(PaymentProvider::Paypal));
        assert!(!gateways.is_configured(PaymentProvider::Stripe));
    }

    #[tokio::test]
    async fn test_checkout_fails_fast_when_unconfigured() {
        let gateways = Gateways::new(&AppConfig::default());
        let request = CheckoutRequest {
            payment_id: Uuid::new_v4(),
            amount: 39.0,
            currency: "USD".into(),
            description: "Basic monthly".into(),
            phone_number: None,
        };
        let err = gateways
            .checkout(PaymentProvider::Stripe, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::Gateway(_)));
    }

    #[test]
    fn test_token_cache_and_expiry_parsing() {
        let cache = TokenCache::default();
        assert!(cache.get().is_none());
        cache.put("abc", 3600);
        assert_eq!(cache.get().as_deref(), Some("abc"));
        cache.put("short", 30);
        assert!(cache.get().is_none());

        assert_eq!(expires_in(&serde_json::json!({ "expires_in": "3599" })), 3599);
        assert_eq!(expires_in(&serde_json::json!({ "expires_in": 32400 })), 32400);
    }
}
