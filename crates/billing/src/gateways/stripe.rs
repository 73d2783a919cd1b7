//! Stripe PaymentIntents. The browser confirms the intent with the client
//! secret; Stripe reports the outcome through signed webhooks. The checkout
//! reference is the PaymentIntent id.

use super::{send_json, str_field, CheckoutRequest, CheckoutResponse, GatewayUpdate};
use crate::billing::{PaymentProvider, PaymentStatus};
use compliance_core::config::StripeConfig;
use compliance_core::{ComplianceError, ComplianceResult};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

pub struct StripeGateway {
    config: StripeConfig,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub async fn create_intent(&self, request: &CheckoutRequest) -> ComplianceResult<CheckoutResponse> {
        let builder = self
            .client
            .post(self.url("/v1/payment_intents"))
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", request.payment_id.to_string())
            .form(&intent_form(request));
        let intent = send_json(PaymentProvider::Stripe, "create intent", builder).await?;
        let reference = str_field(&intent, "/id")
            .ok_or_else(|| ComplianceError::Gateway("stripe create intent: missing id".into()))?;
        info!(reference = %reference, "Stripe PaymentIntent created");
        Ok(CheckoutResponse {
            reference,
            approval_url: None,
            client_secret: str_field(&intent, "/client_secret"),
            message: None,
        })
    }

    pub async fn query(&self, intent_id: &str) -> ComplianceResult<GatewayUpdate> {
        let builder = self
            .client
            .get(self.url(&format!("/v1/payment_intents/{intent_id}")))
            .bearer_auth(&self.config.secret_key);
        let intent = send_json(PaymentProvider::Stripe, "get intent", builder).await?;
        let status = str_field(&intent, "/status")
            .map(|s| map_intent_status(&s))
            .unwrap_or(PaymentStatus::Pending);
        Ok(GatewayUpdate {
            reference: intent_id.to_string(),
            status,
            receipt: str_field(&intent, "/latest_charge"),
            reason: str_field(&intent, "/last_payment_error/message"),
        })
    }

    /// Verify the `Stripe-Signature` header when a webhook secret is set.
    pub fn verify_webhook(&self, payload: &[u8], header: Option<&str>, now_unix: i64) -> ComplianceResult<()> {
        if self.config.webhook_secret.is_empty() {
            warn!("Stripe webhook secret not configured, accepting unsigned webhook");
            return Ok(());
        }
        let header = header.ok_or_else(|| ComplianceError::Unauthorized("missing Stripe-Signature".into()))?;
        verify_signature(
            &self.config.webhook_secret,
            payload,
            header,
            self.config.webhook_tolerance_secs,
            now_unix,
        )
    }
}

/// Form fields for `POST /v1/payment_intents`.
pub fn intent_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    vec![
        ("amount".into(), to_minor_units(request.amount).to_string()),
        ("currency".into(), request.currency.to_lowercase()),
        ("description".into(), request.description.clone()),
        ("metadata[payment_id]".into(), request.payment_id.to_string()),
        ("automatic_payment_methods[enabled]".into(), "true".into()),
    ]
}

/// Amount in cents.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn map_intent_status(status: &str) -> PaymentStatus {
    match status {
        "succeeded" => PaymentStatus::Completed,
        "canceled" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> ComplianceResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ComplianceError::Config(format!("invalid Stripe webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a `t=…,v1=…` signature header against the payload.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> ComplianceResult<()> {
    let invalid = || ComplianceError::Unauthorized("invalid Stripe signature".into());

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or_else(invalid)?;
    if tolerance_secs > 0 {
        let skew = now_unix.checked_sub(timestamp).map(i64::unsigned_abs);
        if !matches!(skew, Some(skew) if skew <= tolerance_secs.unsigned_abs()) {
            return Err(ComplianceError::Unauthorized("Stripe signature timestamp outside tolerance".into()));
        }
    }

    let expected = sign_payload(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .any(|sig| bool::from(sig.as_bytes().ct_eq(expected.as_bytes())));
    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Map a Stripe event. Events other than PaymentIntent outcomes return `None`.
pub fn parse_webhook(event: &Value) -> ComplianceResult<Option<GatewayUpdate>> {
    let event_type = str_field(event, "/type").ok_or_else(|| ComplianceError::validation("missing type"))?;
    let status = match event_type.as_str() {
        "payment_intent.succeeded" => PaymentStatus::Completed,
        "payment_intent.payment_failed" => PaymentStatus::Failed,
        "payment_intent.canceled" => PaymentStatus::Cancelled,
        _ => return Ok(None),
    };
    let intent = event
        .pointer("/data/object")
        .ok_or_else(|| ComplianceError::validation("missing data.object"))?;
    let reference = str_field(intent, "/id").ok_or_else(|| ComplianceError::validation("missing data.object.id"))?;
    Ok(Some(GatewayUpdate {
        reference,
        status,
        receipt: str_field(intent, "/latest_charge"),
        reason: str_field(intent, "/last_payment_error/message")
            .or_else(|| str_field(intent, "/cancellation_reason")),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_intent_form_is_in_cents() {
        let form = intent_form(&CheckoutRequest {
            payment_id: Uuid::nil(),
            amount: 279.99,
            currency: "USD".into(),
            description: "Premium monthly".into(),
            phone_number: None,
        });
        assert!(form.contains(&("amount".to_string(), "27999".to_string())));
        assert!(form.contains(&("currency".to_string(), "usd".to_string())));
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let sig = sign_payload(SECRET, 1_700_000_000, payload).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v1={sig}");
        assert!(verify_signature(SECRET, payload, &header, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_bad_signatures_are_rejected() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let sig = sign_payload(SECRET, 1_700_000_000, payload).unwrap();

        let tampered = br#"{"type":"payment_intent.canceled"}"#;
        let header = format!("t=1700000000,v1={sig}");
        assert!(verify_signature(SECRET, tampered, &header, 300, 1_700_000_000).is_err());
        assert!(verify_signature(SECRET, payload, &header, 300, 1_700_001_000).is_err());
        assert!(verify_signature(SECRET, payload, "v1=abc", 300, 1_700_000_000).is_err());
        assert!(verify_signature("other", payload, &header, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let payload = b"{}";
        for ts in [i64::MIN, i64::MAX] {
            let sig = sign_payload(SECRET, ts, payload).unwrap();
            let header = format!("t={ts},v1={sig}");
            assert!(verify_signature(SECRET, payload, &header, 300, 1_700_000_000).is_err());
            assert!(verify_signature(SECRET, payload, &header, 300, -1_700_000_000).is_err());
        }
        assert!(verify_signature("whsec_x", payload, "t=-9223372036854775808,v1=00", 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_unsigned_webhooks_pass_without_secret() {
        let gateway = StripeGateway::new(StripeConfig::default(), reqwest::Client::new());
        assert!(gateway.verify_webhook(b"{}", None, 0).is_ok());

        let gateway = StripeGateway::new(
            StripeConfig {
                webhook_secret: SECRET.into(),
                ..StripeConfig::default()
            },
            reqwest::Client::new(),
        );
        assert!(gateway.verify_webhook(b"{}", None, 0).is_err());
    }

    #[test]
    fn test_parse_payment_intent_events() {
        let succeeded = json!({
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "latest_charge": "ch_456" } }
        });
        let update = parse_webhook(&succeeded).unwrap().unwrap();
        assert_eq!(update.reference, "pi_123");
        assert_eq!(update.status, PaymentStatus::Completed);
        assert_eq!(update.receipt.as_deref(), Some("ch_456"));

        let failed = json!({
            "type": "payment_intent.payment_failed",
            "data": { "object": { "id": "pi_123", "last_payment_error": { "message": "Your card was declined." } } }
        });
        let update = parse_webhook(&failed).unwrap().unwrap();
        assert_eq!(update.status, PaymentStatus::Failed);
        assert_eq!(update.reason.as_deref(), Some("Your card was declined."));

        let other = json!({ "type": "charge.refunded", "data": { "object": { "id": "ch_1" } } });
        assert!(parse_webhook(&other).unwrap().is_none());
    }
}
