//! PayPal Orders v2: create a CAPTURE order, send the buyer to the approval
//! link, capture once approved. The checkout reference is the order id.

use super::{expires_in, send_json, str_field, CheckoutRequest, CheckoutResponse, GatewayUpdate, TokenCache};
use crate::billing::{PaymentProvider, PaymentStatus};
use compliance_core::config::PaypalConfig;
use compliance_core::{ComplianceError, ComplianceResult};
use serde_json::{json, Value};
use tracing::{debug, info};

pub struct PaypalGateway {
    config: PaypalConfig,
    client: reqwest::Client,
    token: TokenCache,
}

impl PaypalGateway {
    pub fn new(config: PaypalConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            token: TokenCache::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> ComplianceResult<String> {
        if let Some(token) = self.token.get() {
            return Ok(token);
        }
        let request = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let body = send_json(PaymentProvider::Paypal, "oauth", request).await?;
        let token = str_field(&body, "/access_token")
            .ok_or_else(|| ComplianceError::Gateway("paypal oauth: missing access_token".into()))?;
        self.token.put(&token, expires_in(&body));
        Ok(token)
    }

    pub async fn create_order(&self, request: &CheckoutRequest) -> ComplianceResult<CheckoutResponse> {
        let token = self.access_token().await?;
        let builder = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .header("PayPal-Request-Id", request.payment_id.to_string())
            .json(&self.order_body(request));
        let order = send_json(PaymentProvider::Paypal, "create order", builder).await?;
        let reference = str_field(&order, "/id")
            .ok_or_else(|| ComplianceError::Gateway("paypal create order: missing id".into()))?;
        info!(reference = %reference, "PayPal order created");
        Ok(CheckoutResponse {
            reference,
            approval_url: approval_link(&order),
            client_secret: None,
            message: None,
        })
    }

    /// Fetch the order, capturing it first when the buyer has approved.
    pub async fn query(&self, order_id: &str) -> ComplianceResult<GatewayUpdate> {
        let token = self.access_token().await?;
        let builder = self
            .client
            .get(self.url(&format!("/v2/checkout/orders/{order_id}")))
            .bearer_auth(&token);
        let mut order = send_json(PaymentProvider::Paypal, "get order", builder).await?;

        if str_field(&order, "/status").as_deref() == Some("APPROVED") {
            debug!(order_id, "Capturing approved PayPal order");
            let builder = self
                .client
                .post(self.url(&format!("/v2/checkout/orders/{order_id}/capture")))
                .bearer_auth(&token)
                .json(&json!({}));
            order = send_json(PaymentProvider::Paypal, "capture order", builder).await?;
        }

        let status = str_field(&order, "/status")
            .map(|s| map_order_status(&s))
            .unwrap_or(PaymentStatus::Pending);
        Ok(GatewayUpdate {
            reference: order_id.to_string(),
            status,
            receipt: capture_id(&order),
            reason: None,
        })
    }

    pub fn order_body(&self, request: &CheckoutRequest) -> Value {
        json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.payment_id.to_string(),
                "custom_id": request.payment_id.to_string(),
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": format!("{:.2}", request.amount),
                }
            }],
            "application_context": {
                "brand_name": "ComplianceHub",
                "user_action": "PAY_NOW",
                "shipping_preference": "NO_SHIPPING",
                "return_url": self.config.return_url,
                "cancel_url": self.config.cancel_url,
            }
        })
    }
}

pub fn map_order_status(status: &str) -> PaymentStatus {
    match status {
        "COMPLETED" => PaymentStatus::Completed,
        "VOIDED" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}

/// Link the buyer follows to approve the order.
pub fn approval_link(order: &Value) -> Option<String> {
    order
        .get("links")?
        .as_array()?
        .iter()
        .find(|link| matches!(link.get("rel").and_then(Value::as_str), Some("approve" | "payer-action")))
        .and_then(|link| str_field(link, "/href"))
}

pub fn capture_id(order: &Value) -> Option<String> {
    str_field(order, "/purchase_units/0/payments/captures/0/id")
}

/// Map a PayPal webhook event. Events that say nothing about an order's
/// payment return `None`.
pub fn parse_webhook(event: &Value) -> ComplianceResult<Option<GatewayUpdate>> {
    let event_type = str_field(event, "/event_type")
        .ok_or_else(|| ComplianceError::validation("missing event_type"))?;
    let resource = event
        .get("resource")
        .ok_or_else(|| ComplianceError::validation("missing resource"))?;

    let order_reference = || {
        str_field(resource, "/id").ok_or_else(|| ComplianceError::validation("missing resource.id"))
    };
    let capture_reference = || {
        str_field(resource, "/supplementary_data/related_ids/order_id")
            .ok_or_else(|| ComplianceError::validation("missing related order id"))
    };

    let update = match event_type.as_str() {
        "CHECKOUT.ORDER.APPROVED" => GatewayUpdate {
            reference: order_reference()?,
            status: PaymentStatus::Pending,
            receipt: None,
            reason: None,
        },
        "CHECKOUT.ORDER.COMPLETED" => GatewayUpdate {
            reference: order_reference()?,
            status: PaymentStatus::Completed,
            receipt: capture_id(resource),
            reason: None,
        },
        "CHECKOUT.ORDER.VOIDED" => GatewayUpdate {
            reference: order_reference()?,
            status: PaymentStatus::Cancelled,
            receipt: None,
            reason: Some("order voided".into()),
        },
        "PAYMENT.CAPTURE.COMPLETED" => GatewayUpdate {
            reference: capture_reference()?,
            status: PaymentStatus::Completed,
            receipt: str_field(resource, "/id"),
            reason: None,
        },
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => GatewayUpdate {
            reference: capture_reference()?,
            status: PaymentStatus::Failed,
            receipt: str_field(resource, "/id"),
            reason: Some(event_type.to_lowercase()),
        },
        _ => return Ok(None),
    };
    Ok(Some(update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_order_body_uses_two_decimal_value() {
        let gateway = PaypalGateway::new(PaypalConfig::default(), reqwest::Client::new());
        let payment_id = Uuid::new_v4();
        let body = gateway.order_body(&CheckoutRequest {
            payment_id,
            amount: 119.0,
            currency: "USD".into(),
            description: "Standard monthly".into(),
            phone_number: None,
        });
        assert_eq!(body["intent"], "CAPTURE");
        assert_eq!(body["purchase_units"][0]["amount"]["value"], "119.00");
        assert_eq!(body["purchase_units"][0]["amount"]["currency_code"], "USD");
        assert_eq!(body["purchase_units"][0]["custom_id"], payment_id.to_string());
    }

    #[test]
    fn test_approval_link_and_capture_id() {
        let order = json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "links": [
                { "rel": "self", "href": "https://api.paypal.com/v2/checkout/orders/5O1" },
                { "rel": "approve", "href": "https://www.paypal.com/checkoutnow?token=5O1" }
            ],
            "purchase_units": [{ "payments": { "captures": [{ "id": "3C679366HH908993F" }] } }]
        });
        assert_eq!(approval_link(&order).as_deref(), Some("https://www.paypal.com/checkoutnow?token=5O1"));
        assert_eq!(capture_id(&order).as_deref(), Some("3C679366HH908993F"));
        assert_eq!(map_order_status("COMPLETED"), PaymentStatus::Completed);
        assert_eq!(map_order_status("PAYER_ACTION_REQUIRED"), PaymentStatus::Pending);
    }

    #[test]
    fn test_capture_webhooks_reference_the_order() {
        let completed = json!({
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": "3C679366HH908993F",
                "supplementary_data": { "related_ids": { "order_id": "5O190127TN364715T" } }
            }
        });
        let update = parse_webhook(&completed).unwrap().unwrap();
        assert_eq!(update.reference, "5O190127TN364715T");
        assert_eq!(update.status, PaymentStatus::Completed);
        assert_eq!(update.receipt.as_deref(), Some("3C679366HH908993F"));

        let denied = json!({
            "event_type": "PAYMENT.CAPTURE.DENIED",
            "resource": { "id": "X", "supplementary_data": { "related_ids": { "order_id": "O1" } } }
        });
        assert_eq!(parse_webhook(&denied).unwrap().unwrap().status, PaymentStatus::Failed);
    }

    #[test]
    fn test_unrelated_webhook_is_ignored() {
        let event = json!({ "event_type": "BILLING.PLAN.CREATED", "resource": { "id": "P-1" } });
        assert!(parse_webhook(&event).unwrap().is_none());
        assert!(parse_webhook(&json!({ "resource": {} })).is_err());
    }
}
