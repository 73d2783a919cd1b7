//! Safaricom Daraja: Lipa na M-Pesa Online (STK push).
//!
//! The customer approves the charge on their phone; Daraja then POSTs the
//! outcome to the configured callback URL. The checkout reference is the
//! `CheckoutRequestID`.

use super::{expires_in, send_json, str_field, CheckoutRequest, CheckoutResponse, GatewayUpdate, TokenCache};
use crate::billing::{PaymentProvider, PaymentStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};
use compliance_core::config::MpesaConfig;
use compliance_core::{ComplianceError, ComplianceResult};
use serde_json::{json, Value};
use tracing::info;

/// Daraja timestamps are East Africa Time (UTC+3).
const EAT_OFFSET_SECS: i32 = 3 * 3600;
/// Result code for a request the customer dismissed.
const RESULT_CANCELLED_BY_USER: i64 = 1032;

pub struct MpesaGateway {
    config: MpesaConfig,
    client: reqwest::Client,
    token: TokenCache,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig, client: reqwest::Client) -> Self {
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
            .get(self.url("/oauth/v1/generate"))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret));
        let body = send_json(PaymentProvider::Mpesa, "oauth", request).await?;
        let token = str_field(&body, "/access_token")
            .ok_or_else(|| ComplianceError::Gateway("mpesa oauth: missing access_token".into()))?;
        self.token.put(&token, expires_in(&body));
        Ok(token)
    }

    /// Send an STK push prompt to the customer's phone.
    pub async fn stk_push(&self, request: &CheckoutRequest) -> ComplianceResult<CheckoutResponse> {
        let phone = request
            .phone_number
            .as_deref()
            .ok_or_else(|| ComplianceError::validation("phoneNumber is required for M-Pesa"))
            .and_then(normalize_phone)?;
        let body = self.stk_push_body(&phone, request.amount, &request.description, Utc::now());
        let token = self.access_token().await?;

        let request_builder = self
            .client
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(token)
            .json(&body);
        let response = send_json(PaymentProvider::Mpesa, "stk push", request_builder).await?;

        let code = str_field(&response, "/ResponseCode").unwrap_or_default();
        if code != "0" {
            let description = str_field(&response, "/ResponseDescription").unwrap_or_default();
            return Err(ComplianceError::Gateway(format!(
                "mpesa stk push rejected ({code}): {description}"
            )));
        }
        let reference = str_field(&response, "/CheckoutRequestID")
            .ok_or_else(|| ComplianceError::Gateway("mpesa stk push: missing CheckoutRequestID".into()))?;
        info!(reference = %reference, "M-Pesa STK push sent");
        Ok(CheckoutResponse {
            reference,
            approval_url: None,
            client_secret: None,
            message: str_field(&response, "/CustomerMessage"),
        })
    }

    /// STK push query for a pending checkout.
    pub async fn query(&self, checkout_request_id: &str) -> ComplianceResult<GatewayUpdate> {
        let timestamp = timestamp(Utc::now());
        let body = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password(&self.config.shortcode, &self.config.passkey, &timestamp),
            "Timestamp": timestamp,
            "CheckoutRequestID": checkout_request_id,
        });
        let token = self.access_token().await?;
        let request = self
            .client
            .post(self.url("/mpesa/stkpushquery/v1/query"))
            .bearer_auth(token)
            .json(&body);

        // Daraja answers HTTP 500 with an errorCode while the customer has
        // not yet responded.
        let response = match send_json(PaymentProvider::Mpesa, "stk query", request).await {
            Ok(response) => response,
            Err(ComplianceError::Gateway(message)) if message.contains("is being processed") => {
                return Ok(GatewayUpdate {
                    reference: checkout_request_id.to_string(),
                    status: PaymentStatus::Pending,
                    receipt: None,
                    reason: None,
                });
            }
            Err(e) => return Err(e),
        };

        let status = result_code(&response, "/ResultCode")
            .map(map_result_code)
            .unwrap_or(PaymentStatus::Pending);
        Ok(GatewayUpdate {
            reference: checkout_request_id.to_string(),
            status,
            receipt: None,
            reason: str_field(&response, "/ResultDesc").filter(|_| status != PaymentStatus::Completed),
        })
    }

    pub fn stk_push_body(&self, phone: &str, amount: f64, description: &str, now: DateTime<Utc>) -> Value {
        let timestamp = timestamp(now);
        json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password(&self.config.shortcode, &self.config.passkey, &timestamp),
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": whole_amount(amount),
            "PartyA": phone,
            "PartyB": self.config.shortcode,
            "PhoneNumber": phone,
            "CallBackURL": self.config.callback_url,
            "AccountReference": self.config.account_reference,
            "TransactionDesc": description,
        })
    }
}

/// `YYYYMMDDHHMMSS` in East Africa Time.
pub fn timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// `base64(shortcode + passkey + timestamp)`.
pub fn password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Normalise a Kenyan mobile number to `2547XXXXXXXX` / `2541XXXXXXXX`.
pub fn normalize_phone(raw: &str) -> ComplianceResult<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = if let Some(rest) = digits.strip_prefix("254") {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        digits.as_str()
    };
    if local.len() == 9 && (local.starts_with('7') || local.starts_with('1')) {
        Ok(format!("254{local}"))
    } else {
        Err(ComplianceError::validation(format!(
            "phone number {raw} is not a valid Kenyan mobile number"
        )))
    }
}

/// M-Pesa only accepts whole shillings; fractions round up.
pub fn whole_amount(amount: f64) -> u64 {
    amount.ceil().max(1.0) as u64
}

pub fn map_result_code(code: i64) -> PaymentStatus {
    match code {
        0 => PaymentStatus::Completed,
        RESULT_CANCELLED_BY_USER => PaymentStatus::Cancelled,
        _ => PaymentStatus::Failed,
    }
}

/// Result codes are numbers in callbacks and strings in query responses.
fn result_code(value: &Value, pointer: &str) -> Option<i64> {
    match value.pointer(pointer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the STK push callback Daraja POSTs to the callback URL.
pub fn parse_callback(body: &Value) -> ComplianceResult<GatewayUpdate> {
    let callback = body
        .pointer("/Body/stkCallback")
        .ok_or_else(|| ComplianceError::validation("missing Body.stkCallback"))?;
    let reference = str_field(callback, "/CheckoutRequestID")
        .ok_or_else(|| ComplianceError::validation("missing CheckoutRequestID"))?;
    let code = result_code(callback, "/ResultCode")
        .ok_or_else(|| ComplianceError::validation("missing ResultCode"))?;
    let status = map_result_code(code);

    let receipt = callback
        .pointer("/CallbackMetadata/Item")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("Name").and_then(Value::as_str) == Some("MpesaReceiptNumber"))
        })
        .and_then(|item| item.get("Value"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(GatewayUpdate {
        reference,
        status,
        receipt,
        reason: str_field(callback, "/ResultDesc").filter(|_| status != PaymentStatus::Completed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gateway() -> MpesaGateway {
        MpesaGateway::new(
            MpesaConfig {
                passkey: "pass".into(),
                ..MpesaConfig::default()
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_phone_normalisation() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254 712 345 678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0110345678").unwrap(), "254110345678");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("0812345678").is_err());
    }

    #[test]
    fn test_timestamp_is_east_africa_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 22, 5, 9).unwrap();
        assert_eq!(timestamp(now), "20261020010509");
        assert_eq!(password("174379", "pass", "20261020010509"), STANDARD.encode("174379pass20261020010509"));
    }

    #[test]
    fn test_stk_push_body() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let body = gateway().stk_push_body("254712345678", 4999.2, "Basic monthly", now);
        assert_eq!(body["Amount"], 5000);
        assert_eq!(body["PartyA"], "254712345678");
        assert_eq!(body["BusinessShortCode"], "174379");
        assert_eq!(body["TransactionType"], "CustomerPayBillOnline");
        assert_eq!(body["Timestamp"], "20260101030000");
    }

    #[test]
    fn test_parse_successful_callback() {
        let body = json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": { "Item": [
                    { "Name": "Amount", "Value": 5000 },
                    { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                    { "Name": "PhoneNumber", "Value": 254712345678u64 }
                ]}
            }}
        });
        let update = parse_callback(&body).unwrap();
        assert_eq!(update.reference, "ws_CO_191220191020363925");
        assert_eq!(update.status, PaymentStatus::Completed);
        assert_eq!(update.receipt.as_deref(), Some("NLJ7RT61SV"));
        assert!(update.reason.is_none());
    }

    #[test]
    fn test_parse_cancelled_and_failed_callbacks() {
        let cancelled = json!({ "Body": { "stkCallback": {
            "CheckoutRequestID": "ws_CO_1", "ResultCode": 1032, "ResultDesc": "Request cancelled by user"
        }}});
        let update = parse_callback(&cancelled).unwrap();
        assert_eq!(update.status, PaymentStatus::Cancelled);
        assert_eq!(update.reason.as_deref(), Some("Request cancelled by user"));

        let failed = json!({ "Body": { "stkCallback": {
            "CheckoutRequestID": "ws_CO_2", "ResultCode": "1", "ResultDesc": "Insufficient funds"
        }}});
        assert_eq!(parse_callback(&failed).unwrap().status, PaymentStatus::Failed);

        assert!(parse_callback(&json!({ "foo": 1 })).is_err());
    }
}
