use serde::Deserialize;

/// Root application configuration. Loaded from an optional
/// `config/compliance-hub.{toml,yaml,json}` file and environment variables
/// with the prefix `COMPLIANCE_HUB__`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub mpesa: MpesaConfig,
    #[serde(default)]
    pub paypal: PaypalConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub cron: CronConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Maximum accepted request body in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_reset_token_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,
    #[serde(default = "default_password_hash_rounds")]
    pub password_hash_rounds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Log,
    Sendgrid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_enabled")]
    pub enabled: bool,
    #[serde(default = "default_email_provider")]
    pub provider: EmailProvider,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_email_api_url")]
    pub api_url: String,
    /// Base URL of the web application, used for links in emails.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,
    /// Months given free when paying yearly.
    #[serde(default = "default_yearly_discount_months")]
    pub yearly_discount_months: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MpesaConfig {
    #[serde(default = "default_mpesa_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default = "default_mpesa_shortcode")]
    pub shortcode: String,
    #[serde(default)]
    pub passkey: String,
    #[serde(default = "default_mpesa_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_account_reference")]
    pub account_reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalConfig {
    #[serde(default = "default_paypal_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_paypal_return_url")]
    pub return_url: String,
    #[serde(default = "default_paypal_cancel_url")]
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    #[serde(default = "default_stripe_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub secret_key: String,
    /// Signing secret for `Stripe-Signature`. Empty disables verification.
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    #[serde(default = "default_cron_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cron_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_reminder_days_ahead")]
    pub reminder_days_ahead: u32,
    #[serde(default = "default_subscription_warning_days")]
    pub subscription_warning_days: i64,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    2 * 1024 * 1024
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
/// Built-in token key. Only acceptable for local development.
pub const DEV_TOKEN_SECRET: &str = "compliance-hub-dev-secret";

fn default_token_secret() -> String {
    DEV_TOKEN_SECRET.to_string()
}
fn default_token_ttl_hours() -> i64 {
    24
}
fn default_reset_token_ttl_minutes() -> i64 {
    60
}
fn default_password_hash_rounds() -> u32 {
    10_000
}
fn default_email_enabled() -> bool {
    true
}
fn default_email_provider() -> EmailProvider {
    EmailProvider::Log
}
fn default_from_email() -> String {
    "no-reply@compliancehub.io".to_string()
}
fn default_from_name() -> String {
    "ComplianceHub".to_string()
}
fn default_email_api_url() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}
fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_outbox_capacity() -> usize {
    200
}
fn default_trial_days() -> i64 {
    14
}
fn default_yearly_discount_months() -> u32 {
    2
}
fn default_mpesa_base_url() -> String {
    "https://sandbox.safaricom.co.ke".to_string()
}
fn default_mpesa_shortcode() -> String {
    "174379".to_string()
}
fn default_mpesa_callback_url() -> String {
    "http://localhost:8080/api/v1/payments/webhooks/mpesa".to_string()
}
fn default_account_reference() -> String {
    "ComplianceHub".to_string()
}
fn default_paypal_base_url() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}
fn default_paypal_return_url() -> String {
    "http://localhost:3000/billing/success".to_string()
}
fn default_paypal_cancel_url() -> String {
    "http://localhost:3000/billing/cancel".to_string()
}
fn default_stripe_base_url() -> String {
    "https://api.stripe.com".to_string()
}
fn default_webhook_tolerance_secs() -> i64 {
    300
}
fn default_cron_enabled() -> bool {
    true
}
fn default_cron_interval_secs() -> u64 {
    3600
}
fn default_reminder_days_ahead() -> u32 {
    3
}
fn default_subscription_warning_days() -> i64 {
    7
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            token_ttl_hours: default_token_ttl_hours(),
            reset_token_ttl_minutes: default_reset_token_ttl_minutes(),
            password_hash_rounds: default_password_hash_rounds(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: default_email_enabled(),
            provider: default_email_provider(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            api_key: String::new(),
            api_url: default_email_api_url(),
            app_url: default_app_url(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
            yearly_discount_months: default_yearly_discount_months(),
        }
    }
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            base_url: default_mpesa_base_url(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: default_mpesa_shortcode(),
            passkey: String::new(),
            callback_url: default_mpesa_callback_url(),
            account_reference: default_account_reference(),
        }
    }
}

impl Default for PaypalConfig {
    fn default() -> Self {
        Self {
            base_url: default_paypal_base_url(),
            client_id: String::new(),
            client_secret: String::new(),
            return_url: default_paypal_return_url(),
            cancel_url: default_paypal_cancel_url(),
        }
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            base_url: default_stripe_base_url(),
            secret_key: String::new(),
            webhook_secret: String::new(),
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
        }
    }
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            enabled: default_cron_enabled(),
            interval_secs: default_cron_interval_secs(),
            reminder_days_ahead: default_reminder_days_ahead(),
            subscription_warning_days: default_subscription_warning_days(),
        }
    }
}

impl AuthConfig {
    /// True when tokens would be signed with a missing or publicly known key.
    pub fn uses_dev_secret(&self) -> bool {
        let secret = self.token_secret.trim();
        secret.is_empty() || secret == DEV_TOKEN_SECRET
    }
}

impl MpesaConfig {
    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty() && !self.passkey.is_empty()
    }
}

impl PaypalConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/compliance-hub").required(false))
            .add_source(
                config::Environment::with_prefix("COMPLIANCE_HUB")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.email.provider, EmailProvider::Log);
        assert_eq!(config.billing.trial_days, 14);
        assert!(config.cron.enabled);
        assert!(!config.mpesa.is_configured());
        assert!(!config.stripe.is_configured());
        assert!(config.auth.uses_dev_secret());
    }

    #[test]
    fn test_dev_secret_detection() {
        let mut auth = AuthConfig::default();
        auth.token_secret = "  ".into();
        assert!(auth.uses_dev_secret());
        auth.token_secret = format!("{DEV_TOKEN_SECRET} ");
        assert!(auth.uses_dev_secret());
        auth.token_secret = "9f2c4e1d7b0a".into();
        assert!(!auth.uses_dev_secret());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "api": { "http_port": 9000 },
            "email": { "provider": "sendgrid", "api_key": "SG.key" }
        }))
        .unwrap();
        assert_eq!(config.api.http_port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.email.provider, EmailProvider::Sendgrid);
        assert_eq!(config.email.from_name, "ComplianceHub");
    }
}
