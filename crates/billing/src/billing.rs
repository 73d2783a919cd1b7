//! Billing engine: plan catalogue, subscriptions and the payment ledger.
//!
//! One subscription per organization. Payments are recorded Pending when a
//! checkout starts and move through [`BillingEngine::apply_status`] as the
//! gateway reports back; the first transition into `Completed` extends the
//! subscription.

use chrono::{DateTime, Duration, Months, Utc};
use compliance_core::config::BillingConfig;
use compliance_core::{ComplianceError, ComplianceResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Basic,
    Standard,
    Premium,
}

impl PlanTier {
    pub fn all() -> [PlanTier; 3] {
        [PlanTier::Basic, PlanTier::Standard, PlanTier::Premium]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Standard => "standard",
            PlanTier::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn months(self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Yearly => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Mpesa,
    Paypal,
    Stripe,
}

impl PaymentProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentProvider::Mpesa => "mpesa",
            PaymentProvider::Paypal => "paypal",
            PaymentProvider::Stripe => "stripe",
        }
    }

    /// Settlement currency: M-Pesa charges KES, card and PayPal charge USD.
    pub fn currency(self) -> &'static str {
        match self {
            PaymentProvider::Mpesa => "KES",
            PaymentProvider::Paypal | PaymentProvider::Stripe => "USD",
        }
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Statuses that still grant access until the period ends.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Trialing | SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlan {
    pub tier: PlanTier,
    pub name: String,
    pub monthly_price_kes: f64,
    pub monthly_price_usd: f64,
    /// `None` means unlimited.
    pub max_users: Option<u32>,
    pub max_branches: Option<u32>,
    pub features: Vec<String>,
}

impl PricingPlan {
    pub fn monthly_price(&self, currency: &str) -> f64 {
        if currency.eq_ignore_ascii_case("KES") {
            self.monthly_price_kes
        } else {
            self.monthly_price_usd
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub plan: PlanTier,
    pub cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    /// Period end an expiry warning was last sent for.
    pub warned_for_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub plan: PlanTier,
    pub cycle: BillingCycle,
    pub provider: PaymentProvider,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Provider reference: CheckoutRequestID, order id or PaymentIntent id.
    pub reference: Option<String>,
    /// Provider receipt: M-Pesa receipt number, capture id or charge id.
    pub receipt: Option<String>,
    pub phone_number: Option<String>,
    pub failure_reason: Option<String>,
    pub initiated_by: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of applying a gateway status to a payment.
#[derive(Debug, Clone)]
pub struct StatusOutcome {
    pub payment: Payment,
    /// True only on the first transition into `Completed`.
    pub newly_completed: bool,
    /// The extended subscription when `newly_completed`.
    pub subscription: Option<Subscription>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// In-memory billing engine backed by `DashMap`.
pub struct BillingEngine {
    config: BillingConfig,
    plans: Vec<PricingPlan>,
    /// Keyed by organization id.
    subscriptions: DashMap<Uuid, Subscription>,
    payments: DashMap<Uuid, Payment>,
    /// (provider, reference) → payment id.
    references: DashMap<(PaymentProvider, String), Uuid>,
}

impl BillingEngine {
    pub fn new(config: BillingConfig) -> Self {
        info!(
            trial_days = config.trial_days,
            yearly_discount_months = config.yearly_discount_months,
            "BillingEngine initialized"
        );
        Self {
            config,
            plans: default_plans(),
            subscriptions: DashMap::new(),
            payments: DashMap::new(),
            references: DashMap::new(),
        }
    }

    // ─── Plans ─────────────────────────────────────────────────────────────

    pub fn list_plans(&self) -> Vec<PricingPlan> {
        self.plans.clone()
    }

    pub fn plan(&self, tier: PlanTier) -> ComplianceResult<&PricingPlan> {
        self.plans
            .iter()
            .find(|p| p.tier == tier)
            .ok_or_else(|| ComplianceError::not_found(format!("Plan {}", tier.as_str())))
    }

    /// Amount charged for a plan and cycle in the given currency. Yearly
    /// billing charges `12 - yearly_discount_months` months.
    pub fn quote(&self, tier: PlanTier, cycle: BillingCycle, currency: &str) -> ComplianceResult<f64> {
        let monthly = self.plan(tier)?.monthly_price(currency);
        let months = match cycle {
            BillingCycle::Monthly => 1,
            BillingCycle::Yearly => 12u32.saturating_sub(self.config.yearly_discount_months).max(1),
        };
        Ok(round_cents(monthly * months as f64))
    }

    // ─── Subscriptions ─────────────────────────────────────────────────────

    /// Start the free trial for a newly registered organization.
    pub fn start_trial(&self, organization_id: Uuid, now: DateTime<Utc>) -> Subscription {
        let sub = Subscription {
            id: Uuid::new_v4(),
            organization_id,
            plan: PlanTier::Basic,
            cycle: BillingCycle::Monthly,
            status: SubscriptionStatus::Trialing,
            current_period_start: now,
            current_period_end: now + Duration::days(self.config.trial_days.max(0)),
            cancel_at_period_end: false,
            warned_for_period_end: None,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.insert(organization_id, sub.clone());
        info!(organization_id = %organization_id, period_end = %sub.current_period_end, "Trial started");
        sub
    }

    pub fn subscription(&self, organization_id: Uuid) -> ComplianceResult<Subscription> {
        self.subscriptions
            .get(&organization_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| ComplianceError::not_found("Subscription"))
    }

    pub fn list_subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.iter().map(|s| s.value().clone()).collect()
    }

    /// Stop renewal: the subscription stays live until its period ends.
    pub fn cancel_subscription(&self, organization_id: Uuid) -> ComplianceResult<Subscription> {
        let mut sub = self
            .subscriptions
            .get_mut(&organization_id)
            .ok_or_else(|| ComplianceError::not_found("Subscription"))?;
        if !sub.status.is_live() {
            return Err(ComplianceError::Conflict(
                "subscription is no longer active".into(),
            ));
        }
        sub.cancel_at_period_end = true;
        sub.updated_at = Utc::now();
        info!(organization_id = %organization_id, "Subscription set to cancel at period end");
        Ok(sub.clone())
    }

    /// Extend (or create) the subscription after a completed payment. The new
    /// period starts at the current period end when that is still ahead,
    /// otherwise now.
    pub fn extend_subscription(
        &self,
        organization_id: Uuid,
        plan: PlanTier,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> ComplianceResult<Subscription> {
        let mut entry = self
            .subscriptions
            .entry(organization_id)
            .or_insert_with(|| Subscription {
                id: Uuid::new_v4(),
                organization_id,
                plan,
                cycle,
                status: SubscriptionStatus::Active,
                current_period_start: now,
                current_period_end: now,
                cancel_at_period_end: false,
                warned_for_period_end: None,
                created_at: now,
                updated_at: now,
            });
        let sub = entry.value_mut();
        let start = if sub.status.is_live() && sub.current_period_end > now {
            sub.current_period_end
        } else {
            now
        };
        let end = start
            .checked_add_months(Months::new(cycle.months()))
            .ok_or_else(|| ComplianceError::validation("subscription period out of range"))?;

        sub.plan = plan;
        sub.cycle = cycle;
        sub.status = SubscriptionStatus::Active;
        sub.current_period_start = start;
        sub.current_period_end = end;
        sub.cancel_at_period_end = false;
        sub.warned_for_period_end = None;
        sub.updated_at = now;
        info!(
            organization_id = %organization_id,
            plan = plan.as_str(),
            period_end = %end,
            "Subscription extended"
        );
        Ok(sub.clone())
    }

    /// Live subscriptions ending within `days` that have not been warned
    /// about for their current period.
    pub fn subscriptions_needing_warning(&self, now: DateTime<Utc>, days: i64) -> Vec<Subscription> {
        let horizon = now + Duration::days(days);
        self.subscriptions
            .iter()
            .filter(|s| {
                s.status.is_live()
                    && s.current_period_end > now
                    && s.current_period_end <= horizon
                    && s.warned_for_period_end != Some(s.current_period_end)
            })
            .map(|s| s.value().clone())
            .collect()
    }

    pub fn mark_warned(&self, organization_id: Uuid) {
        if let Some(mut sub) = self.subscriptions.get_mut(&organization_id) {
            sub.warned_for_period_end = Some(sub.current_period_end);
        }
    }

    /// Move live subscriptions whose period has ended to `Expired` (or
    /// `Cancelled` when cancellation was requested). Returns the changed ones.
    pub fn expire_ended(&self, now: DateTime<Utc>) -> Vec<Subscription> {
        let mut expired = Vec::new();
        for mut sub in self.subscriptions.iter_mut() {
            if sub.status.is_live() && sub.current_period_end <= now {
                sub.status = if sub.cancel_at_period_end {
                    SubscriptionStatus::Cancelled
                } else {
                    SubscriptionStatus::Expired
                };
                sub.updated_at = now;
                expired.push(sub.clone());
            }
        }
        for sub in &expired {
            info!(organization_id = %sub.organization_id, status = ?sub.status, "Subscription ended");
            metrics::counter!("billing.subscriptions.expired").increment(1);
        }
        expired
    }

    // ─── Payments ──────────────────────────────────────────────────────────

    /// Record a pending payment for a plan purchase.
    pub fn create_payment(
        &self,
        organization_id: Uuid,
        initiated_by: Uuid,
        plan: PlanTier,
        cycle: BillingCycle,
        provider: PaymentProvider,
        phone_number: Option<String>,
    ) -> ComplianceResult<Payment> {
        let currency = provider.currency();
        let amount = self.quote(plan, cycle, currency)?;
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            organization_id,
            plan,
            cycle,
            provider,
            amount,
            currency: currency.to_string(),
            status: PaymentStatus::Pending,
            reference: None,
            receipt: None,
            phone_number,
            failure_reason: None,
            initiated_by,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payments.insert(payment.id, payment.clone());
        metrics::counter!("billing.payments.initiated", "provider" => provider.as_str()).increment(1);
        Ok(payment)
    }

    /// Store the provider reference returned by checkout.
    pub fn attach_reference(&self, payment_id: Uuid, reference: &str) -> ComplianceResult<Payment> {
        let mut payment = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| ComplianceError::not_found("Payment"))?;
        payment.reference = Some(reference.to_string());
        payment.updated_at = Utc::now();
        self.references
            .insert((payment.provider, reference.to_string()), payment_id);
        Ok(payment.clone())
    }

    pub fn payment(&self, organization_id: Uuid, payment_id: Uuid) -> ComplianceResult<Payment> {
        self.payments
            .get(&payment_id)
            .filter(|p| p.organization_id == organization_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| ComplianceError::not_found("Payment"))
    }

    pub fn list_payments(&self, organization_id: Uuid) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .map(|p| p.value().clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments
    }

    pub fn find_by_reference(&self, provider: PaymentProvider, reference: &str) -> Option<Payment> {
        let id = *self.references.get(&(provider, reference.to_string()))?;
        self.payments.get(&id).map(|p| p.value().clone())
    }

    /// Apply a gateway-reported status. The last writer wins; the first
    /// transition into `Completed` extends the organization's subscription.
    pub fn apply_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        receipt: Option<String>,
        failure_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ComplianceResult<StatusOutcome> {
        let (payment, newly_completed) = {
            let mut payment = self
                .payments
                .get_mut(&payment_id)
                .ok_or_else(|| ComplianceError::not_found("Payment"))?;
            let newly_completed =
                status == PaymentStatus::Completed && payment.completed_at.is_none();
            payment.status = status;
            if receipt.is_some() {
                payment.receipt = receipt;
            }
            payment.failure_reason = match status {
                PaymentStatus::Failed | PaymentStatus::Cancelled => failure_reason,
                _ => None,
            };
            if newly_completed {
                payment.completed_at = Some(now);
            }
            payment.updated_at = now;
            (payment.clone(), newly_completed)
        };

        info!(
            payment_id = %payment.id,
            organization_id = %payment.organization_id,
            provider = payment.provider.as_str(),
            status = ?status,
            "Payment status applied"
        );

        let subscription = if newly_completed {
            metrics::counter!("billing.payments.completed", "provider" => payment.provider.as_str())
                .increment(1);
            Some(self.extend_subscription(payment.organization_id, payment.plan, payment.cycle, now)?)
        } else {
            if matches!(status, PaymentStatus::Failed | PaymentStatus::Cancelled) {
                metrics::counter!("billing.payments.failed", "provider" => payment.provider.as_str())
                    .increment(1);
            }
            None
        };

        Ok(StatusOutcome {
            payment,
            newly_completed,
            subscription,
        })
    }
}

impl Default for BillingEngine {
    fn default() -> Self {
        Self::new(BillingConfig::default())
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn default_plans() -> Vec<PricingPlan> {
    vec![
        PricingPlan {
            tier: PlanTier::Basic,
            name: "Basic".into(),
            monthly_price_kes: 5_000.0,
            monthly_price_usd: 39.0,
            max_users: Some(5),
            max_branches: Some(2),
            features: vec![
                "gap_assessments".into(),
                "compliance_calendar".into(),
                "email_reminders".into(),
            ],
        },
        PricingPlan {
            tier: PlanTier::Standard,
            name: "Standard".into(),
            monthly_price_kes: 15_000.0,
            monthly_price_usd: 119.0,
            max_users: Some(25),
            max_branches: Some(10),
            features: vec![
                "gap_assessments".into(),
                "compliance_calendar".into(),
                "email_reminders".into(),
                "risk_register".into(),
                "action_plans".into(),
            ],
        },
        PricingPlan {
            tier: PlanTier::Premium,
            name: "Premium".into(),
            monthly_price_kes: 35_000.0,
            monthly_price_usd: 279.0,
            max_users: None,
            max_branches: None,
            features: vec![
                "gap_assessments".into(),
                "compliance_calendar".into(),
                "email_reminders".into(),
                "risk_register".into(),
                "action_plans".into(),
                "audit_log".into(),
                "priority_support".into(),
            ],
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_yearly_quote_applies_discount_months() {
        let engine = BillingEngine::default();
        assert_eq!(engine.quote(PlanTier::Standard, BillingCycle::Monthly, "KES").unwrap(), 15_000.0);
        assert_eq!(engine.quote(PlanTier::Standard, BillingCycle::Yearly, "KES").unwrap(), 150_000.0);
        assert_eq!(engine.quote(PlanTier::Basic, BillingCycle::Yearly, "USD").unwrap(), 390.0);
    }

    #[test]
    fn test_trial_lasts_configured_days() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        let sub = engine.start_trial(org, at(2026, 10, 1));
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.current_period_end, at(2026, 10, 15));
    }

    #[test]
    fn test_completion_extends_from_future_period_end() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        let now = at(2026, 10, 1);
        engine.start_trial(org, now);

        let payment = engine
            .create_payment(org, Uuid::new_v4(), PlanTier::Premium, BillingCycle::Monthly, PaymentProvider::Stripe, None)
            .unwrap();
        let outcome = engine
            .apply_status(payment.id, PaymentStatus::Completed, Some("ch_1".into()), None, now)
            .unwrap();

        assert!(outcome.newly_completed);
        let sub = outcome.subscription.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan, PlanTier::Premium);
        assert_eq!(sub.current_period_start, at(2026, 10, 15));
        assert_eq!(sub.current_period_end, at(2026, 11, 15));
    }

    #[test]
    fn test_completion_after_expiry_starts_now() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        engine.start_trial(org, at(2026, 1, 1));
        assert_eq!(engine.expire_ended(at(2026, 2, 1)).len(), 1);

        let payment = engine
            .create_payment(org, Uuid::new_v4(), PlanTier::Basic, BillingCycle::Yearly, PaymentProvider::Mpesa, None)
            .unwrap();
        let now = at(2026, 3, 10);
        let sub = engine
            .apply_status(payment.id, PaymentStatus::Completed, None, None, now)
            .unwrap()
            .subscription
            .unwrap();
        assert_eq!(sub.current_period_start, now);
        assert_eq!(sub.current_period_end, at(2027, 3, 10));
    }

    #[test]
    fn test_completion_extends_only_once() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        let now = at(2026, 10, 1);
        let payment = engine
            .create_payment(org, Uuid::new_v4(), PlanTier::Basic, BillingCycle::Monthly, PaymentProvider::Paypal, None)
            .unwrap();

        let first = engine
            .apply_status(payment.id, PaymentStatus::Completed, None, None, now)
            .unwrap();
        let end = first.subscription.unwrap().current_period_end;

        let failed = engine
            .apply_status(payment.id, PaymentStatus::Failed, None, Some("reversed".into()), now)
            .unwrap();
        assert_eq!(failed.payment.status, PaymentStatus::Failed);

        let again = engine
            .apply_status(payment.id, PaymentStatus::Completed, None, None, now)
            .unwrap();
        assert!(!again.newly_completed);
        assert_eq!(engine.subscription(org).unwrap().current_period_end, end);
    }

    #[test]
    fn test_reference_lookup_and_org_scoping() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        let payment = engine
            .create_payment(org, Uuid::new_v4(), PlanTier::Basic, BillingCycle::Monthly, PaymentProvider::Mpesa, Some("254712345678".into()))
            .unwrap();
        engine.attach_reference(payment.id, "ws_CO_123").unwrap();

        assert_eq!(
            engine.find_by_reference(PaymentProvider::Mpesa, "ws_CO_123").map(|p| p.id),
            Some(payment.id)
        );
        assert!(engine.find_by_reference(PaymentProvider::Stripe, "ws_CO_123").is_none());
        assert!(engine.payment(Uuid::new_v4(), payment.id).is_err());
        assert_eq!(engine.list_payments(org).len(), 1);
    }

    #[test]
    fn test_warning_is_sent_once_per_period() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        engine.start_trial(org, at(2026, 10, 1));

        let now = at(2026, 10, 10);
        assert_eq!(engine.subscriptions_needing_warning(now, 7).len(), 1);
        engine.mark_warned(org);
        assert!(engine.subscriptions_needing_warning(now, 7).is_empty());
    }

    #[test]
    fn test_cancel_then_expire_marks_cancelled() {
        let engine = BillingEngine::default();
        let org = Uuid::new_v4();
        engine.start_trial(org, at(2026, 10, 1));
        assert!(engine.cancel_subscription(org).unwrap().cancel_at_period_end);

        let ended = engine.expire_ended(at(2026, 11, 1));
        assert_eq!(ended[0].status, SubscriptionStatus::Cancelled);
        assert!(engine.cancel_subscription(org).is_err());
    }
}
