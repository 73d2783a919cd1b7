//! Payment orchestration: starts gateway checkouts, applies provider
//! status reports to the ledger and runs the completion side effects.

use chrono::Utc;
use compliance_billing::gateways::{mpesa, paypal, stripe};
use compliance_billing::{
    BillingCycle, BillingEngine, CheckoutRequest, CheckoutResponse, GatewayUpdate, Payment, PaymentProvider,
    PaymentStatus, PlanTier, StatusOutcome,
};
use compliance_channels::{template_vars, EmailService, EmailTemplate};
use compliance_core::{ComplianceError, ComplianceResult, Role};
use compliance_management::models::{NewNotification, NotificationKind, OrganizationStatus};
use compliance_management::ComplianceStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub plan: PlanTier,
    #[serde(default = "default_cycle")]
    pub cycle: BillingCycle,
    pub provider: PaymentProvider,
    /// Required for M-Pesa.
    pub phone_number: Option<String>,
}

fn default_cycle() -> BillingCycle {
    BillingCycle::Monthly
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub payment: Payment,
    pub checkout: CheckoutResponse,
}

/// Acknowledgement returned to gateway webhooks.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// The payment the event applied to, if any.
    pub payment_id: Option<Uuid>,
}

pub struct PaymentService {
    gateways: compliance_billing::Gateways,
    billing: Arc<BillingEngine>,
    store: Arc<ComplianceStore>,
    mailer: Arc<EmailService>,
}

impl PaymentService {
    pub fn new(
        gateways: compliance_billing::Gateways,
        billing: Arc<BillingEngine>,
        store: Arc<ComplianceStore>,
        mailer: Arc<EmailService>,
    ) -> Self {
        Self {
            gateways,
            billing,
            store,
            mailer,
        }
    }

    pub fn billing(&self) -> &BillingEngine {
        &self.billing
    }

    /// Record a pending payment and start the provider checkout. A
    /// checkout the provider rejects marks the payment failed.
    pub async fn initiate(
        &self,
        org: Uuid,
        actor: Uuid,
        req: InitiatePaymentRequest,
    ) -> ComplianceResult<InitiatePaymentResponse> {
        let phone_number = match (req.provider, req.phone_number.as_deref()) {
            (PaymentProvider::Mpesa, None) => {
                return Err(ComplianceError::validation("phoneNumber is required for M-Pesa"))
            }
            (PaymentProvider::Mpesa, Some(raw)) => Some(mpesa::normalize_phone(raw)?),
            (_, phone) => phone.map(str::to_string),
        };
        let plan = self.billing.plan(req.plan)?.clone();
        let organization = self.store.organization(org)?;

        let payment = self
            .billing
            .create_payment(org, actor, req.plan, req.cycle, req.provider, phone_number.clone())?;
        let checkout_request = CheckoutRequest {
            payment_id: payment.id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            description: format!("{} {} plan for {}", plan.name, cycle_label(req.cycle), organization.name),
            phone_number,
        };

        let checkout = match self.gateways.checkout(req.provider, &checkout_request).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(payment_id = %payment.id, provider = req.provider.as_str(), error = %e, "Checkout failed");
                self.billing
                    .apply_status(payment.id, PaymentStatus::Failed, None, Some(e.to_string()), Utc::now())?;
                return Err(e);
            }
        };
        let payment = self.billing.attach_reference(payment.id, &checkout.reference)?;
        info!(
            payment_id = %payment.id,
            organization_id = %org,
            provider = req.provider.as_str(),
            reference = %checkout.reference,
            "Payment initiated"
        );
        Ok(InitiatePaymentResponse { payment, checkout })
    }

    /// Ask the provider for the checkout's status and apply it. Payments
    /// that already settled are returned as stored.
    pub async fn query_status(&self, org: Uuid, payment_id: Uuid) -> ComplianceResult<Payment> {
        let payment = self.billing.payment(org, payment_id)?;
        let Some(reference) = payment.reference.clone() else {
            return Ok(payment);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }
        let update = self.gateways.query(payment.provider, &reference).await?;
        let outcome = self.apply(payment.id, update).await?;
        Ok(outcome.payment)
    }

    /// Apply a provider status report keyed by reference. Unknown references
    /// are logged and ignored.
    pub async fn apply_update(
        &self,
        provider: PaymentProvider,
        update: GatewayUpdate,
    ) -> ComplianceResult<Option<Payment>> {
        let Some(payment) = self.billing.find_by_reference(provider, &update.reference) else {
            warn!(provider = provider.as_str(), reference = %update.reference, "Webhook for unknown payment reference");
            metrics::counter!("billing.webhooks.unmatched", "provider" => provider.as_str()).increment(1);
            return Ok(None);
        };
        let outcome = self.apply(payment.id, update).await?;
        Ok(Some(outcome.payment))
    }

    pub async fn handle_mpesa_callback(&self, body: &Value) -> ComplianceResult<WebhookAck> {
        let update = mpesa::parse_callback(body)?;
        self.acknowledge(PaymentProvider::Mpesa, Some(update)).await
    }

    pub async fn handle_paypal_webhook(&self, body: &Value) -> ComplianceResult<WebhookAck> {
        let update = paypal::parse_webhook(body)?;
        self.acknowledge(PaymentProvider::Paypal, update).await
    }

    /// Verify the signature over the raw payload before parsing it.
    pub async fn handle_stripe_webhook(&self, payload: &[u8], signature: Option<&str>) -> ComplianceResult<WebhookAck> {
        self.gateways
            .stripe()
            .verify_webhook(payload, signature, Utc::now().timestamp())?;
        let event: Value = serde_json::from_slice(payload)
            .map_err(|e| ComplianceError::validation(format!("invalid webhook body: {e}")))?;
        let update = stripe::parse_webhook(&event)?;
        self.acknowledge(PaymentProvider::Stripe, update).await
    }

    async fn acknowledge(&self, provider: PaymentProvider, update: Option<GatewayUpdate>) -> ComplianceResult<WebhookAck> {
        metrics::counter!("billing.webhooks.received", "provider" => provider.as_str()).increment(1);
        let payment = match update {
            Some(update) => self.apply_update(provider, update).await?,
            None => None,
        };
        Ok(WebhookAck {
            received: true,
            payment_id: payment.map(|p| p.id),
        })
    }

    async fn apply(&self, payment_id: Uuid, update: GatewayUpdate) -> ComplianceResult<StatusOutcome> {
        let outcome = self
            .billing
            .apply_status(payment_id, update.status, update.receipt, update.reason, Utc::now())?;
        if outcome.newly_completed {
            self.on_completed(&outcome).await;
        }
        Ok(outcome)
    }

    /// Reactivate the organization, notify its admins and email a receipt.
    async fn on_completed(&self, outcome: &StatusOutcome) {
        let payment = &outcome.payment;
        let org = payment.organization_id;
        let organization = match self.store.organization(org) {
            Ok(o) => o,
            Err(e) => {
                warn!(organization_id = %org, error = %e, "Completed payment for missing organization");
                return;
            }
        };
        if organization.status != OrganizationStatus::Active {
            if let Err(e) = self.store.set_organization_status(org, None, OrganizationStatus::Active) {
                warn!(organization_id = %org, error = %e, "Could not reactivate organization");
            }
        }

        let period_end = outcome
            .subscription
            .as_ref()
            .map(|s| s.current_period_end.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let plan = payment.plan.as_str();
        let amount = format!("{:.2}", payment.amount);
        let admins = self.store.users_with_role(org, Role::Admin);
        let admin_ids: Vec<Uuid> = admins.iter().map(|u| u.id).collect();
        self.store.notify_many(
            org,
            &admin_ids,
            NewNotification {
                kind: NotificationKind::PaymentReceived,
                title: "Payment received".into(),
                message: format!(
                    "{} {amount} received via {} for the {plan} plan. Active until {period_end}.",
                    payment.currency, payment.provider
                ),
                link: Some(self.mailer.link("billing")),
            },
        );

        let vars = template_vars([
            ("organization", organization.name.clone()),
            ("plan", plan.to_string()),
            ("amount", amount),
            ("currency", payment.currency.clone()),
            ("provider", payment.provider.to_string()),
            ("receipt", payment.receipt.clone().unwrap_or_else(|| payment.id.to_string())),
            ("period_end", period_end),
        ]);
        for admin in &admins {
            self.mailer
                .send_template(&admin.email, EmailTemplate::PaymentReceipt, vars.clone())
                .await;
        }
    }
}

fn cycle_label(cycle: BillingCycle) -> &'static str {
    match cycle {
        BillingCycle::Monthly => "monthly",
        BillingCycle::Yearly => "yearly",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_billing::SubscriptionStatus;
    use compliance_core::AppConfig;
    use compliance_management::demo::{seed_demo, DEMO_ADMIN_EMAIL};
    use compliance_management::ManagementState;

    fn service() -> (PaymentService, ManagementState) {
        let config = Arc::new(AppConfig::default());
        let state = ManagementState::new(
            config.clone(),
            Arc::new(BillingEngine::new(config.billing.clone())),
            Arc::new(EmailService::new(config.email.clone())),
        );
        let service = PaymentService::new(
            compliance_billing::Gateways::new(&config),
            state.billing.clone(),
            state.store.clone(),
            state.mailer.clone(),
        );
        (service, state)
    }

    fn pending_with_reference(state: &ManagementState, org: Uuid, actor: Uuid, reference: &str) -> Payment {
        let payment = state
            .billing
            .create_payment(org, actor, PlanTier::Standard, BillingCycle::Monthly, PaymentProvider::Mpesa, None)
            .unwrap();
        state.billing.attach_reference(payment.id, reference).unwrap()
    }

    #[tokio::test]
    async fn test_mpesa_requires_phone_number() {
        let (service, state) = service();
        let demo = seed_demo(&state).unwrap();
        let err = service
            .initiate(
                demo.organization_id,
                demo.admin_id,
                InitiatePaymentRequest {
                    plan: PlanTier::Basic,
                    cycle: BillingCycle::Monthly,
                    provider: PaymentProvider::Mpesa,
                    phone_number: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::Validation(_)));
        assert!(state.billing.list_payments(demo.organization_id).is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_marks_payment_failed() {
        let (service, state) = service();
        let demo = seed_demo(&state).unwrap();
        let err = service
            .initiate(
                demo.organization_id,
                demo.admin_id,
                InitiatePaymentRequest {
                    plan: PlanTier::Basic,
                    cycle: BillingCycle::Monthly,
                    provider: PaymentProvider::Stripe,
                    phone_number: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::Gateway(_)));
        let payments = state.billing.list_payments(demo.organization_id);
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_mpesa_callback_completes_payment_once() {
        let (service, state) = service();
        let demo = seed_demo(&state).unwrap();
        state
            .store
            .set_organization_status(demo.organization_id, None, OrganizationStatus::Suspended)
            .unwrap();
        let payment = pending_with_reference(&state, demo.organization_id, demo.admin_id, "ws_CO_123");

        let callback = serde_json::json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "m-1",
                "CheckoutRequestID": "ws_CO_123",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": { "Item": [
                    { "Name": "Amount", "Value": 4999 },
                    { "Name": "MpesaReceiptNumber", "Value": "QKL7ABC123" }
                ]}
            }}
        });
        let ack = service.handle_mpesa_callback(&callback).await.unwrap();
        assert_eq!(ack.payment_id, Some(payment.id));

        let stored = state.billing.payment(demo.organization_id, payment.id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        let sub = state.billing.subscription(demo.organization_id).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        let period_end = sub.current_period_end;
        assert_eq!(
            state.store.organization(demo.organization_id).unwrap().status,
            OrganizationStatus::Active
        );
        assert_eq!(state.mailer.sent_to(DEMO_ADMIN_EMAIL).len(), 1);

        // A repeated callback does not extend the subscription again.
        service.handle_mpesa_callback(&callback).await.unwrap();
        let sub = state.billing.subscription(demo.organization_id).unwrap();
        assert_eq!(sub.current_period_end, period_end);
        assert_eq!(state.mailer.sent_to(DEMO_ADMIN_EMAIL).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_acknowledged() {
        let (service, _state) = service();
        let ack = service
            .apply_update(
                PaymentProvider::Paypal,
                GatewayUpdate {
                    reference: "ORDER-404".into(),
                    status: PaymentStatus::Completed,
                    receipt: None,
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert!(ack.is_none());
    }

    #[tokio::test]
    async fn test_failed_status_records_reason() {
        let (service, state) = service();
        let demo = seed_demo(&state).unwrap();
        let payment = pending_with_reference(&state, demo.organization_id, demo.admin_id, "ws_CO_456");
        let updated = service
            .apply_update(
                PaymentProvider::Mpesa,
                GatewayUpdate {
                    reference: "ws_CO_456".into(),
                    status: PaymentStatus::Cancelled,
                    receipt: None,
                    reason: Some("Request cancelled by user".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, payment.id);
        assert_eq!(updated.status, PaymentStatus::Cancelled);
        assert_eq!(updated.failure_reason.as_deref(), Some("Request cancelled by user"));
    }
}
