//! Subscription billing for ComplianceHub: the plan catalogue, per-organization
//! subscriptions, the payment ledger, and the M-Pesa / PayPal / Stripe
//! gateway clients. Data stored in DashMap (development).

pub mod billing;
pub mod gateways;

pub use billing::{
    BillingCycle, BillingEngine, Payment, PaymentProvider, PaymentStatus, PlanTier, PricingPlan,
    StatusOutcome, Subscription, SubscriptionStatus,
};
pub use gateways::{CheckoutRequest, CheckoutResponse, GatewayUpdate, Gateways};
