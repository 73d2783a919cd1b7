//! Axum REST handlers for the management API.
//!
//! Every protected handler takes an [`AuthUser`](crate::auth::AuthUser),
//! checks one permission and passes the caller's organization id to the
//! store.

pub mod assessments;
pub mod auth;
pub mod dashboard;
pub mod notifications;
pub mod organizations;
pub mod requirements;
pub mod risks;
pub mod schedules;
pub mod users;

use crate::store::ComplianceStore;
use compliance_billing::BillingEngine;
use compliance_channels::EmailService;
use compliance_core::AppConfig;
use compliance_platform::{PasswordHasher, TokenSigner};
use std::sync::Arc;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<ComplianceStore>,
    pub billing: Arc<BillingEngine>,
    pub signer: Arc<TokenSigner>,
    pub hasher: PasswordHasher,
    pub mailer: Arc<EmailService>,
    pub config: Arc<AppConfig>,
}

impl ManagementState {
    pub fn new(config: Arc<AppConfig>, billing: Arc<BillingEngine>, mailer: Arc<EmailService>) -> Self {
        Self {
            store: Arc::new(ComplianceStore::new()),
            billing,
            signer: Arc::new(TokenSigner::new(&config.auth.token_secret, config.auth.token_ttl_hours)),
            hasher: PasswordHasher::new(config.auth.password_hash_rounds),
            mailer,
            config,
        }
    }
}
