//! API server: assembles the management, billing and operational routers
//! and serves them over HTTP, with Prometheus metrics on a separate port.

use crate::billing_rest::{self, BillingState};
use crate::payments::PaymentService;
use crate::rest::{self, ProbeState};
use crate::swagger::ApiDoc;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use compliance_billing::Gateways;
use compliance_core::config::AppConfig;
use compliance_management::auth::{require_bearer, tenant_guard};
use compliance_management::{management_router, ManagementState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Main API server.
pub struct ApiServer {
    config: Arc<AppConfig>,
    state: ManagementState,
    payments: Arc<PaymentService>,
}

impl ApiServer {
    pub fn new(state: ManagementState) -> Self {
        let config = state.config.clone();
        let payments = Arc::new(PaymentService::new(
            Gateways::new(&config),
            state.billing.clone(),
            state.store.clone(),
            state.mailer.clone(),
        ));
        Self {
            config,
            state,
            payments,
        }
    }

    pub fn payments(&self) -> Arc<PaymentService> {
        self.payments.clone()
    }

    /// The full application router.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.payments.clone())
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

/// Merge every router and apply the shared middleware stack.
pub fn build_router(state: ManagementState, payments: Arc<PaymentService>) -> Router {
    let body_limit = state.config.api.body_limit_bytes;
    let probes = ProbeState {
        management: state.clone(),
        start_time: Instant::now(),
    };
    let billing = BillingState { payments };

    let operations = Router::new()
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(probes);

    let billing_public = Router::new()
        .route("/api/v1/payments/plans", get(billing_rest::list_plans))
        .route("/api/v1/payments/webhooks/mpesa", post(billing_rest::mpesa_webhook))
        .route("/api/v1/payments/webhooks/paypal", post(billing_rest::paypal_webhook))
        .route("/api/v1/payments/webhooks/stripe", post(billing_rest::stripe_webhook));

    let billing_protected = Router::new()
        .route("/api/v1/payments", get(billing_rest::list_payments))
        .route("/api/v1/payments/initiate", post(billing_rest::initiate_payment))
        .route("/api/v1/payments/:id", get(billing_rest::get_payment))
        .route("/api/v1/payments/:id/query", post(billing_rest::query_payment))
        .route("/api/v1/subscription", get(billing_rest::get_subscription))
        .route("/api/v1/subscription/cancel", post(billing_rest::cancel_subscription))
        .route_layer(middleware::from_fn(tenant_guard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let billing = billing_public.merge(billing_protected).with_state(billing);

    Router::new()
        .merge(management_router(state))
        .merge(billing)
        .merge(operations)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
