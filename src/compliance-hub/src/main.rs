//! ComplianceHub — multi-tenant regulatory compliance management.
//!
//! Main entry point that wires the store, billing, email and cron jobs and
//! starts the HTTP server.

use clap::Parser;
use compliance_api::ApiServer;
use compliance_billing::BillingEngine;
use compliance_channels::EmailService;
use compliance_core::config::AppConfig;
use compliance_cron::CronRunner;
use compliance_management::demo::seed_demo;
use compliance_management::ManagementState;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "compliance-hub")]
#[command(about = "Multi-tenant regulatory compliance management")]
#[command(version)]
struct Cli {
    /// HTTP port (overrides config)
    #[arg(long, env = "COMPLIANCE_HUB__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Prometheus exporter port (overrides config)
    #[arg(long, env = "COMPLIANCE_HUB__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Do not run the periodic reminder / expiry jobs
    #[arg(long, default_value_t = false)]
    no_cron: bool,

    /// Create a demo bank tenant on startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,

    /// Allow the built-in development token secret
    #[arg(long, default_value_t = false)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compliance_hub=info,compliance_management=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("ComplianceHub starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if cli.no_cron {
        config.cron.enabled = false;
    }

    if config.auth.uses_dev_secret() {
        if !(cli.dev || cli.seed_demo) {
            anyhow::bail!(
                "auth.token_secret is unset or the built-in development value; \
                 set COMPLIANCE_HUB__AUTH__TOKEN_SECRET or pass --dev"
            );
        }
        warn!("Using the built-in development token secret; /ready will report 503");
    }

    info!(
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        email_provider = ?config.email.provider,
        cron = config.cron.enabled,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let billing = Arc::new(BillingEngine::new(config.billing.clone()));
    let mailer = Arc::new(EmailService::new(config.email.clone()));
    let state = ManagementState::new(config.clone(), billing, mailer);

    if cli.seed_demo {
        seed_demo(&state)?;
    }

    let api_server = ApiServer::new(state.clone());

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics() {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    if config.cron.enabled {
        Arc::new(CronRunner::new(&state)).spawn();
    } else {
        info!("Cron jobs disabled");
    }

    info!("ComplianceHub is ready to serve traffic");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}
