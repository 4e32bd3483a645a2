//! Application wiring and lifecycle.
//!
//! Builds the ledger from configuration (store backend, payment gateway,
//! mailer), mounts the HTTP routes and serves them until a shutdown signal.

use crate::config::{CreditConfig, StoreBackend};
use crate::handlers;
use crate::ledger::{LedgerService, LedgerSettings, LedgerStore};
use crate::middleware::signature_validator;
use crate::services::{
    InMemoryLedgerStore, MockNotifier, MongoLedgerStore, Notifier, PaystackClient, SmtpNotifier,
};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, signature_validation_middleware,
    SignatureValidator, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
    pub signature: SignatureValidator,
}

impl AppState {
    pub fn new(ledger: LedgerService, signature: SignatureValidator) -> Self {
        Self { ledger, signature }
    }
}

/// All HTTP routes with the shared middleware stack.
///
/// Every route except health checks, metrics and gateway webhooks must carry a
/// valid request signature before caller headers are read.
pub fn router(state: AppState) -> Router {
    let signature = state.signature.clone();
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Tenant-scoped endpoints
        .route("/tenants", post(handlers::tenants::register_tenant))
        .route("/account", get(handlers::tenants::get_account))
        .route("/activities", get(handlers::tenants::list_activities))
        .route(
            "/jobs",
            post(handlers::jobs::create_job).get(handlers::jobs::list_jobs),
        )
        .route(
            "/expenses",
            post(handlers::expenses::record_expense).get(handlers::expenses::list_expenses),
        )
        .route("/credits/checkout", post(handlers::credits::begin_checkout))
        .route("/credits/verify", post(handlers::credits::verify_top_up))
        .route("/credits/transactions", get(handlers::credits::list_top_ups))
        // Gateway callbacks, authenticated by signature rather than caller headers
        .route("/webhooks/paystack", post(handlers::webhooks::paystack_webhook))
        // Pricing and super admin endpoints
        .route("/pricing", get(handlers::admin::get_pricing))
        .route("/admin/pricing", put(handlers::admin::update_pricing))
        .route("/admin/tenants", get(handlers::admin::list_tenants))
        .route(
            "/admin/tenants/:id/approve",
            post(handlers::admin::approve_tenant),
        )
        .layer(from_fn_with_state(
            signature,
            signature_validation_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: CreditConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn LedgerStore> = match config.store {
            StoreBackend::Mongo => {
                let store = MongoLedgerStore::connect(
                    config.mongodb.uri.expose_secret(),
                    &config.mongodb.database,
                )
                .await?;
                store.initialize_indexes().await?;
                tracing::info!(database = %config.mongodb.database, "Connected to MongoDB");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory ledger store; balances are lost on restart");
                Arc::new(InMemoryLedgerStore::new())
            }
        };

        let gateway = PaystackClient::new(config.paystack.clone());
        if gateway.is_configured() {
            tracing::info!("Paystack client initialized");
        } else {
            tracing::warn!("Paystack secret key not configured - top-ups will fail");
        }

        let notifier: Arc<dyn Notifier> = if config.smtp.enabled {
            tracing::info!(host = %config.smtp.host, "SMTP notifier enabled");
            Arc::new(SmtpNotifier::new(config.smtp.clone())?)
        } else {
            tracing::warn!("SMTP disabled - tenant emails are only logged");
            Arc::new(MockNotifier::new())
        };

        let ledger = LedgerService::new(
            store,
            Arc::new(gateway),
            notifier,
            LedgerSettings::from_config(&config.ledger),
            config.ledger.retry(),
        );

        if config.ledger.seed_default_pricing && ledger.seed_default_pricing().await? {
            tracing::info!("Seeded default pricing configuration");
        }

        if config.signing.secret.expose_secret().is_empty() {
            tracing::warn!("REQUEST_SIGNING_SECRET not set - signed routes will reject requests");
        }
        let signature = signature_validator(&config.signing);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: router(AppState::new(ledger, signature)),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
