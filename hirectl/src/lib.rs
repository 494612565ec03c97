//! # hirectl: the hiring control layer
//!
//! `hirectl` is the accounting and safety core of a multi-tenant interview and assessment
//! platform. It decides whether a user may start an interview, aptitude test or coding
//! assessment, charges exactly one credit for it, and watches what candidates say during the
//! session.
//!
//! ## Architecture
//!
//! - **[`credits`]**: The Credit Ledger. Prepaid packs with six independent resource counters,
//!   derived balances and atomic, race-free deduction with a usage log
//! - **[`guardrails`]**: Prompt-injection and toxicity detection over single utterances and
//!   whole transcripts, plus EEO-safe do-not-ask instructions for the interviewer
//! - **[`sessions`]**: Session start (deduct first) and guardrail-driven termination
//! - **[`api`]**: Thin HTTP surface under `/admin/api/v1`
//! - **[`db`]**: PostgreSQL persistence through per-table repositories
//!
//! Packs live either in PostgreSQL or, for development and tests, in process. The choice is made
//! by `database.type` in the configuration (see [`config`]).
//!
//! ## Getting Started
//!
//! ```bash
//! # In-memory store, no database needed
//! cargo run
//!
//! # PostgreSQL, migrations run on startup
//! DATABASE_URL=postgres://localhost/hirectl cargo run -- -f config.yaml
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod credits;
pub mod db;
pub mod errors;
pub mod guardrails;
pub mod metrics;
mod openapi;
pub mod sessions;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bon::Builder;
use prometheus::{Encoder, Registry, TextEncoder};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, error, info};
use utoipa::OpenApi;

pub use config::Config;
use config::{DatabaseConfig, PoolSettings};
use credits::CreditLedger;
use credits::store::{DynPackStore, InMemoryPackStore, PostgresPackStore};
use guardrails::GuardrailEvaluator;
use metrics::{GuardrailMetrics, LedgerMetrics};
use openapi::ApiDoc;

/// Application state shared across all request handlers.
///
/// - `config`: Application configuration loaded from file and environment
/// - `ledger`: The credit ledger over the configured pack store
/// - `guardrails`: The guardrail evaluator with the default detectors
/// - `metrics_registry`: Prometheus registry rendered at `/internal/metrics` (when enabled)
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub ledger: CreditLedger,
    pub guardrails: GuardrailEvaluator,
    pub metrics_registry: Option<Registry>,
}

/// Get the hirectl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

async fn connect(url: &str, pool: &PoolSettings) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(pool.max_connections)
        .min_connections(pool.min_connections)
        .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    migrator().run(&db).await.context("Failed to run database migrations")?;
    Ok(db)
}

/// Pick the pack store named by the configuration. Returns the pool as well for an external
/// database so it can be closed on shutdown.
async fn setup_store(config: &Config) -> anyhow::Result<(DynPackStore, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::InMemory => {
            info!("Using in-memory pack store; packs will not survive a restart");
            Ok((Arc::new(InMemoryPackStore::new()), None))
        }
        DatabaseConfig::External { url, pool } => {
            let db = connect(url, pool).await?;
            info!("Connected to PostgreSQL pack store");
            Ok((Arc::new(PostgresPackStore::new(db.clone())), Some(db)))
        }
    }
}

/// Build the shared state around a pack store.
pub fn build_state(config: Config, store: DynPackStore) -> anyhow::Result<AppState> {
    let validity = chrono::Duration::from_std(config.credits.validity).context("credits.validity is out of range")?;

    let (registry, ledger_metrics, guardrail_metrics) = if config.enable_metrics {
        let registry = Registry::new();
        let ledger_metrics = LedgerMetrics::new(&registry)?;
        let guardrail_metrics = GuardrailMetrics::new(&registry)?;
        (Some(registry), Some(ledger_metrics), Some(guardrail_metrics))
    } else {
        (None, None, None)
    };

    let ledger = CreditLedger::builder()
        .store(store)
        .validity(validity)
        .draw_order(config.credits.draw_order)
        .maybe_metrics(ledger_metrics)
        .build();

    let mut evaluator = GuardrailEvaluator::default();
    if let Some(metrics) = guardrail_metrics {
        evaluator = evaluator.with_metrics(metrics);
    }

    Ok(AppState::builder()
        .config(config)
        .ledger(ledger)
        .guardrails(evaluator)
        .maybe_metrics_registry(registry)
        .build())
}

fn render_metrics(registry: &Registry) -> axum::response::Response {
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        Ok(()) => (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned()).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the application router.
///
/// - `/admin/api/v1/*`: credits and guardrails API
/// - `/healthz`: liveness
/// - `/api-docs/openapi.json`: OpenAPI document
/// - `/internal/metrics`: Prometheus text format, when metrics are enabled
pub fn build_router(state: &AppState) -> Router {
    let api_routes = Router::new()
        // Credits
        .route("/users/current/credits/balance", get(api::handlers::credits::get_current_user_balance))
        .route("/users/current/credits/packs", get(api::handlers::credits::list_current_user_packs))
        .route("/users/current/credits/history", get(api::handlers::credits::list_current_user_history))
        .route("/users/current/credits/purchase", post(api::handlers::credits::purchase_credits))
        .route("/users/{user_id}/credits/packs", post(api::handlers::credits::grant_user_credits))
        .route("/users/{user_id}/credits/balance", get(api::handlers::credits::get_user_balance))
        // Guardrails
        .route("/guardrails/check", post(api::handlers::guardrails::check_utterance))
        .route("/guardrails/transcript", post(api::handlers::guardrails::audit_transcript))
        .route("/guardrails/instructions", post(api::handlers::guardrails::build_instructions))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/admin/api/v1", api_routes);

    if let Some(registry) = state.metrics_registry.clone() {
        router = router.route("/internal/metrics", get(move || async move { render_metrics(&registry) }));
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

pub struct Application {
    router: Router,
    app_state: AppState,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with its store connected and migrated
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting hirectl with configuration: {:#?}", config);

        let (store, pool) = setup_store(&config).await?;
        let app_state = build_state(config, store)?;
        let router = build_router(&app_state);

        Ok(Self { router, app_state, pool })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = &self.app_state.config;
        let bind_addr = config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("hirectl listening on http://{}, available at http://localhost:{}", bind_addr, config.port);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();
        Ok(())
    }
}
