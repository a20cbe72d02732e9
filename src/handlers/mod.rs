//! HTTP request handlers for the Rever API

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::{auth_middleware, request_id_middleware};
use crate::models::{AccountPool, ModelRegistry, RegistryCell};
use crate::shared::completion::Orchestrator;
use crate::telemetry::LogControl;
use crate::upstream::UpstreamClient;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod debug;
pub mod health;
pub mod metrics;
pub mod openai;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: Arc<AccountPool>,
    registry: Arc<RegistryCell>,
    client: Arc<dyn UpstreamClient>,
    orchestrator: Orchestrator,
    metrics: Arc<Metrics>,
    logs: Arc<LogControl>,
}

impl AppState {
    /// Build the state for `config`, talking to Retool through `client`
    ///
    /// The registry starts unpublished; call [`AppState::refresh_models`]
    /// before serving, or requests that need models will wait for it.
    pub fn new(config: Config, client: Arc<dyn UpstreamClient>) -> AppResult<Self> {
        let config = Arc::new(config);
        let pool = Arc::new(AccountPool::new(&config.accounts, &config.pool));
        let metrics = Arc::new(
            Metrics::new()
                .map_err(|e| AppError::Internal(format!("Failed to register metrics: {}", e)))?,
        );
        let orchestrator = Orchestrator::new(
            pool.clone(),
            client.clone(),
            metrics.clone(),
            config.upstream.run_timeout(),
        );

        Ok(Self {
            config,
            pool,
            registry: Arc::new(RegistryCell::new()),
            client,
            orchestrator,
            metrics,
            logs: Arc::new(LogControl::detached()),
        })
    }

    /// Attach the process-wide log control used by `/debug`
    pub fn with_log_control(mut self, logs: Arc<LogControl>) -> Self {
        self.logs = logs;
        self
    }

    /// Run a discovery pass over every account and publish the result
    pub async fn refresh_models(&self) -> Arc<ModelRegistry> {
        let registry = ModelRegistry::discover(&self.pool, self.client.as_ref()).await;
        self.metrics.set_discovered_agents(registry.agent_count());
        self.registry.publish(registry);
        self.registry.snapshot().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &AccountPool {
        &self.pool
    }

    pub fn registry(&self) -> &RegistryCell {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn log_control(&self) -> &LogControl {
        &self.logs
    }
}

/// Build the HTTP router
///
/// `/v1/*` requires a client API key; health, metrics, debug and the public
/// model list do not. Every response carries an `x-request-id` header,
/// including authentication failures.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/v1/chat/completions", post(openai::completions::handler))
        .route("/v1/models", get(openai::models::handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(api)
        .route("/models", get(openai::models::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/debug", get(debug::handler))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
