//! Prometheus metrics collection for Rever
//!
//! Tracks:
//! - Completions by response mode and outcome, and their latency
//! - Upstream attempts by outcome (one completion may make several)
//! - Accounts disabled after Retool rejected their credentials
//! - Agents found by the last discovery pass
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Upstream attempt outcomes; anything else is folded into `other`
const ATTEMPT_OUTCOMES: [&str; 5] = ["success", "unauthorized", "unreachable", "timeout", "run_failed"];

/// Metrics collector
///
/// Cheap to share behind an `Arc`; every recording method is infallible
/// because label values come from closed sets.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    completions_total: IntCounterVec,
    completion_duration: HistogramVec,
    upstream_attempts_total: IntCounterVec,
    accounts_invalidated_total: IntCounter,
    discovered_agents: IntGauge,
}

impl Metrics {
    /// Create a new Metrics instance with its own registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 modes × 2 outcomes
        let completions_total = IntCounterVec::new(
            Opts::new(
                "rever_completions_total",
                "Total chat completion requests by response mode (json, stream) and outcome",
            ),
            &["mode", "outcome"],
        )?;

        // Upstream runs poll for up to minutes, so buckets reach 300s
        let completion_duration = HistogramVec::new(
            HistogramOpts::new(
                "rever_completion_duration_seconds",
                "Time from request to final upstream answer, including failover",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
            &["mode"],
        )?;

        let upstream_attempts_total = IntCounterVec::new(
            Opts::new(
                "rever_upstream_attempts_total",
                "Total upstream attempts by outcome (success, unauthorized, unreachable, timeout, run_failed)",
            ),
            &["outcome"],
        )?;

        let accounts_invalidated_total = IntCounter::with_opts(Opts::new(
            "rever_accounts_invalidated_total",
            "Accounts disabled for the process lifetime after an authorization failure",
        ))?;

        let discovered_agents = IntGauge::with_opts(Opts::new(
            "rever_discovered_agents",
            "Agents found across all accounts by the last discovery pass",
        ))?;

        registry.register(Box::new(completions_total.clone()))?;
        registry.register(Box::new(completion_duration.clone()))?;
        registry.register(Box::new(upstream_attempts_total.clone()))?;
        registry.register(Box::new(accounts_invalidated_total.clone()))?;
        registry.register(Box::new(discovered_agents.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            completions_total,
            completion_duration,
            upstream_attempts_total,
            accounts_invalidated_total,
            discovered_agents,
        })
    }

    /// Record a finished completion request
    pub fn completion(&self, mode: &'static str, success: bool, elapsed: Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.completions_total
            .with_label_values(&[mode, outcome])
            .inc();
        self.completion_duration
            .with_label_values(&[mode])
            .observe(elapsed.as_secs_f64());
    }

    pub fn completions_count(&self, mode: &str, outcome: &str) -> u64 {
        self.completions_total
            .with_label_values(&[mode, outcome])
            .get()
    }

    /// Record one upstream attempt
    pub fn upstream_attempt(&self, outcome: &str) {
        let label = if ATTEMPT_OUTCOMES.contains(&outcome) {
            outcome
        } else {
            "other"
        };
        self.upstream_attempts_total
            .with_label_values(&[label])
            .inc();
    }

    pub fn upstream_attempts_count(&self, outcome: &str) -> u64 {
        self.upstream_attempts_total
            .with_label_values(&[outcome])
            .get()
    }

    pub fn account_invalidated(&self) {
        self.accounts_invalidated_total.inc();
    }

    pub fn accounts_invalidated_count(&self) -> u64 {
        self.accounts_invalidated_total.get()
    }

    /// Record the result of a discovery pass
    pub fn set_discovered_agents(&self, agents: usize) {
        self.discovered_agents.set(agents as i64);
    }

    /// Gather all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_families.len(),
                    "Prometheus text encoder failed"
                );
                e
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Prometheus encoder produced invalid UTF-8 at byte {}",
                e.utf8_error().valid_up_to()
            ))
        })
    }
}
