//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 when ready to serve traffic)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

use crate::webhooks::{Outcome, SkippedRule};

/// Labels for review outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DecisionLabels {
    pub decision: String,
}

impl EncodeLabelSet for DecisionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("decision", self.decision.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-rule metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RuleLabels {
    pub rule: String,
}

impl EncodeLabelSet for RuleLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("rule", self.rule.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for skipped rules (rule + override mechanism)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SkipLabels {
    pub rule: String,
    pub reason: String,
}

impl EncodeLabelSet for SkipLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("rule", self.rule.as_str()).encode(encoder.encode_label())?;
        ("override", self.reason.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Reviews by decision
    pub admission_reviews_total: Family<DecisionLabels, Counter>,
    /// Denials by failing rule
    pub policy_denials_total: Family<RuleLabels, Counter>,
    /// Rules left out of a pipeline, by rule and override
    pub rules_skipped_total: Family<SkipLabels, Counter>,
    /// Review duration histogram
    pub admission_duration_seconds: Histogram,
    /// Completion time of the last review (Unix epoch seconds)
    pub last_review_timestamp_seconds: Gauge,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_reviews_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "podsecurity_admission_reviews",
            "Total number of admission reviews by decision",
            admission_reviews_total.clone(),
        );

        let policy_denials_total = Family::<RuleLabels, Counter>::default();
        registry.register(
            "podsecurity_policy_denials",
            "Total number of admission requests denied by each rule",
            policy_denials_total.clone(),
        );

        let rules_skipped_total = Family::<SkipLabels, Counter>::default();
        registry.register(
            "podsecurity_rules_skipped",
            "Total number of rules skipped through overrides",
            rules_skipped_total.clone(),
        );

        let admission_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 15));
        registry.register(
            "podsecurity_admission_duration_seconds",
            "Duration of admission reviews in seconds",
            admission_duration_seconds.clone(),
        );

        let last_review_timestamp_seconds = Gauge::default();
        registry.register(
            "podsecurity_last_review_timestamp_seconds",
            "Unix time at which the last admission review completed",
            last_review_timestamp_seconds.clone(),
        );

        Self {
            admission_reviews_total,
            policy_denials_total,
            rules_skipped_total,
            admission_duration_seconds,
            last_review_timestamp_seconds,
            registry,
        }
    }

    /// Record one completed review
    pub fn record_review(&self, outcome: &Outcome, duration_secs: f64) {
        let labels = DecisionLabels {
            decision: outcome.verdict.label().to_string(),
        };
        self.admission_reviews_total.get_or_create(&labels).inc();
        self.admission_duration_seconds.observe(duration_secs);
        self.last_review_timestamp_seconds.set(unix_now());

        if let Some(rule) = outcome.verdict.denied_by() {
            self.record_denial(rule);
        }
        for skipped in &outcome.skipped {
            self.record_skip(skipped);
        }
    }

    /// Record a denial by a rule
    pub fn record_denial(&self, rule: &str) {
        let labels = RuleLabels {
            rule: rule.to_string(),
        };
        self.policy_denials_total.get_or_create(&labels).inc();
    }

    pub fn record_skip(&self, skipped: &SkippedRule) {
        let labels = SkipLabels {
            rule: skipped.rule.to_string(),
            reason: skipped.reason.label().to_string(),
        };
        self.rules_skipped_total.get_or_create(&labels).inc();
    }

    /// Completion time of the last review, 0 before the first one
    pub fn last_review(&self) -> i64 {
        self.last_review_timestamp_seconds.get()
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook is ready (TLS listener started)
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    /// Record a completed review
    pub fn observe_review(&self, outcome: &Outcome, duration_secs: f64) {
        self.metrics.record_review(outcome, duration_secs);
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK once the webhook listener is up.
/// Returns 503 Service Unavailable otherwise, including during shutdown.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0 on the given port and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
