//! Admission webhook server.
//!
//! Serves the validating webhook over TLS:
//! - `POST /validate` - admission review in, admission review out
//! - `GET /healthz` - liveness for the webhook listener itself
//!
//! Certificates are read once at startup from the configured paths.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::WebhookConfig;
use crate::health::HealthState;
use crate::webhooks::review::AdmissionEngine;

/// Body returned by the webhook listener's own health check
pub const HEALTH_BODY: &str = r#"{"msg": "server is healthy"}"#;

const CONTENT_TYPE_JSON: &str = "application/json";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub engine: AdmissionEngine,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(engine: AdmissionEngine, health: Arc<HealthState>) -> Self {
        Self { engine, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Validating admission handler
async fn validate(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    let started = Instant::now();
    let outcome = state.engine.review(&body);
    state
        .health
        .observe_review(&outcome, started.elapsed().as_secs_f64());

    match serde_json::to_vec(&outcome.review) {
        Ok(json) => {
            debug!(response = %String::from_utf8_lossy(&json), "sending admission response");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
                json,
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "unable to marshal admission response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("could not marshal response: {e}"),
            )
                .into_response()
        }
    }
}

/// Webhook listener health handler
async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
        HEALTH_BODY,
    )
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port. The webhook is marked ready once
/// the certificate pair has loaded.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    state: Arc<WebhookState>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;

    let health = Arc::clone(&state.health);
    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(&config.tls_cert_path, &config.tls_key_path)
        .await
        .map_err(|e| {
            WebhookError::TlsConfig(format!(
                "unable to load key pair {} / {}: {}",
                config.tls_cert_path.display(),
                config.tls_key_path.display(),
                e
            ))
        })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Webhook server listening with TLS");
    health.set_ready(true).await;

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
