//! Webhook module for validating pod security admission requests.
//!
//! - [`policies`]: the rule catalog
//! - [`overrides`]: which rules sit out a given request
//! - [`review`]: decode, validate and answer an admission review
//! - `server`: the TLS listener in front of it all

pub mod overrides;
pub mod policies;
pub mod review;
mod server;

pub use overrides::{SkipReason, SkippedRule};
pub use policies::{PodRule, PodSpecContext};
pub use review::{AdmissionEngine, Decision, Outcome, Verdict};
pub use server::{
    HEALTH_BODY, WebhookError, WebhookState, create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
