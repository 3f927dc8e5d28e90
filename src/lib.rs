//! pod-security-webhook library crate
//!
//! A validating admission webhook that rejects pods, and the workloads that
//! template them, when they break pod security rules.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`resources`] | Locate the pod spec inside a workload object |
//! | [`pipeline`] | Rule definitions, catalog and fail-fast execution |
//! | [`webhooks`] | The rules, overrides and admission review handling |
//! | [`config`] | Environment configuration |
//! | [`health`] | Probes and Prometheus metrics |

pub mod config;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod resources;
pub mod webhooks;

pub use config::{ConfigError, RuleOverrides, RuleSettings, WebhookConfig};
pub use error::{Error, PolicyViolation, Result};
pub use health::HealthState;
pub use webhooks::{AdmissionEngine, WebhookError, WebhookState, run_webhook_server};
