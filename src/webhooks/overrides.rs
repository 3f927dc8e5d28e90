//! Rule override policy.
//!
//! Three independent mechanisms can take a rule out of a request's active
//! pipeline, checked in this order:
//! 1. Process-wide: `VALIDATE_<RULE_NAME>=false` in the environment
//! 2. Ownership: a pod owned by a workload controller (its template is
//!    admitted on its own)
//! 3. Per object: a non-empty `ignore-check.kube-linter.io/<rule>` annotation

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{debug, info};

use crate::config::{RULE_OVERRIDE_ENV_PREFIX, RuleOverrides, SKIP_VALIDATION_ENV_VALUE};
use crate::pipeline::{Pipeline, RuleCatalog};
use crate::resources::{annotation, controller_owner, display_identity};
use crate::webhooks::policies::{ADD_CAPABILITIES, DROP_CAPABILITIES, PodSpecContext};

/// Annotation namespace shared with kube-linter
pub const ANNOTATION_OVERRIDE_PREFIX: &str = "ignore-check.kube-linter.io/";

/// kube-linter check covering both capability rules
pub const CONTAINER_CAPABILITIES_ALIAS: &str = "verify-container-capabilities";

/// Environment variable that disables a rule: `VALIDATE_` + upper snake case
pub fn env_override_key(rule: &str) -> String {
    format!(
        "{}{}",
        RULE_OVERRIDE_ENV_PREFIX,
        rule.replace('-', "_").to_uppercase()
    )
}

/// The kube-linter check name a rule is known by, when it differs from its own
pub fn annotation_alias(rule: &str) -> Option<&'static str> {
    match rule {
        ADD_CAPABILITIES | DROP_CAPABILITIES => Some(CONTAINER_CAPABILITIES_ALIAS),
        _ => None,
    }
}

/// Annotation key that disables a rule for one object
pub fn annotation_override_key(rule: &str) -> String {
    format!(
        "{}{}",
        ANNOTATION_OVERRIDE_PREFIX,
        annotation_alias(rule).unwrap_or(rule)
    )
}

/// Why a rule was left out of a request's pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Disabled for the whole process
    Environment { variable: String },
    /// The pod belongs to a workload controller
    OwnerReference { kind: String, name: String },
    /// The object opted out through an annotation
    Annotation { key: String, value: String },
}

impl SkipReason {
    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Environment { .. } => "environment",
            SkipReason::OwnerReference { .. } => "owner-reference",
            SkipReason::Annotation { .. } => "annotation",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Environment { variable } => {
                write!(f, "env var [{variable}={SKIP_VALIDATION_ENV_VALUE}]")
            }
            SkipReason::OwnerReference { kind, name } => {
                write!(f, "owner reference [{kind}/{name}]")
            }
            SkipReason::Annotation { key, value } => write!(f, "annotation [{key}={value}]"),
        }
    }
}

/// A rule excluded from a request's pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub rule: &'static str,
    pub reason: SkipReason,
}

/// Decide whether a rule should be skipped for this request
pub fn skip_reason(
    overrides: &RuleOverrides,
    rule: &str,
    ctx: &PodSpecContext,
) -> Option<SkipReason> {
    let variable = env_override_key(rule);
    if overrides.is_disabled(&variable) {
        return Some(SkipReason::Environment { variable });
    }

    if let Some(OwnerReference { kind, name, .. }) = controller_owner(&ctx.resource) {
        return Some(SkipReason::OwnerReference {
            kind: kind.clone(),
            name: name.clone(),
        });
    }

    let key = annotation_override_key(rule);
    match annotation(&ctx.resource, &key) {
        Some(value) if !value.is_empty() => Some(SkipReason::Annotation {
            key,
            value: value.to_string(),
        }),
        _ => None,
    }
}

/// Filter the catalog down to the rules active for this request.
///
/// Survivors keep their catalog order.
pub fn build_pipeline<'a>(
    catalog: &'a RuleCatalog<PodSpecContext>,
    overrides: &RuleOverrides,
    ctx: &'a PodSpecContext,
) -> (Pipeline<'a, PodSpecContext>, Vec<SkippedRule>) {
    let mut pipeline = Pipeline::new(ctx);
    let mut skipped = Vec::new();

    for rule in catalog.iter() {
        match skip_reason(overrides, rule.name(), ctx) {
            None => pipeline.register(rule),
            Some(reason) => {
                // one skip per rule for every replica a controller creates; keep it quiet
                let resource = display_identity(&ctx.resource);
                if matches!(reason, SkipReason::OwnerReference { .. }) {
                    debug!(rule = rule.name(), %resource, "skipping validation due to {}", reason);
                } else {
                    info!(rule = rule.name(), %resource, "skipping validation due to {}", reason);
                }
                skipped.push(SkippedRule {
                    rule: rule.name(),
                    reason,
                });
            }
        }
    }

    (pipeline, skipped)
}
