//! Effective security attribute resolution.
//!
//! Container-level security context settings override pod-level ones. Every
//! rule that needs a merged value goes through these helpers so the
//! precedence is defined in exactly one place.

use k8s_openapi::api::core::v1::{Capabilities, Container, PodSecurityContext, SecurityContext};

/// Whether a container effectively enforces running as non-root.
///
/// Container setting, then pod setting, then `false`.
pub fn effective_run_as_non_root(
    pod: Option<&PodSecurityContext>,
    container: Option<&SecurityContext>,
) -> bool {
    container
        .and_then(|sc| sc.run_as_non_root)
        .or_else(|| pod.and_then(|sc| sc.run_as_non_root))
        .unwrap_or(false)
}

/// The effective user id of a container, if any is set.
///
/// Container setting, then pod setting, then unset.
pub fn effective_run_as_user(
    pod: Option<&PodSecurityContext>,
    container: Option<&SecurityContext>,
) -> Option<i64> {
    container
        .and_then(|sc| sc.run_as_user)
        .or_else(|| pod.and_then(|sc| sc.run_as_user))
}

/// The capabilities block of a container, if it declares one
pub fn capabilities(container: &Container) -> Option<&Capabilities> {
    container
        .security_context
        .as_ref()
        .and_then(|sc| sc.capabilities.as_ref())
}

/// Whether any capability matches one of the given names, ignoring case
pub fn has_any_capability(capabilities: &[String], one_of: &[&str]) -> bool {
    capabilities
        .iter()
        .any(|cap| one_of.iter().any(|want| cap.eq_ignore_ascii_case(want)))
}

/// Read a boolean security context flag, treating a missing context as unset
pub fn container_flag(container: &Container, flag: fn(&SecurityContext) -> Option<bool>) -> bool {
    container
        .security_context
        .as_ref()
        .and_then(flag)
        .unwrap_or(false)
}
