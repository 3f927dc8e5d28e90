//! Root user and privilege policies.
//!
//! Validates:
//! - Containers run as a non-root user
//! - Containers are not privileged
//! - Containers do not allow privilege escalation

use super::{PodSpecContext, offending_containers};
use crate::pipeline::Violation;
use crate::resources::security::{
    container_flag, effective_run_as_non_root, effective_run_as_user,
};

pub const RUN_AS_NON_ROOT: &str = "run-as-non-root";
pub const PRIVILEGED: &str = "privileged-container";
pub const ALLOW_PRIVILEGE_ESCALATION: &str = "privilege-escalation-container";

const ERR_RUN_AS_ROOT: &str = "unable to permit pod attempting to run as root";
const ERR_PRIVILEGED: &str = "unable to permit privileged container";
const ERR_PRIVILEGE_ESCALATION: &str =
    "unable to permit container which allows privileged escalation";

/// Reject containers that may run as root.
///
/// A positive effective user id is enough on its own. Otherwise the effective
/// run-as-non-root flag must be set, and must not be contradicted by an
/// explicit user id of 0.
pub fn run_as_non_root(ctx: &PodSpecContext) -> Result<(), Violation> {
    let pod = ctx.pod_spec.security_context.as_ref();

    offending_containers(ctx.containers(), ERR_RUN_AS_ROOT, |container| {
        let container_sc = container.security_context.as_ref();
        let run_as_user = effective_run_as_user(pod, container_sc);
        if run_as_user.is_some_and(|uid| uid > 0) {
            return false;
        }

        if effective_run_as_non_root(pod, container_sc) {
            return run_as_user == Some(0);
        }

        true
    })
}

/// Reject privileged containers
pub fn privileged(ctx: &PodSpecContext) -> Result<(), Violation> {
    offending_containers(ctx.containers(), ERR_PRIVILEGED, |container| {
        container_flag(container, |sc| sc.privileged)
    })
}

/// Reject containers that allow privilege escalation
pub fn allow_privilege_escalation(ctx: &PodSpecContext) -> Result<(), Violation> {
    offending_containers(ctx.containers(), ERR_PRIVILEGE_ESCALATION, |container| {
        container_flag(container, |sc| sc.allow_privilege_escalation)
    })
}
