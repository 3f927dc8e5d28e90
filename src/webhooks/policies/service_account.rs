//! Service account policy.

use super::PodSpecContext;
use crate::pipeline::Violation;

pub const DEFAULT_SERVICE_ACCOUNT: &str = "default-service-account";

/// Name of the service account every namespace provisions
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "default";

/// Reject pods running as the namespace's default (or an unnamed) service account
pub fn default_service_account(ctx: &PodSpecContext) -> Result<(), Violation> {
    match ctx.pod_spec.service_account_name.as_deref().unwrap_or_default() {
        "" => Err(Violation::new(
            "unable to permit pod attempting to use empty service account",
        )),
        DEFAULT_SERVICE_ACCOUNT_NAME => Err(Violation::new(
            "unable to permit pod attempting to use the default service account",
        )),
        _ => Ok(()),
    }
}
