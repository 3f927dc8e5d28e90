//! Linux capability policies.
//!
//! Validates:
//! - No container adds capabilities
//! - Every container drops `ALL` or `NET_RAW`

use super::{PodSpecContext, offending_containers};
use crate::pipeline::Violation;
use crate::resources::security::{capabilities, has_any_capability};

pub const ADD_CAPABILITIES: &str = "verify-add-container-capabilities";
pub const DROP_CAPABILITIES: &str = "verify-drop-container-capabilities";

/// Capabilities, any of which satisfies the drop requirement
pub const REQUIRED_DROP_CAPABILITIES: [&str; 2] = ["ALL", "NET_RAW"];

const ERR_ADD_CAPABILITIES: &str = "unable to permit container adding escalated capabilities";
const ERR_MISSING_DROP_CAPABILITIES: &str =
    "unable to permit container missing either drop capabilities of ALL or NET_RAW";

/// Reject containers requesting additional capabilities
pub fn add_capabilities(ctx: &PodSpecContext) -> Result<(), Violation> {
    offending_containers(ctx.containers(), ERR_ADD_CAPABILITIES, |container| {
        capabilities(container)
            .and_then(|caps| caps.add.as_ref())
            .is_some_and(|add| !add.is_empty())
    })
}

/// Reject containers that do not drop `ALL` or `NET_RAW`.
///
/// A missing capabilities block or an empty drop list counts as not dropping.
pub fn drop_capabilities(ctx: &PodSpecContext) -> Result<(), Violation> {
    offending_containers(
        ctx.containers(),
        ERR_MISSING_DROP_CAPABILITIES,
        |container| {
            !capabilities(container)
                .and_then(|caps| caps.drop.as_deref())
                .is_some_and(|drop| has_any_capability(drop, &REQUIRED_DROP_CAPABILITIES))
        },
    )
}
