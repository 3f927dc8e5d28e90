//! Trusted image registry policy.
//!
//! Opt-in: with no trusted registries configured every image passes. When
//! configured, each init and regular container image must start with one of
//! the trusted prefixes.

use super::{PodSpecContext, offending_containers};
use crate::pipeline::Violation;

pub const TRUSTED_IMAGE_REGISTRY: &str = "trusted-image-registry";

/// Reject images pulled from registries outside the trusted set
pub fn trusted_image_registry(ctx: &PodSpecContext) -> Result<(), Violation> {
    let trusted = &ctx.settings.trusted_registries;
    if trusted.is_empty() {
        return Ok(());
    }

    let message = format!(
        "unable to permit pod with images from an untrusted registry - container not using registry {}",
        trusted.join(",")
    );

    offending_containers(ctx.all_containers(), &message, |container| {
        let image = container.image.as_deref().unwrap_or_default();
        !trusted.iter().any(|prefix| image.starts_with(prefix.as_str()))
    })
}
