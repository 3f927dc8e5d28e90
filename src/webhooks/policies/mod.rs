//! Pod security validation policies.
//!
//! Each policy is a pure check over a [`PodSpecContext`]. The catalog order
//! below is the order rules run in; the first failing rule decides the
//! response.
//!
//! | Rule | Rejects |
//! |------|---------|
//! | `run-as-non-root` | Containers that may run as root |
//! | `privileged-container` | Privileged containers |
//! | `privilege-escalation-container` | Containers allowing privilege escalation |
//! | `host-pid` | Pods sharing the host PID namespace |
//! | `host-ipc` | Pods sharing the host IPC namespace |
//! | `host-network` | Pods on the host network |
//! | `verify-add-container-capabilities` | Containers adding capabilities |
//! | `verify-drop-container-capabilities` | Containers not dropping `ALL` or `NET_RAW` |
//! | `trusted-image-registry` | Images outside the trusted registries (when configured) |
//! | `default-service-account` | Pods using the empty or `default` service account |

pub mod capabilities;
pub mod host;
pub mod images;
pub mod privileged;
pub mod service_account;

use std::sync::Arc;

use k8s_openapi::api::core::v1::{Container, PodSpec};
use kube::core::DynamicObject;

use crate::config::RuleSettings;
use crate::pipeline::{RuleCatalog, RuleDefinition, Violation};
use crate::resources::display_identity;

pub use capabilities::{ADD_CAPABILITIES, DROP_CAPABILITIES};
pub use host::{HOST_IPC, HOST_NETWORK, HOST_PID};
pub use images::TRUSTED_IMAGE_REGISTRY;
pub use privileged::{ALLOW_PRIVILEGE_ESCALATION, PRIVILEGED, RUN_AS_NON_ROOT};
pub use service_account::DEFAULT_SERVICE_ACCOUNT;

/// The immutable input every rule observes for one admission request
#[derive(Debug, Clone)]
pub struct PodSpecContext {
    /// The object under admission
    pub resource: DynamicObject,
    /// The pod spec resolved from the object
    pub pod_spec: PodSpec,
    /// Rule settings resolved at startup
    pub settings: Arc<RuleSettings>,
}

impl PodSpecContext {
    pub fn new(resource: DynamicObject, pod_spec: PodSpec, settings: Arc<RuleSettings>) -> Self {
        Self {
            resource,
            pod_spec,
            settings,
        }
    }

    /// Lowercased `kind/name in namespace ns` of the object, as used in denials
    pub fn identity(&self) -> String {
        display_identity(&self.resource).to_lowercase()
    }

    /// Regular containers
    pub fn containers(&self) -> &[Container] {
        &self.pod_spec.containers
    }

    /// Init containers followed by regular containers
    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.pod_spec
            .init_containers
            .iter()
            .flatten()
            .chain(self.pod_spec.containers.iter())
    }
}

/// A pod security rule
pub type PodRule = RuleDefinition<PodSpecContext>;

/// Collect the containers matching a predicate into a violation
pub(crate) fn offending_containers<'a>(
    containers: impl IntoIterator<Item = &'a Container>,
    message: &str,
    offends: impl Fn(&Container) -> bool,
) -> Result<(), Violation> {
    let offenders: Vec<String> = containers
        .into_iter()
        .filter(|container| offends(container))
        .map(|container| container.name.clone())
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(Violation::with_offenders(message, offenders))
    }
}

/// The full rule catalog in registration order
pub fn catalog() -> RuleCatalog<PodSpecContext> {
    RuleCatalog::new(vec![
        // no root containers and no privilege escalation
        PodRule::new(RUN_AS_NON_ROOT, privileged::run_as_non_root),
        PodRule::new(PRIVILEGED, privileged::privileged),
        PodRule::new(
            ALLOW_PRIVILEGE_ESCALATION,
            privileged::allow_privilege_escalation,
        ),
        // host resource access
        PodRule::new(HOST_PID, host::host_pid),
        PodRule::new(HOST_IPC, host::host_ipc),
        PodRule::new(HOST_NETWORK, host::host_network),
        // container capabilities
        PodRule::new(ADD_CAPABILITIES, capabilities::add_capabilities),
        PodRule::new(DROP_CAPABILITIES, capabilities::drop_capabilities),
        // images
        PodRule::new(TRUSTED_IMAGE_REGISTRY, images::trusted_image_registry),
        // service accounts
        PodRule::new(
            DEFAULT_SERVICE_ACCOUNT,
            service_account::default_service_account,
        ),
    ])
}
