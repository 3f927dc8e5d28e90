//! Workload object handling.
//!
//! Turns the opaque objects carried by admission requests into the typed pod
//! specification the validation rules operate on.
//!
//! | Kind | Pod spec location |
//! |------|-------------------|
//! | Pod | `spec` |
//! | Deployment, StatefulSet, DaemonSet, Job | `spec.template.spec` |
//! | CronJob | `spec.jobTemplate.spec.template.spec` |

pub mod common;
pub mod security;
pub mod workload;

pub use common::{annotation, controller_owner, display_identity, is_empty_object, kind_of};
pub use workload::{ResolveError, WorkloadKind, resolve_pod_spec};
