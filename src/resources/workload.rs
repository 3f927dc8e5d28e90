//! Pod specification extraction from workload objects.
//!
//! Admission requests carry the object as opaque JSON. Each supported workload
//! kind nests its pod template at a fixed location; [`WorkloadKind`] maps the
//! kind to that location and [`resolve_pod_spec`] projects it out as a typed
//! [`PodSpec`].

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::PodSpec;
use kube::core::DynamicObject;
use thiserror::Error;

use super::common::kind_of;

/// Errors raised while resolving a pod specification
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The object kind has no known pod template location
    #[error("error validating kind - [{0}]")]
    UnsupportedKind(String),

    /// The nested pod template could not be decoded
    #[error("unable to convert {kind} to typed object: {source}")]
    Conversion {
        kind: WorkloadKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Workload kinds the webhook knows how to validate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    CronJob,
    Job,
}

impl WorkloadKind {
    /// All supported kinds, in documentation order
    pub const ALL: [WorkloadKind; 6] = [
        WorkloadKind::Pod,
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::DaemonSet,
        WorkloadKind::CronJob,
        WorkloadKind::Job,
    ];

    /// The Kubernetes `kind` string
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Pod => "Pod",
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::Job => "Job",
        }
    }

    /// JSON pointer from the object root to the pod spec
    pub fn pod_spec_pointer(&self) -> &'static str {
        match self {
            WorkloadKind::Pod => "/spec",
            WorkloadKind::Deployment
            | WorkloadKind::StatefulSet
            | WorkloadKind::DaemonSet
            | WorkloadKind::Job => "/spec/template/spec",
            WorkloadKind::CronJob => "/spec/jobTemplate/spec/template/spec",
        }
    }

    /// Project the pod spec out of an object of this kind.
    ///
    /// A missing template yields an empty pod spec; a template that is
    /// present but malformed is a conversion error.
    pub fn pod_spec(&self, object: &DynamicObject) -> Result<PodSpec, ResolveError> {
        match object.data.pointer(self.pod_spec_pointer()) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|source| ResolveError::Conversion { kind: *self, source }),
            None => Ok(PodSpec::default()),
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = ResolveError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        WorkloadKind::ALL
            .into_iter()
            .find(|k| k.as_str() == kind)
            .ok_or_else(|| ResolveError::UnsupportedKind(kind.to_string()))
    }
}

/// Resolve the pod specification of a workload object
pub fn resolve_pod_spec(object: &DynamicObject) -> Result<PodSpec, ResolveError> {
    kind_of(object).parse::<WorkloadKind>()?.pod_spec(object)
}
