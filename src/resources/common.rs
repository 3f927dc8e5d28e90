//! Metadata helpers for admission objects.
//!
//! Provides consistent rendering of object identity, annotation lookup and
//! owner-reference inspection for the opaque objects carried by admission
//! requests.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use kube::core::DynamicObject;

/// Owner kinds whose pods are validated through the owning controller's template
pub const CONTROLLER_OWNER_KINDS: [&str; 6] = [
    "ReplicaSet",
    "Deployment",
    "DaemonSet",
    "StatefulSet",
    "CronJob",
    "Job",
];

/// The object's `kind`, or an empty string when type metadata is absent
pub fn kind_of(object: &DynamicObject) -> &str {
    object
        .types
        .as_ref()
        .map(|t| t.kind.as_str())
        .unwrap_or_default()
}

/// Whether an embedded object carries nothing at all: no type metadata, no
/// name and no content
pub fn is_empty_object(object: &DynamicObject) -> bool {
    let no_content = match &object.data {
        serde_json::Value::Null => true,
        serde_json::Value::Object(fields) => fields.is_empty(),
        _ => false,
    };
    object.types.is_none()
        && object.metadata.name.is_none()
        && object.metadata.generate_name.is_none()
        && no_content
}

/// Render an object as `Kind/name in namespace ns`.
///
/// Used for log lines and denial messages alike, so it sticks to plain
/// metadata values.
pub fn display_identity(object: &DynamicObject) -> String {
    format!(
        "{}/{} in namespace {}",
        kind_of(object),
        object.name_any(),
        object.namespace().unwrap_or_default()
    )
}

/// Look up an annotation value, treating missing annotations as absent
pub fn annotation<'a>(object: &'a DynamicObject, key: &str) -> Option<&'a str> {
    object
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}

/// Find the controller owner reference that makes validating this object redundant.
///
/// Only pods are subject to this: a pod owned by one of the
/// [`CONTROLLER_OWNER_KINDS`] was stamped from a template that is admitted on
/// its own.
pub fn controller_owner(object: &DynamicObject) -> Option<&OwnerReference> {
    if kind_of(object) != "Pod" {
        return None;
    }

    object
        .owner_references()
        .iter()
        .find(|owner| CONTROLLER_OWNER_KINDS.contains(&owner.kind.as_str()))
}
