//! Resource coordinates and live instances
//!
//! A [`ResourceDescriptor`] names one kind of resource by its
//! group/version/resource coordinate. Instances of that kind are kept as
//! untyped JSON trees because their schemas are not known ahead of time.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// One live object as returned by the control plane
pub type Instance = serde_json::Value;

/// Verb a resource kind must advertise to be listed
pub const LIST_VERB: &str = "list";

/// Group/version/resource coordinate of a backable resource kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// API group, empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Plural resource name used in the collection URL
    pub resource: String,
    /// Kind of the objects in the collection
    pub kind: String,
    /// Whether instances live in namespaces
    pub namespaced: bool,
    /// Verbs advertised by discovery
    pub verbs: BTreeSet<String>,
}

impl ResourceDescriptor {
    /// `group/version`, or just `version` for the core group
    pub fn group_version(&self) -> String {
        join_group_version(&self.group, &self.version)
    }

    /// Whether the collection endpoint supports listing
    pub fn can_list(&self) -> bool {
        self.verbs.contains(LIST_VERB)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_version(), self.resource)
    }
}

/// Build a `group/version` string the way the API server prints it
pub fn join_group_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{}/{}", group, version)
    }
}

/// Split a `group/version` string; the core group has no slash
pub fn split_group_version(group_version: &str) -> (&str, &str) {
    match group_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", group_version),
    }
}

/// `metadata.name` of an instance, if present
pub fn instance_name(instance: &Instance) -> Option<&str> {
    instance.get("metadata")?.get("name")?.as_str()
}

/// `metadata.namespace` of an instance, if present and non-empty
pub fn instance_namespace(instance: &Instance) -> Option<&str> {
    instance
        .get("metadata")?
        .get("namespace")?
        .as_str()
        .filter(|ns| !ns.is_empty())
}

/// Human-readable identity of an instance for logs and errors
pub fn describe_instance(descriptor: &ResourceDescriptor, instance: &Instance) -> String {
    let name = instance_name(instance).unwrap_or("<unnamed>");
    match instance_namespace(instance) {
        Some(ns) => format!("{} {}/{}", descriptor, ns, name),
        None => format!("{} {}", descriptor, name),
    }
}
