use std::cmp::Ordering;
use std::fmt;

use kube::ResourceExt;
use kube::api::DynamicObject;
use serde::de;
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};

use crate::errors::*;
use crate::k8s::GVK;

/// The canonical `Kind/Namespace/Name` identifier used in change-sets, logs, and selector
/// matches. Cluster-scoped objects omit the namespace segment (`Kind/Name`). Carries `apiVersion`
/// too, since the natural sort order (see `Ord` below) needs it even though the display form
/// doesn't.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Subject {
    kind: String,
    api_version: String,
    namespace: Option<String>,
    name: String,
}

impl Subject {
    pub fn new(gvk: &GVK, namespace: Option<String>, name: impl Into<String>) -> Subject {
        Subject { kind: gvk.kind.clone(), api_version: gvk.api_version(), namespace, name: name.into() }
    }

    pub fn from_dynamic_obj(obj: &DynamicObject) -> anyhow::Result<Subject> {
        let gvk = GVK::from_dynamic_obj(obj)?;
        Ok(Subject::new(&gvk, obj.namespace(), obj.name_any()))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn stage_priority(&self) -> StagePriority {
        let group = self.api_version.split_once('/').map_or("", |(group, _)| group);
        stage_priority_for(&GVK::new(group, "", &self.kind))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

impl Serialize for Subject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&format!("{self}"))
    }
}

struct SubjectVisitor;

impl<'de> de::Visitor<'de> for SubjectVisitor {
    type Value = Subject;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a subject in the format Kind/Namespace/Name or Kind/Name")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where E: de::Error {
        let parts: Vec<_> = value.split('/').collect();
        let (kind, namespace, name) = match parts.len() {
            3 => (parts[0], Some(parts[1].to_string()), parts[2]),
            2 => (parts[0], None, parts[1]),
            _ => return Err(E::custom(format!("invalid format for subject: {value}"))),
        };

        // the display form carries no apiVersion, so a deserialized Subject's natural order is
        // only as good as its kind lets `stage_priority_for` guess.
        Ok(Subject { kind: kind.to_string(), api_version: String::new(), namespace, name: name.to_string() })
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D>(deserializer: D) -> Result<Subject, D::Error>
    where D: Deserializer<'de> {
        deserializer.deserialize_str(SubjectVisitor)
    }
}

// Spec order is (stage-priority, apiVersion, kind, namespace, name): stages established earlier
// (namespaces, CRDs) sort first, then alphabetically within a stage.
impl Ord for Subject {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.stage_priority(), &self.api_version, &self.kind, &self.namespace, &self.name).cmp(&(
            other.stage_priority(),
            &other.api_version,
            &other.kind,
            &other.namespace,
            &other.name,
        ))
    }
}

impl PartialOrd for Subject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The dependency-ordering class a resource kind belongs to, per the stage partitioner's
/// classification rules. Lower variants are applied first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum StagePriority {
    /// Namespaces and CustomResourceDefinitions: establish the scopes/types later stages need.
    ClusterDefinitions,
    /// RBAC and configuration kinds: ServiceAccount, Role/RoleBinding, ConfigMap, Secret.
    RbacAndConfig,
    /// Everything else built into the cluster (Deployments, Services, Jobs, ...).
    BuiltIn,
    /// Instances of CustomResourceDefinitions applied in an earlier stage.
    CustomResources,
}

// API groups k8s-openapi ships bindings for; anything outside this list is assumed to be a custom
// resource whose CRD this same batch may have just created.
const BUILTIN_API_GROUPS: &[&str] = &[
    "",
    "apps",
    "batch",
    "autoscaling",
    "networking.k8s.io",
    "policy",
    "storage.k8s.io",
    "scheduling.k8s.io",
    "coordination.k8s.io",
    "node.k8s.io",
    "admissionregistration.k8s.io",
    "apiregistration.k8s.io",
    "authentication.k8s.io",
    "authorization.k8s.io",
    "certificates.k8s.io",
    "events.k8s.io",
    "discovery.k8s.io",
    "flowcontrol.apiserver.k8s.io",
];

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";
const APIEXTENSIONS_GROUP: &str = "apiextensions.k8s.io";

pub fn stage_priority_for(gvk: &GVK) -> StagePriority {
    match (gvk.group.as_str(), gvk.kind.as_str()) {
        ("", "Namespace") => StagePriority::ClusterDefinitions,
        (APIEXTENSIONS_GROUP, "CustomResourceDefinition") => StagePriority::ClusterDefinitions,
        ("", "ServiceAccount" | "ConfigMap" | "Secret") => StagePriority::RbacAndConfig,
        (RBAC_GROUP, _) => StagePriority::RbacAndConfig,
        (group, _) if BUILTIN_API_GROUPS.contains(&group) => StagePriority::BuiltIn,
        _ => StagePriority::CustomResources,
    }
}

err_impl! {ObjectError,
    #[error("object has no type metadata: {0}")]
    MissingTypeMeta(String),

    #[error("object has no name: {0}")]
    MissingName(String),
}
