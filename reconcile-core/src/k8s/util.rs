use kube::ResourceExt;
use kube::api::{
    DynamicObject,
    TypeMeta,
};

use crate::k8s::GVK;
use crate::prelude::metav1;

// Fields the diff engine ignores when comparing a dry-run result against the object the server
// already has: these are server-managed bookkeeping, not anything a field manager writes.
pub const DIFF_IGNORED_METADATA_FIELDS: &[&str] = &[
    "managedFields",
    "creationTimestamp",
    "resourceVersion",
    "generation",
    "uid",
];

pub fn split_namespaced_name(name: &str) -> (String, String) {
    match name.split_once('/') {
        Some((namespace, name)) => (namespace.into(), name.into()),
        None => ("".into(), name.into()),
    }
}

// Builds a minimal object suitable for a delete call: only the parts of identity the apiserver
// needs to locate the resource.
pub fn build_deletable(gvk: &GVK, ns_name: &str) -> DynamicObject {
    let (ns, name) = split_namespaced_name(ns_name);
    let namespace = if ns.is_empty() { None } else { Some(ns) };
    DynamicObject {
        metadata: metav1::ObjectMeta { namespace, name: Some(name), ..Default::default() },
        types: Some(gvk.into_type_meta()),
        data: serde_json::Value::Null,
    }
}

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
}

impl<T: kube::Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{ns}/{}", self.name_any()),
            None => self.name_any(),
        }
    }
}

pub trait OpenApiResourceExt {
    fn type_meta() -> TypeMeta;
}

impl<T: k8s_openapi::Resource> OpenApiResourceExt for T {
    fn type_meta() -> TypeMeta {
        TypeMeta { api_version: T::API_VERSION.into(), kind: T::KIND.into() }
    }
}
