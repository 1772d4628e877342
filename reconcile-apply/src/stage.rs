use std::collections::BTreeMap;

use kube::api::DynamicObject;
use reconcile_core::k8s::GVK;
use reconcile_core::object::{
    stage_priority_for,
    StagePriority,
    Subject,
};

use crate::errors::ReconcileError;

pub struct Stage {
    pub priority: StagePriority,
    pub objects: Vec<DynamicObject>,
}

/// Groups `objects` into dependency-ordered stages and sorts each stage's members
/// lexicographically by subject, matching the order the change-set aggregator must emit.
pub fn partition_into_stages(objects: Vec<DynamicObject>) -> Result<Vec<Stage>, ReconcileError> {
    let mut buckets: BTreeMap<StagePriority, Vec<DynamicObject>> = BTreeMap::new();

    for obj in objects {
        let gvk = GVK::from_dynamic_obj(&obj).map_err(|e| ReconcileError::Other(e.to_string()))?;
        buckets.entry(stage_priority_for(&gvk)).or_default().push(obj);
    }

    let mut stages = Vec::with_capacity(buckets.len());
    for (priority, mut objects) in buckets {
        objects.sort_by(|a, b| {
            let sa = Subject::from_dynamic_obj(a).expect("type meta already validated during bucketing");
            let sb = Subject::from_dynamic_obj(b).expect("type meta already validated during bucketing");
            sa.cmp(&sb)
        });
        stages.push(Stage { priority, objects });
    }

    Ok(stages)
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use kube::api::{
        ObjectMeta,
        TypeMeta,
    };
    use rstest::*;

    use super::*;

    fn obj(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta { api_version: api_version.into(), kind: kind.into() }),
            metadata: ObjectMeta { namespace: namespace.map(String::from), name: Some(name.into()), ..Default::default() },
            data: Default::default(),
        }
    }

    #[rstest]
    fn test_partition_orders_namespace_before_dependents() {
        let stages = partition_into_stages(vec![
            obj("apps/v1", "Deployment", Some("n"), "d"),
            obj("v1", "ServiceAccount", Some("n"), "s"),
            obj("v1", "ConfigMap", Some("n"), "c"),
            obj("v1", "Namespace", None, "n"),
        ])
        .unwrap();

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].priority, StagePriority::ClusterDefinitions);
        assert_eq!(stages[0].objects.len(), 1);
        assert_eq!(stages[1].priority, StagePriority::RbacAndConfig);
        assert_eq!(stages[1].objects.len(), 2);
        assert_eq!(stages[2].priority, StagePriority::BuiltIn);
        assert_eq!(stages[2].objects.len(), 1);
    }

    #[rstest]
    fn test_within_stage_sorted_lexicographically_by_subject() {
        let stages = partition_into_stages(vec![
            obj("v1", "ServiceAccount", Some("n"), "s"),
            obj("v1", "ConfigMap", Some("n"), "c"),
        ])
        .unwrap();

        let names: Vec<_> = stages[0].objects.iter().map(|o| o.metadata.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["c", "s"]);
    }

    #[rstest]
    fn test_rejects_object_without_type_meta() {
        let bad = DynamicObject {
            types: None,
            metadata: ObjectMeta { name: Some("x".into()), ..Default::default() },
            data: Default::default(),
        };
        assert_err!(partition_into_stages(vec![bad]));
    }
}
