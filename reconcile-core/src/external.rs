use kube::api::DynamicObject;
#[cfg(feature = "mock")]
use mockall::automock;

/// Fills type-specific defaults into a batch of desired objects so that a dry-run against an
/// unchanged input produces a stable no-op diff. Implemented outside this crate; the engine only
/// calls it before diffing.
#[cfg_attr(feature = "mock", automock)]
pub trait Normalizer: Send + Sync {
    fn normalize_list(&self, objects: &mut [DynamicObject]);
}

/// Stamps labels identifying the owning application onto a batch of objects, for the sole
/// purpose of letting the caller build selectors against them afterwards. The engine's core
/// logic never reads these labels back.
#[cfg_attr(feature = "mock", automock)]
pub trait OwnerLabelStamper: Send + Sync {
    fn set_owner_labels(&self, objects: &mut [DynamicObject], name: &str, namespace: &str);
}

/// A `Normalizer` that leaves every object untouched, for callers with no type-specific defaults
/// to fill (or for tests that want diffs driven purely by their fixture data).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNormalizer;

impl Normalizer for NoopNormalizer {
    fn normalize_list(&self, _objects: &mut [DynamicObject]) {}
}

/// An `OwnerLabelStamper` that writes `<group>/owner-name` and `<group>/owner-namespace` labels,
/// for callers with no bespoke ownership model who just need selector keys to query by later.
#[derive(Clone, Debug)]
pub struct LabelOwnerStamper {
    group: String,
}

impl LabelOwnerStamper {
    pub fn new(group: impl Into<String>) -> LabelOwnerStamper {
        LabelOwnerStamper { group: group.into() }
    }
}

impl OwnerLabelStamper for LabelOwnerStamper {
    fn set_owner_labels(&self, objects: &mut [DynamicObject], name: &str, namespace: &str) {
        for obj in objects {
            let labels = obj.metadata.labels.get_or_insert_with(Default::default);
            labels.insert(format!("{}/owner-name", self.group), name.to_string());
            labels.insert(format!("{}/owner-namespace", self.group), namespace.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use kube::api::TypeMeta;
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_noop_normalizer_leaves_objects_untouched() {
        let mut objs = vec![DynamicObject {
            metadata: Default::default(),
            types: Some(TypeMeta { api_version: "v1".into(), kind: "ConfigMap".into() }),
            data: json!({"data": {"key": "value"}}),
        }];
        let before = serde_json::to_value(&objs).unwrap();
        NoopNormalizer.normalize_list(&mut objs);
        assert_eq!(serde_json::to_value(&objs).unwrap(), before);
    }

    #[rstest]
    fn test_label_owner_stamper_sets_both_labels() {
        let mut objs = vec![DynamicObject {
            metadata: Default::default(),
            types: Some(TypeMeta { api_version: "v1".into(), kind: "ConfigMap".into() }),
            data: json!({"data": {"key": "value"}}),
        }];

        LabelOwnerStamper::new("example.com").set_owner_labels(&mut objs, "my-app", "my-ns");

        let labels = objs[0].metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get("example.com/owner-name"), Some(&"my-app".to_string()));
        assert_eq!(labels.get("example.com/owner-namespace"), Some(&"my-ns".to_string()));
    }

    #[rstest]
    fn test_label_owner_stamper_preserves_existing_labels() {
        let mut objs = vec![DynamicObject {
            metadata: kube::api::ObjectMeta {
                labels: Some([("keep".to_string(), "me".to_string())].into_iter().collect()),
                ..Default::default()
            },
            types: Some(TypeMeta { api_version: "v1".into(), kind: "ConfigMap".into() }),
            data: json!({"data": {"key": "value"}}),
        }];

        LabelOwnerStamper::new("example.com").set_owner_labels(&mut objs, "my-app", "my-ns");

        let labels = objs[0].metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get("keep"), Some(&"me".to_string()));
        assert_eq!(labels.get("example.com/owner-name"), Some(&"my-app".to_string()));
    }
}
