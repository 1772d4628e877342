use std::collections::BTreeMap;

use kube::api::DynamicObject;
use kube::ResourceExt;

/// A plain key/value subset predicate, matched against the union of an object's annotations and
/// labels (annotations win on collision). Deliberately not an expression DSL -- every selector in
/// this engine is one of these.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn new() -> Selector {
        Selector(BTreeMap::new())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Selector
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Selector(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An empty selector never matches anything, even an object with no annotations or labels at
    /// all -- this keeps "selector not configured" distinct from "selector configured but only
    /// matches objects with an empty map".
    pub fn matches(&self, obj: &DynamicObject) -> bool {
        if self.0.is_empty() {
            return false;
        }

        let annotations = obj.annotations();
        let labels = obj.labels();
        self.0
            .iter()
            .all(|(k, v)| annotations.get(k).or_else(|| labels.get(k)).is_some_and(|found| found == v))
    }
}
