use reconcile_core::object::Subject;
use serde::{
    Deserialize,
    Serialize,
};

/// The outcome recorded for a single object in a [`ChangeSet`]. Exactly one is produced per
/// object per apply call.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Unchanged,
    Configured,
    Created,
    Skipped,
    /// Internal placeholder; never returned to a caller. Exists so intermediate processing has a
    /// default before the real action is known.
    UnknownAction,
}

impl Default for Action {
    fn default() -> Self {
        Action::UnknownAction
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeSetEntry {
    pub subject: Subject,
    pub action: Action,
    pub diff_summary: Option<Vec<String>>,
}

/// An ordered sequence of per-object outcomes. Order matches the order objects were processed
/// after stage partitioning: stage priority, then lexicographic by subject within a stage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChangeSet(Vec<ChangeSetEntry>);

impl ChangeSet {
    pub fn new() -> ChangeSet {
        ChangeSet(Vec::new())
    }

    pub fn push(&mut self, entry: ChangeSetEntry) {
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[ChangeSetEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeSetEntry> {
        self.0.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = ChangeSetEntry;
    type IntoIter = std::vec::IntoIter<ChangeSetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ChangeSetEntry> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ChangeSetEntry>>(iter: I) -> Self {
        ChangeSet(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use reconcile_core::k8s::GVK;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_changeset_round_trips_through_serde_json() {
        let mut changeset = ChangeSet::new();
        changeset.push(ChangeSetEntry {
            subject: Subject::new(&GVK::new("", "v1", "ConfigMap"), Some("ns".into()), "c"),
            action: Action::Configured,
            diff_summary: Some(vec!["data.key: a -> b".into()]),
        });

        let json = serde_json::to_string(&changeset).unwrap();
        let back: ChangeSet = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), 1);
        assert_eq!(back.entries()[0].subject.to_string(), "ConfigMap/ns/c");
        assert_eq!(back.entries()[0].action, Action::Configured);
    }
}
