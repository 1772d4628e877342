use crate::selector::Selector;

/// The process-wide identity the engine applies under. `field_manager_name` is the value sent as
/// the apply manager on every write; `group` is the annotation/label domain used to build the
/// conventional selector keys in [`crate::options::ApplyOptions`] (e.g. `<group>/ssa`).
#[derive(Clone, Debug)]
pub struct Owner {
    pub field_manager_name: String,
    pub group: String,
}

impl Owner {
    pub fn new(field_manager_name: impl Into<String>, group: impl Into<String>) -> Owner {
        Owner { field_manager_name: field_manager_name.into(), group: group.into() }
    }
}

#[derive(Clone, Debug)]
pub struct FieldManagerRef {
    pub name: String,
    pub operation_type: String,
}

impl FieldManagerRef {
    pub fn new(name: impl Into<String>, operation_type: impl Into<String>) -> FieldManagerRef {
        FieldManagerRef { name: name.into(), operation_type: operation_type.into() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CleanupConfig {
    pub annotations: Vec<String>,
    pub labels: Vec<String>,
    pub field_managers: Vec<FieldManagerRef>,
    pub exclusions: Selector,
}

#[derive(Clone, Debug, Default)]
pub struct ApplyOptions {
    pub force: bool,
    pub force_selector: Selector,
    pub exclusion_selector: Selector,
    pub if_not_present_selector: Selector,
    pub cleanup: Option<CleanupConfig>,
}

impl ApplyOptions {
    pub fn force_eligible(&self, obj: &kube::api::DynamicObject) -> bool {
        self.force || self.force_selector.matches(obj)
    }
}
