// Legacy annotation left behind by `kubectl apply`'s client-side three-way merge; a cleanup pass
// commonly wants to strip this once a resource has been migrated to server-side apply.
pub const LAST_APPLIED_CONFIG_ANNOTATION_KEY: &str = "kubectl.kubernetes.io/last-applied-configuration";

// Suffixes combined with an owner's annotation `Group` (see Owner) to form the conventional
// selector keys described in the annotation vocabulary. The engine itself never hardcodes a full
// key -- only these suffixes, which callers combine with their own group via `group_key`.
pub const SSA_ANNOTATION_SUFFIX: &str = "ssa";
pub const IGNORE_ANNOTATION_SUFFIX: &str = "ignore";
pub const FORCE_ANNOTATION_SUFFIX: &str = "force";

// Marker values for the `<group>/ssa` annotation.
pub const SSA_IF_NOT_PRESENT_VALUE: &str = "IfNotPresent";
pub const SSA_OVERRIDE_VALUE: &str = "Override";

// How long the forced-recreation wait sleeps between `get` probes while waiting for
// finalizer-driven deletion to complete.
pub const FINALIZER_POLL_INTERVAL_SECONDS: u64 = 2;

// Bounded retry count for cleanup updates that lose the optimistic-concurrency race on
// `resourceVersion`.
pub const CLEANUP_CONFLICT_RETRY_LIMIT: u32 = 3;

pub fn group_key(group: &str, suffix: &str) -> String {
    format!("{group}/{suffix}")
}
