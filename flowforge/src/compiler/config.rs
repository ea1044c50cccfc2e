//! Effective configuration merging.

use crate::dsl::model::ConfigMap;

/// Overlays node configuration on pipeline-level defaults, field by field.
///
/// The merge is per top-level key: a key present in the node config wins
/// wholesale, including when both sides hold objects. That is the
/// documented rule; there is no deep merge.
#[must_use]
pub fn merge_effective_config(defaults: &ConfigMap, node_config: &ConfigMap) -> ConfigMap {
    let mut effective = defaults.clone();
    for (key, value) in node_config {
        effective.insert(key.clone(), value.clone());
    }
    effective
}
