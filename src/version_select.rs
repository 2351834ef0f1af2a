//! Chooses one version record out of a model's version list.

use log::debug;
use serde_json::{Map, Value};

use crate::json_tree::{display_value, is_truthy, JsonPath};

/// Versions are stored under `modelVersions`; older payloads use `versions`.
pub fn model_versions(model: &Map<String, Value>) -> Option<&Vec<Value>> {
    model
        .get("modelVersions")
        .or_else(|| model.get("versions"))
        .and_then(Value::as_array)
}

fn published_sort_key(version: &Value) -> String {
    JsonPath::new(version)
        .key("publishedAt")
        .value()
        .filter(|published| is_truthy(published))
        .map(display_value)
        .unwrap_or_default()
}

/// Returns the version matching `version_id`, else the latest by `publishedAt`.
///
/// `publishedAt` is compared as plain text, descending, so a version without
/// a date sorts behind every dated one. Ties keep list order.
pub fn select_version(model: &Map<String, Value>, version_id: Option<u64>) -> Option<&Value> {
    let versions = model_versions(model).filter(|versions| !versions.is_empty())?;

    if let Some(target_id) = version_id {
        let matched = versions.iter().find(|version| {
            JsonPath::new(version)
                .key("id")
                .int()
                .is_some_and(|id| u64::try_from(id).ok() == Some(target_id))
        });
        if matched.is_some() {
            return matched;
        }
        debug!("Version selector: version {target_id} not listed, using latest");
    }

    let mut by_published: Vec<&Value> = versions.iter().collect();
    by_published.sort_by_key(|version| std::cmp::Reverse(published_sort_key(version)));
    by_published.first().copied()
}
