//! Maps raw model/version records onto the fixed report fields.

use log::debug;
use serde_json::{Map, Value};

use crate::http_fetcher::ListingFetcher;
use crate::json_tree::{display_value, JsonPath};

/// Report field names, in output order.
pub const FIELD_NAMES: [&str; 7] = [
    "Type",
    "Published",
    "Base Model",
    "Usage Tips",
    "Trigger Words",
    "Hash",
    "File Name",
];

const HASH_PREFERENCE: [&str; 4] = ["AUTOV2", "SHA256", "SHA1", "CRC32"];
const DEFAULT_HASH_LABEL: &str = "AUTOV2";

/// The seven resolved listing fields. Missing data stays an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFields {
    pub model_type: String,
    pub published: String,
    pub base_model: String,
    pub usage_tips: String,
    pub trigger_words: String,
    pub hash: String,
    pub file_name: String,
}

impl ResolvedFields {
    /// `(name, value)` pairs in `FIELD_NAMES` order.
    pub fn entries(&self) -> [(&'static str, &str); 7] {
        [
            (FIELD_NAMES[0], self.model_type.as_str()),
            (FIELD_NAMES[1], self.published.as_str()),
            (FIELD_NAMES[2], self.base_model.as_str()),
            (FIELD_NAMES[3], self.usage_tips.as_str()),
            (FIELD_NAMES[4], self.trigger_words.as_str()),
            (FIELD_NAMES[5], self.hash.as_str()),
            (FIELD_NAMES[6], self.file_name.as_str()),
        ]
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// `CLIP SKIP: n | STRENGTH: s (min a, max b)`, each part only when present.
pub fn build_usage_tips(version: &Value) -> String {
    let root = JsonPath::new(version);
    let settings = root.key("settings");
    let mut parts: Vec<String> = Vec::new();

    if let Some(clip_skip) = root.key("clipSkip").non_null() {
        parts.push(format!("CLIP SKIP: {}", display_value(clip_skip)));
    }

    if let Some(strength) = settings.key("strength").non_null() {
        let bounds: Vec<String> = [
            ("min", settings.key("minStrength").non_null()),
            ("max", settings.key("maxStrength").non_null()),
        ]
        .into_iter()
        .filter_map(|(label, bound)| Some(format!("{label} {}", display_value(bound?))))
        .collect();
        if bounds.is_empty() {
            parts.push(format!("STRENGTH: {}", display_value(strength)));
        } else {
            parts.push(format!(
                "STRENGTH: {} ({})",
                display_value(strength),
                bounds.join(", ")
            ));
        }
    }

    parts.join(" | ")
}

/// Joins `trainedWords`, dropping blank entries. Non-lists are rendered as-is.
pub fn build_trigger_words(version: &Value) -> String {
    match JsonPath::new(version).key("trainedWords").value() {
        Some(Value::Array(words)) => words
            .iter()
            .map(|word| display_value(word).trim().to_string())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => JsonPath::from_option(other)
            .truthy_text()
            .unwrap_or_default(),
    }
}

/// First file whose `type` is "model", ignoring case. Later files are never read.
fn primary_model_file(version: &Value) -> Option<&Value> {
    JsonPath::new(version)
        .key("files")
        .array()?
        .iter()
        .find(|file| {
            JsonPath::new(file)
                .key("type")
                .str()
                .is_some_and(|file_type| file_type.eq_ignore_ascii_case("model"))
        })
}

/// Renders `"<TYPE> | <hash>"` from either a keyed map or a typed list.
pub fn resolve_file_hash(hashes: Option<&Value>) -> String {
    match present(hashes) {
        Some(Value::Object(keyed)) => ["AutoV2", "AUTOV2"]
            .into_iter()
            .find_map(|key| JsonPath::from_option(keyed.get(key)).truthy_text())
            .filter(|hash| !hash.is_empty())
            .map(|hash| format!("{DEFAULT_HASH_LABEL} | {hash}"))
            .unwrap_or_default(),
        Some(Value::Array(typed)) => HASH_PREFERENCE
            .into_iter()
            .find_map(|preferred| {
                typed.iter().find_map(|entry| {
                    let hash_type = JsonPath::new(entry).key("type").truthy_text()?;
                    if !hash_type.eq_ignore_ascii_case(preferred) {
                        return None;
                    }
                    let hash = JsonPath::new(entry).key("hash").truthy_text()?;
                    (!hash.is_empty()).then(|| format!("{} | {hash}", hash_type.to_uppercase()))
                })
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn resolve_file_name(file: &Value, fetcher: &dyn ListingFetcher) -> String {
    let stored_name = || {
        JsonPath::new(file)
            .key("name")
            .truthy_text()
            .unwrap_or_default()
    };
    let Some(download_url) = JsonPath::new(file).key("url").truthy_text() else {
        return stored_name();
    };
    match fetcher.probe_filename(&download_url) {
        Ok(Some(real_name)) => real_name,
        Ok(None) => stored_name(),
        Err(reason) => {
            debug!("Field normalizer: filename probe failed, using stored name: {reason}");
            stored_name()
        }
    }
}

/// Builds all seven fields from whatever records were resolved.
pub fn normalize_fields(
    model: Option<&Map<String, Value>>,
    version: Option<&Value>,
    fetcher: &dyn ListingFetcher,
) -> ResolvedFields {
    let mut fields = ResolvedFields::default();
    let Some(model) = model else {
        return fields;
    };
    fields.model_type = JsonPath::from_option(model.get("type"))
        .truthy_text()
        .unwrap_or_default();

    let Some(version) = version else {
        return fields;
    };
    let version_root = JsonPath::new(version);

    // Version date is what the listing sidebar shows; the model date is older.
    fields.published = version_root
        .key("publishedAt")
        .truthy_text()
        .or_else(|| JsonPath::from_option(model.get("publishedAt")).truthy_text())
        .unwrap_or_default();
    fields.base_model = version_root
        .key("baseModel")
        .truthy_text()
        .or_else(|| version_root.key("baseModelType").truthy_text())
        .unwrap_or_default();
    fields.trigger_words = build_trigger_words(version);
    fields.usage_tips = build_usage_tips(version);

    if let Some(file) = primary_model_file(version) {
        fields.file_name = resolve_file_name(file, fetcher);
        fields.hash = resolve_file_hash(JsonPath::new(file).key("hashes").value());
    } else {
        debug!("Field normalizer: version has no model file");
    }

    fields
}
