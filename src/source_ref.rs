//! Model listing identifiers carried by page URLs.

use std::sync::OnceLock;

use regex::Regex;

/// Model and optional version identifiers parsed from a listing URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceReference {
    pub model_id: Option<u64>,
    pub version_id: Option<u64>,
}

fn model_segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/models/(\d+)").expect("valid model segment pattern"))
}

fn version_param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[?&]modelVersionId=(\d+)").expect("valid version parameter pattern")
    })
}

fn first_capture_as_id(pattern: &Regex, url: &str) -> Option<u64> {
    pattern
        .captures(url)?
        .get(1)
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
}

impl SourceReference {
    /// Extracts `models/<id>` and `modelVersionId=<id>` independently.
    pub fn parse(url: &str) -> Self {
        Self {
            model_id: first_capture_as_id(model_segment_pattern(), url),
            version_id: first_capture_as_id(version_param_pattern(), url),
        }
    }
}

/// Cheap precondition applied before the pipeline runs.
pub fn looks_like_http_url(url: &str) -> bool {
    url.trim().starts_with("http")
}
