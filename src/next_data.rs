//! Locates the server-rendered state blob embedded in listing markup.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde_json::Value;

fn next_data_script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?is)<script[^>]+id="__NEXT_DATA__"[^>]*>(.*?)</script>"#)
            .expect("valid __NEXT_DATA__ pattern")
    })
}

/// Parses the `__NEXT_DATA__` script body into a JSON tree.
///
/// A body that fails to parse is retried once with `&quot;` decoded. A page
/// without the script, or with a body that fails both attempts, yields `None`.
pub fn extract_embedded_state(html: &str) -> Option<Value> {
    let Some(captures) = next_data_script_pattern().captures(html) else {
        debug!("Embedded state: no __NEXT_DATA__ script in page");
        return None;
    };
    let raw = captures.get(1)?.as_str().trim();

    match serde_json::from_str::<Value>(raw) {
        Ok(state) => Some(state),
        Err(first_error) => {
            let decoded = raw.replace("&quot;", "\"");
            match serde_json::from_str::<Value>(&decoded) {
                Ok(state) => Some(state),
                Err(second_error) => {
                    debug!(
                        "Embedded state: unparsable script body ({first_error}; after entity decode: {second_error})"
                    );
                    None
                }
            }
        }
    }
}
