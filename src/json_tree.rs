//! Tolerant accessors over untyped `serde_json` trees.
//!
//! Every step yields an empty path instead of failing, so a chain like
//! `JsonPath::new(&state).key("props").key("pageProps")` reads as the happy
//! path while missing keys and wrong shapes collapse into `None` at the end.

use serde_json::{Map, Value};

/// Optional cursor into a JSON tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JsonPath<'a>(Option<&'a Value>);

impl<'a> JsonPath<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(Some(value))
    }

    pub fn from_option(value: Option<&'a Value>) -> Self {
        Self(value)
    }

    /// Descends into an object member. Non-objects yield an empty path.
    pub fn key(self, name: &str) -> Self {
        Self(self.0.and_then(|value| value.as_object()?.get(name)))
    }

    /// Descends into an array element. Non-arrays yield an empty path.
    pub fn index(self, position: usize) -> Self {
        Self(self.0.and_then(|value| value.as_array()?.get(position)))
    }

    pub fn value(self) -> Option<&'a Value> {
        self.0
    }

    /// Present and not JSON `null`.
    pub fn non_null(self) -> Option<&'a Value> {
        self.0.filter(|value| !value.is_null())
    }

    pub fn array(self) -> Option<&'a Vec<Value>> {
        self.0.and_then(Value::as_array)
    }

    pub fn object(self) -> Option<&'a Map<String, Value>> {
        self.0.and_then(Value::as_object)
    }

    pub fn str(self) -> Option<&'a str> {
        self.0.and_then(Value::as_str)
    }

    /// Exact integer view. Accepts integral floats and numeric strings.
    pub fn int(self) -> Option<i64> {
        self.0.and_then(integer_value)
    }

    /// Text of the value when it is "truthy", trimmed.
    ///
    /// `null`, `false`, zero, empty strings and empty containers count as
    /// absent so that `a.truthy_text().or_else(|| b.truthy_text())` chains
    /// fall through the same way the platform payloads expect.
    pub fn truthy_text(self) -> Option<String> {
        let value = self.0.filter(|value| is_truthy(value))?;
        Some(display_value(value).trim().to_string())
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => !members.is_empty(),
    }
}

/// Renders scalars without JSON quoting; containers fall back to JSON text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            let float = number.as_f64()?;
            (float.fract() == 0.0 && float.abs() < i64::MAX as f64).then_some(float as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}
