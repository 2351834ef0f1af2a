//! Finds the cached `model.getById` record inside the embedded state.

use log::debug;
use serde_json::{Map, Value};

use crate::json_tree::JsonPath;

const MODEL_ROUTER: &str = "model";
const GET_BY_ID_PROCEDURE: &str = "getById";

fn cached_queries(state: &Value) -> Option<&Vec<Value>> {
    JsonPath::new(state)
        .key("props")
        .key("pageProps")
        .key("trpcState")
        .key("json")
        .key("queries")
        .array()
}

/// True when `queryKey[0]` is a sequence starting with `"model", "getById"`.
fn is_model_by_id_query(query: &Value) -> bool {
    let Some(operation) = JsonPath::new(query).key("queryKey").index(0).array() else {
        return false;
    };
    operation.len() >= 2
        && operation[0].as_str() == Some(MODEL_ROUTER)
        && operation[1].as_str() == Some(GET_BY_ID_PROCEDURE)
}

/// Picks the model record for `model_id` from the cached queries.
///
/// Candidates are scanned in order. The first one whose `data.id` matches
/// wins; without a target id, or without a match, the last candidate seen is
/// returned, not the first.
pub fn find_model_record(state: &Value, model_id: Option<u64>) -> Option<&Map<String, Value>> {
    let Some(queries) = cached_queries(state) else {
        debug!("Query resolver: state has no trpcState queries");
        return None;
    };

    let mut last_seen = None;
    for query in queries.iter().filter(|query| is_model_by_id_query(query)) {
        let Some(data) = JsonPath::new(query).key("state").key("data").object() else {
            continue;
        };
        if let Some(target_id) = model_id {
            let record_id = JsonPath::from_option(data.get("id"))
                .int()
                .and_then(|id| u64::try_from(id).ok());
            if record_id == Some(target_id) {
                return Some(data);
            }
        }
        last_seen = Some(data);
    }

    if last_seen.is_none() {
        debug!("Query resolver: no model.getById query in state");
    }
    last_seen
}

#[cfg(test)]
mod tests {
    use super::find_model_record;
    use serde_json::{json, Value};

    fn state_with_queries(queries: Value) -> Value {
        json!({"props": {"pageProps": {"trpcState": {"json": {"queries": queries}}}}})
    }

    fn model_query(id: i64, name: &str) -> Value {
        json!({
            "queryKey": [["model", "getById"], {"input": {"id": id}}],
            "state": {"data": {"id": id, "name": name}}
        })
    }

    #[test]
    fn test_target_id_selects_matching_candidate() {
        let state = state_with_queries(json!([
            {"queryKey": ["other"], "state": {"data": {"id": 1}}},
            {"queryKey": [["model", "getById"]], "state": {"data": {"id": 7}}}
        ]));
        let record = find_model_record(&state, Some(7)).expect("model record");
        assert_eq!(record["id"], json!(7));
    }

    #[test]
    fn test_no_target_id_returns_last_candidate() {
        let state = state_with_queries(json!([
            model_query(7, "first"),
            {"queryKey": ["other"], "state": {"data": {"id": 1}}},
            model_query(8, "last")
        ]));
        let record = find_model_record(&state, None).expect("last candidate");
        assert_eq!(record["name"], json!("last"));
    }

    #[test]
    fn test_unmatched_target_falls_back_to_last_candidate() {
        let state = state_with_queries(json!([
            model_query(1, "first"),
            {"queryKey": [["user", "getById"]], "state": {"data": {"id": 9}}},
            model_query(2, "second"),
            model_query(3, "third")
        ]));
        let record = find_model_record(&state, Some(99)).expect("fallback record");
        assert_eq!(record["name"], json!("third"));
    }

    #[test]
    fn test_match_before_later_candidates_returns_match() {
        let state = state_with_queries(json!([
            model_query(1, "first"),
            model_query(2, "second"),
            model_query(3, "third")
        ]));
        let record = find_model_record(&state, Some(2)).expect("matched record");
        assert_eq!(record["name"], json!("second"));
    }

    #[test]
    fn test_integral_float_id_matches_target() {
        let state = state_with_queries(json!([
            {"queryKey": [["model", "getById"]], "state": {"data": {"id": 7.0, "name": "target"}}},
            model_query(8, "other")
        ]));
        let record = find_model_record(&state, Some(7)).expect("matched record");
        assert_eq!(record["name"], json!("target"));
    }

    #[test]
    fn test_candidates_without_object_data_are_skipped() {
        let state = state_with_queries(json!([
            model_query(1, "first"),
            {"queryKey": [["model", "getById"]], "state": {"data": null}},
            {"queryKey": [["model"]], "state": {"data": {"id": 5}}},
            {"queryKey": "model.getById", "state": {"data": {"id": 6}}}
        ]));
        let record = find_model_record(&state, Some(42)).expect("fallback record");
        assert_eq!(record["name"], json!("first"));
    }

    #[test]
    fn test_missing_path_yields_none() {
        assert!(find_model_record(&json!({"props": {"pageProps": {}}}), None).is_none());
        assert!(find_model_record(&state_with_queries(json!({})), None).is_none());
        assert!(find_model_record(&state_with_queries(json!([])), Some(1)).is_none());
    }
}
