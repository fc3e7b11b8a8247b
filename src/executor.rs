use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{
    distinct::compile_distinct,
    error::Result,
    predicate::PredicateSet,
    query::{compile, compile_sort},
    record::key_to_string,
    transport::Transport,
};

/// Hit window used by `search` when the caller sets no limit.
pub const DEFAULT_SEARCH_SIZE: usize = 10_000;

/// Page size used by `paginate` when the caller passes zero.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default options for a plain search: full `_source`, the caller's limit
/// (or [`DEFAULT_SEARCH_SIZE`]) and offset.
pub fn search_defaults(predicates: &PredicateSet) -> Map<String, Value> {
    let size = predicates
        .limit
        .filter(|&limit| limit > 0)
        .unwrap_or(DEFAULT_SEARCH_SIZE);
    object(json!({
        "_source": true,
        "size": size,
        "from": predicates.offset,
    }))
}

/// Default options for page `page` (1-based) of `per_page` hits.
pub fn paginate_defaults(per_page: usize, page: usize) -> Map<String, Value> {
    let per_page = if per_page == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        per_page
    };
    object(json!({
        "_source": true,
        "size": per_page,
        "from": page.saturating_sub(1) * per_page,
    }))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Assemble the request body.
///
/// Distinct mode replaces `defaults` with the aggregation options and
/// drops sorting. Per-query options are then merged over the result, and
/// the compiled query is added last.
pub fn build_request(
    predicates: &PredicateSet,
    defaults: Map<String, Value>,
) -> Map<String, Value> {
    let distinct = predicates.distinct_field();

    let mut body = match distinct {
        Some(field) => compile_distinct(field),
        None => defaults,
    };
    for (key, value) in &predicates.options {
        body.insert(key.clone(), value.clone());
    }
    body.insert("query".to_string(), compile(predicates).to_value());

    if distinct.is_none() && !predicates.orders.is_empty() {
        body.insert(
            "sort".to_string(),
            Value::Array(compile_sort(&predicates.orders)),
        );
    }
    body
}

/// Run the search and return the engine's full response.
///
/// A custom execution override on the predicate set runs instead of the
/// standard path, and its result is returned unchanged.
pub fn execute_raw(
    transport: &dyn Transport,
    predicates: &PredicateSet,
    defaults: Map<String, Value>,
) -> Result<Value> {
    let body = build_request(predicates, defaults);

    if let Some(callback) = &predicates.callback {
        debug!(index = %predicates.index, "running custom search callback");
        return callback(transport, &predicates.query, &body);
    }

    transport.search(&predicates.index, &Value::Object(body))
}

/// Run the search and return the `hits` sub-structure, or `None` when the
/// response has none.
pub fn execute(
    transport: &dyn Transport,
    predicates: &PredicateSet,
    defaults: Map<String, Value>,
) -> Result<Option<Value>> {
    let response = execute_raw(transport, predicates, defaults)?;
    if predicates.callback.is_some() {
        return Ok(Some(response));
    }
    Ok(extract_hits(response))
}

pub fn extract_hits(response: Value) -> Option<Value> {
    match response {
        Value::Object(mut map) => map.remove("hits").filter(|h| !h.is_null()),
        _ => None,
    }
}

/// Total hit count at `total.value`; 0 when absent.
///
/// A bare integer `total` is accepted too.
pub fn total_count(hits: Option<&Value>) -> u64 {
    match hits.and_then(|h| h.get("total")) {
        Some(Value::Object(total)) => {
            total.get("value").and_then(Value::as_u64).unwrap_or(0)
        }
        Some(total) => total.as_u64().unwrap_or(0),
        None => 0,
    }
}

/// Hit identifiers in rank order.
pub fn map_ids(hits: Option<&Value>) -> Vec<String> {
    hits.and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("_id"))
                .map(key_to_string)
                .collect()
        })
        .unwrap_or_default()
}
