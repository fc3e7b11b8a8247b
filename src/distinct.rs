use serde_json::{Map, Value, json};

/// Maximum number of distinct keys returned by one aggregation.
pub const DISTINCT_BUCKET_LIMIT: usize = 200;

/// Suffix of the unanalyzed sub-field the aggregation buckets on.
pub const RAW_SUFFIX: &str = ".raw";

/// Request options for distinct mode: only `field` is stored, and a terms
/// aggregation on `<field>.raw` replaces the hit list.
///
/// Buckets are ordered by document count descending, then key ascending;
/// the `order` object relies on serde_json's `preserve_order` to keep the
/// criteria in that sequence on the wire.
pub fn compile_distinct(field: &str) -> Map<String, Value> {
    let mut options = Map::new();
    options.insert("stored_fields".to_string(), Value::from(field));
    options.insert(
        "aggregations".to_string(),
        json!({
            field: {
                "terms": {
                    "field": format!("{field}{RAW_SUFFIX}"),
                    "size": DISTINCT_BUCKET_LIMIT,
                    "min_doc_count": 1,
                    "shard_min_doc_count": 0,
                    "show_term_doc_count_error": false,
                    "order": { "_count": "desc", "_key": "asc" }
                }
            }
        }),
    );
    options
}

/// Project the bucket keys out of `aggregations.<field>.buckets`, in bucket
/// order. A missing path yields an empty list.
pub fn extract_distinct_keys(response: &Value, field: &str) -> Vec<Value> {
    response
        .get("aggregations")
        .and_then(|aggs| aggs.get(field))
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| bucket.get("key").cloned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_aggregates_on_raw_subfield() {
        let options = compile_distinct("foo");
        assert_eq!(
            Value::Object(options),
            json!({
                "stored_fields": "foo",
                "aggregations": {
                    "foo": {
                        "terms": {
                            "field": "foo.raw",
                            "size": 200,
                            "min_doc_count": 1,
                            "shard_min_doc_count": 0,
                            "show_term_doc_count_error": false,
                            "order": { "_count": "desc", "_key": "asc" }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn bucket_order_criteria_keep_their_sequence_on_the_wire() {
        let wire = serde_json::to_string(&compile_distinct("foo")).unwrap();
        let count = wire.find("\"_count\"").unwrap();
        let key = wire.find("\"_key\"").unwrap();
        assert!(count < key);
    }

    #[test]
    fn keys_follow_bucket_order() {
        let response = json!({
            "hits": { "hits": [] },
            "aggregations": {
                "brand": {
                    "buckets": [
                        { "key": "acme", "doc_count": 9 },
                        { "key": "zenith", "doc_count": 9 },
                        { "key": "bolt", "doc_count": 2 }
                    ]
                }
            }
        });
        assert_eq!(
            extract_distinct_keys(&response, "brand"),
            vec![json!("acme"), json!("zenith"), json!("bolt")]
        );
    }

    #[test]
    fn missing_bucket_path_yields_empty() {
        assert!(extract_distinct_keys(&json!({}), "brand").is_empty());
        assert!(
            extract_distinct_keys(&json!({"aggregations": {}}), "brand")
                .is_empty()
        );
        assert!(extract_distinct_keys(&Value::Null, "brand").is_empty());
    }
}
