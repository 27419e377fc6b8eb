//! Response normalization: `hits.hits[]._source` → ordered records.

use serde_json::Value;

use crate::error::SearchError;
use crate::models::Record;

/// Extracts each hit's `_source` from a `_search` response, preserving the
/// backend's hit order.
///
/// Zero hits is an empty vector. A missing `hits.hits` array, a hit without
/// `_source`, or a non-object `_source` is a
/// [`SearchError::MalformedResponse`].
pub fn extract_records(response: &Value) -> Result<Vec<Record>, SearchError> {
    let hits = response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| SearchError::MalformedResponse("missing hits.hits array".to_string()))?;

    hits.iter()
        .enumerate()
        .map(|(i, hit)| match hit.get("_source") {
            Some(Value::Object(source)) => Ok(source.clone()),
            Some(_) => Err(SearchError::MalformedResponse(format!(
                "hit {} has a non-object _source",
                i
            ))),
            None => Err(SearchError::MalformedResponse(format!(
                "hit {} has no _source",
                i
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_sources_in_order() {
        let response = json!({
            "took": 3,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_index": "wazuh-alerts-1", "_id": "b", "_source": { "id": "b", "rule": { "level": 3 } } },
                    { "_index": "wazuh-alerts-1", "_id": "a", "_source": { "id": "a" } }
                ]
            }
        });
        let records = extract_records(&response).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "b");
        assert_eq!(records[0]["rule"]["level"], 3);
        assert_eq!(records[1]["id"], "a");
    }

    #[test]
    fn test_zero_hits_is_empty() {
        let response = json!({ "hits": { "total": { "value": 0 }, "hits": [] } });
        assert!(extract_records(&response).unwrap().is_empty());
    }

    #[test]
    fn test_missing_hits_is_malformed() {
        let err = extract_records(&json!({ "error": "boom" })).unwrap_err();
        assert!(matches!(err, SearchError::MalformedResponse(_)));

        let err = extract_records(&json!({ "hits": { "hits": {} } })).unwrap_err();
        assert!(matches!(err, SearchError::MalformedResponse(_)));
    }

    #[test]
    fn test_hit_without_source_is_malformed() {
        let response = json!({ "hits": { "hits": [{ "_id": "x" }] } });
        assert!(matches!(
            extract_records(&response),
            Err(SearchError::MalformedResponse(_))
        ));

        let response = json!({ "hits": { "hits": [{ "_source": "text" }] } });
        assert!(extract_records(&response).is_err());
    }
}
