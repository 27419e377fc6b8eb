//! Structured query construction.
//!
//! Every builder here is a pure function: it takes a per-operation intent
//! and returns a fresh [`StructuredQuery`]. Nothing is escaped or validated
//! in free-text expressions; they are handed to the backend's
//! `query_string` grammar verbatim. Relative time windows are likewise
//! opaque and only ever concatenated into `now-{range}` date math.
//!
//! # Rendered shape
//!
//! ```json
//! {
//!   "query": {
//!     "bool": {
//!       "must":   [{ "query_string": { "query": "sshd" } }],
//!       "filter": [
//!         { "range": { "@timestamp": { "gte": "now-1h" } } },
//!         { "range": { "rule.level": { "gte": 5 } } }
//!       ]
//!     }
//!   },
//!   "size": 20
//! }
//! ```

use serde_json::{json, Value};

use crate::error::SearchError;
use crate::models::MATCH_ALL;

/// Document timestamp field used for the relative time window.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Alert severity field.
pub const LEVEL_FIELD: &str = "rule.level";

/// Fixed expression selecting vulnerability-detector alerts.
pub const VULNERABILITY_GROUP_QUERY: &str = "rule.groups:vulnerability-detector";

/// Lower bound of a range clause.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    /// Backend date math, rendered as-is (e.g. `"now-1h"`).
    DateMath(String),
    Integer(i64),
}

impl RangeBound {
    fn to_json(&self) -> Value {
        match self {
            RangeBound::DateMath(expr) => Value::String(expr.clone()),
            RangeBound::Integer(n) => json!(n),
        }
    }
}

/// A single clause inside a `bool` query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `{"query_string": {"query": ...}}`
    QueryString(String),
    /// `{"range": {field: {"gte": bound}}}`
    Range { field: String, gte: RangeBound },
}

impl Clause {
    pub fn query_string(expr: impl Into<String>) -> Self {
        Clause::QueryString(expr.into())
    }

    /// `@timestamp >= now-{time_range}`.
    pub fn since(time_range: &str) -> Self {
        Clause::Range {
            field: TIMESTAMP_FIELD.to_string(),
            gte: RangeBound::DateMath(format!("now-{}", time_range)),
        }
    }

    /// `rule.level >= min_level`.
    pub fn min_level(min_level: i64) -> Self {
        Clause::Range {
            field: LEVEL_FIELD.to_string(),
            gte: RangeBound::Integer(min_level),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Clause::QueryString(expr) => json!({ "query_string": { "query": expr } }),
            Clause::Range { field, gte } => {
                let mut bounds = serde_json::Map::new();
                bounds.insert(field.clone(), json!({ "gte": gte.to_json() }));
                json!({ "range": Value::Object(bounds) })
            }
        }
    }
}

/// A `bool` query made of `must` and `filter` clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredQuery {
    pub must: Vec<Clause>,
    pub filter: Vec<Clause>,
}

impl StructuredQuery {
    /// The `bool` query object alone.
    pub fn to_json(&self) -> Value {
        let mut bool_query = serde_json::Map::new();
        bool_query.insert(
            "must".to_string(),
            Value::Array(self.must.iter().map(Clause::to_json).collect()),
        );
        if !self.filter.is_empty() {
            bool_query.insert(
                "filter".to_string(),
                Value::Array(self.filter.iter().map(Clause::to_json).collect()),
            );
        }
        json!({ "bool": Value::Object(bool_query) })
    }

    /// The full `_search` request body with a result-count limit.
    pub fn to_search_body(&self, page_size: usize) -> Value {
        json!({
            "query": self.to_json(),
            "size": page_size,
        })
    }

    /// All `query_string` expressions in `must`, in order.
    pub fn must_expressions(&self) -> Vec<&str> {
        self.must
            .iter()
            .filter_map(|c| match c {
                Clause::QueryString(expr) => Some(expr.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Free-text search over a relative time window.
pub fn build_log_query(free_text: &str, time_range: &str) -> StructuredQuery {
    StructuredQuery {
        must: vec![Clause::query_string(free_text)],
        filter: vec![Clause::since(time_range)],
    }
}

/// [`build_log_query`] plus a minimum severity filter.
pub fn build_alert_query(free_text: &str, time_range: &str, min_level: i64) -> StructuredQuery {
    let mut query = build_log_query(free_text, time_range);
    query.filter.push(Clause::min_level(min_level));
    query
}

/// Single-agent equality lookup with no time or severity filter.
///
/// Empty identifiers count as absent. `agent_id` takes precedence when both
/// are given.
pub fn build_agent_query(
    agent_id: Option<&str>,
    agent_name: Option<&str>,
) -> Result<StructuredQuery, SearchError> {
    fn present(v: Option<&str>) -> Option<&str> {
        v.filter(|s| !s.is_empty())
    }

    let expr = match (present(agent_id), present(agent_name)) {
        (Some(id), _) => format!("agent.id:\"{}\"", quote_term(id)),
        (None, Some(name)) => format!("agent.name:\"{}\"", quote_term(name)),
        (None, None) => {
            return Err(SearchError::validation(
                "Either agent_id or agent_name must be provided.",
            ))
        }
    };

    Ok(StructuredQuery {
        must: vec![Clause::QueryString(expr)],
        filter: Vec::new(),
    })
}

/// Vulnerability-detector alerts, optionally narrowed by a caller expression.
pub fn build_vulnerability_query(
    free_text: Option<&str>,
    time_range: &str,
    min_level: i64,
) -> StructuredQuery {
    StructuredQuery {
        must: vec![Clause::QueryString(combine_with_group(free_text))],
        filter: vec![Clause::since(time_range), Clause::min_level(min_level)],
    }
}

/// AND-combines the caller's expression with the fixed group constraint,
/// unless the caller asked for everything.
fn combine_with_group(free_text: Option<&str>) -> String {
    match free_text.map(str::trim) {
        None | Some("") => VULNERABILITY_GROUP_QUERY.to_string(),
        Some(q) if q == MATCH_ALL => VULNERABILITY_GROUP_QUERY.to_string(),
        Some(q) => format!("{} AND ({})", VULNERABILITY_GROUP_QUERY, q),
    }
}

/// Escapes `\` and `"` so an identifier stays a single quoted term.
fn quote_term(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_query_shape() {
        let q = build_log_query("failed login", "1h");
        assert_eq!(
            q.to_search_body(20),
            json!({
                "query": {
                    "bool": {
                        "must": [{ "query_string": { "query": "failed login" } }],
                        "filter": [{ "range": { "@timestamp": { "gte": "now-1h" } } }]
                    }
                },
                "size": 20
            })
        );
    }

    #[test]
    fn test_free_text_passed_through_verbatim() {
        let q = build_log_query("data.srcip:10.0.0.* AND NOT \"quoted\"", "15m");
        assert_eq!(
            q.must_expressions(),
            vec!["data.srcip:10.0.0.* AND NOT \"quoted\""]
        );
    }

    #[test]
    fn test_alert_query_adds_level_filter() {
        let q = build_alert_query("sshd", "24h", 10);
        assert_eq!(q.filter.len(), 2);
        assert_eq!(q.filter[0], Clause::since("24h"));
        assert_eq!(
            q.filter[1].to_json(),
            json!({ "range": { "rule.level": { "gte": 10 } } })
        );
    }

    #[test]
    fn test_agent_query_by_id() {
        let q = build_agent_query(Some("001"), None).unwrap();
        assert_eq!(q.must_expressions(), vec!["agent.id:\"001\""]);
        assert!(q.filter.is_empty());
        assert_eq!(
            q.to_search_body(1),
            json!({
                "query": { "bool": { "must": [{ "query_string": { "query": "agent.id:\"001\"" } }] } },
                "size": 1
            })
        );
    }

    #[test]
    fn test_agent_query_by_name() {
        let q = build_agent_query(None, Some("web-01")).unwrap();
        assert_eq!(q.must_expressions(), vec!["agent.name:\"web-01\""]);
    }

    #[test]
    fn test_agent_id_wins_over_name() {
        let q = build_agent_query(Some("007"), Some("web-01")).unwrap();
        assert_eq!(q.must_expressions(), vec!["agent.id:\"007\""]);
    }

    #[test]
    fn test_agent_empty_id_falls_back_to_name() {
        let q = build_agent_query(Some(""), Some("db")).unwrap();
        assert_eq!(q.must_expressions(), vec!["agent.name:\"db\""]);
    }

    #[test]
    fn test_agent_query_requires_identifier() {
        let err = build_agent_query(None, None).unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
        assert!(build_agent_query(Some(""), Some("")).is_err());
    }

    #[test]
    fn test_agent_identifier_quotes_escaped() {
        let q = build_agent_query(None, Some("odd\"name")).unwrap();
        assert_eq!(q.must_expressions(), vec!["agent.name:\"odd\\\"name\""]);
    }

    #[test]
    fn test_vulnerability_wildcard_uses_group_alone() {
        for query in [None, Some("*"), Some(""), Some("  *  ")] {
            let q = build_vulnerability_query(query, "1h", 7);
            assert_eq!(q.must_expressions(), vec![VULNERABILITY_GROUP_QUERY]);
        }
    }

    #[test]
    fn test_vulnerability_combines_with_caller_query() {
        let q = build_vulnerability_query(Some("CVE-2024-1234 OR openssl"), "7d", 9);
        assert_eq!(
            q.must_expressions(),
            vec!["rule.groups:vulnerability-detector AND (CVE-2024-1234 OR openssl)"]
        );
        assert_eq!(
            q.to_json()["bool"]["filter"],
            json!([
                { "range": { "@timestamp": { "gte": "now-7d" } } },
                { "range": { "rule.level": { "gte": 9 } } }
            ])
        );
    }
}
