//! In-memory [`SearchBackend`] for tests and offline runs.
//!
//! Holds documents per index behind `std::sync::RwLock` and evaluates a
//! small subset of the query DSL against them:
//!
//! - `bool.must` with `query_string` expressions: `*`, `field:value`,
//!   `field:"quoted value"`, top-level `AND`, parenthesized groups, and bare
//!   words (every word must appear, case-insensitively, in some string
//!   field of the document).
//! - `bool.filter` with `range` / `gte` over integers and `now-<n><unit>`
//!   date math against RFC 3339 timestamps.
//!
//! Index patterns are comma-separated globs. Documents come back in insertion
//! order, truncated to `size`. Every request is recorded so tests can
//! assert on what was sent and how often.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{json, Value};

use super::SearchBackend;
use crate::error::SearchError;
use crate::models::Record;

/// A request observed by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub index_pattern: String,
    pub body: Value,
}

/// In-memory search backend.
pub struct InMemoryBackend {
    indices: RwLock<Vec<(String, Vec<Record>)>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a document to `index`. Non-object values are ignored.
    pub fn insert(&self, index: &str, document: Value) {
        let Value::Object(record) = document else {
            return;
        };
        let mut indices = self.indices.write().unwrap();
        match indices.iter_mut().find(|(name, _)| name == index) {
            Some((_, docs)) => docs.push(record),
            None => indices.push((index.to_string(), vec![record])),
        }
    }

    /// Make every subsequent search fail with [`SearchError::Backend`].
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write().unwrap() = Some(message.into());
    }

    /// Number of `search` calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(&self, index_pattern: &str, body: &Value) -> Result<Value, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(RecordedRequest {
            index_pattern: index_pattern.to_string(),
            body: body.clone(),
        });

        if let Some(message) = self.failure.read().unwrap().clone() {
            return Err(SearchError::Backend(message));
        }

        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let bool_query = body
            .get("query")
            .and_then(|q| q.get("bool"))
            .ok_or_else(|| SearchError::Backend("only bool queries are supported".to_string()))?;

        let must = clauses(bool_query, "must");
        let filter = clauses(bool_query, "filter");
        let now = Utc::now();

        let matcher = index_matcher(index_pattern)?;
        let indices = self.indices.read().unwrap();
        let mut hits = Vec::new();
        for (index, docs) in indices.iter() {
            if !matcher.is_match(index) {
                continue;
            }
            for doc in docs {
                if hits.len() >= size {
                    break;
                }
                if matches_all(&must, doc, now)? && matches_all(&filter, doc, now)? {
                    hits.push(json!({ "_index": index, "_source": doc }));
                }
            }
        }

        let total = hits.len();
        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": hits,
            }
        }))
    }
}

fn clauses<'a>(bool_query: &'a Value, key: &str) -> Vec<&'a Value> {
    bool_query
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().collect())
        .unwrap_or_default()
}

fn matches_all(clauses: &[&Value], doc: &Record, now: DateTime<Utc>) -> Result<bool, SearchError> {
    for clause in clauses {
        if !matches_clause(clause, doc, now)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_clause(clause: &Value, doc: &Record, now: DateTime<Utc>) -> Result<bool, SearchError> {
    if let Some(expr) = clause
        .get("query_string")
        .and_then(|q| q.get("query"))
        .and_then(Value::as_str)
    {
        return Ok(matches_expression(expr, doc));
    }

    if let Some(Value::Object(range)) = clause.get("range") {
        for (field, bounds) in range {
            let Some(gte) = bounds.get("gte") else {
                continue;
            };
            if !matches_range(doc, field, gte, now)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    Err(SearchError::Backend(format!("unsupported clause: {}", clause)))
}

fn matches_range(
    doc: &Record,
    field: &str,
    gte: &Value,
    now: DateTime<Utc>,
) -> Result<bool, SearchError> {
    let Some(value) = lookup(doc, field) else {
        return Ok(false);
    };

    if let Some(min) = gte.as_f64() {
        return Ok(as_number(value).is_some_and(|v| v >= min));
    }

    if let Some(math) = gte.as_str() {
        let lower = resolve_date_math(math, now)?;
        let ts = value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        return Ok(ts.is_some_and(|ts| ts >= lower));
    }

    Err(SearchError::Backend(format!(
        "unsupported range bound for {}: {}",
        field, gte
    )))
}

fn as_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Resolves `now` or `now-<n><unit>` relative to `now`.
fn resolve_date_math(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, SearchError> {
    if expr == "now" {
        return Ok(now);
    }
    let invalid = || SearchError::Backend(format!("failed to parse date field [{}]", expr));

    let offset = expr.strip_prefix("now-").ok_or_else(invalid)?;
    let split = offset
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (amount, unit) = offset.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    let delta = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" | "H" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        "M" => amount.checked_mul(30).and_then(Duration::try_days),
        "y" => amount.checked_mul(365).and_then(Duration::try_days),
        _ => return Err(invalid()),
    }
    .ok_or_else(invalid)?;
    now.checked_sub_signed(delta).ok_or_else(invalid)
}

/// Looks up `field` as a literal key first, then as a dotted path.
fn lookup<'a>(doc: &'a Record, field: &str) -> Option<&'a Value> {
    if let Some(v) = doc.get(field) {
        return Some(v);
    }
    let mut parts = field.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn matches_expression(expr: &str, doc: &Record) -> bool {
    let terms = split_top_level_and(expr);
    if terms.len() > 1 {
        return terms.iter().all(|t| matches_expression(t, doc));
    }

    let term = expr.trim();
    if let Some(inner) = strip_outer_parens(term) {
        return matches_expression(inner, doc);
    }
    if term == "*" {
        return true;
    }

    if let Some((field, value)) = term.split_once(':') {
        if !field.is_empty() && !field.contains(char::is_whitespace) {
            return matches_field(doc, field, value.trim());
        }
    }

    let haystack = collect_text(doc).to_lowercase();
    term.split_whitespace()
        .all(|word| haystack.contains(&word.to_lowercase()))
}

fn matches_field(doc: &Record, field: &str, value: &str) -> bool {
    let Some(actual) = lookup(doc, field) else {
        return false;
    };
    if value == "*" {
        return true;
    }
    let expected = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(quoted) => quoted.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_string(),
    };
    match actual {
        Value::String(s) => *s == expected,
        Value::Array(items) => items.iter().any(|item| match item {
            Value::String(s) => *s == expected,
            other => other.to_string() == expected,
        }),
        other => other.to_string() == expected,
    }
}

/// Splits on ` AND ` outside of parentheses and quotes.
fn split_top_level_and(expr: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = expr.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' if i == 0 || bytes[i - 1] != b'\\' => in_quotes = !in_quotes,
            b'(' if !in_quotes => depth += 1,
            b')' if !in_quotes => depth -= 1,
            b' ' if !in_quotes && depth == 0 && expr[i..].starts_with(" AND ") => {
                parts.push(&expr[start..i]);
                i += " AND ".len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&expr[start..]);
    parts
}

/// Returns the inside of `( ... )` when the parentheses wrap the whole term.
fn strip_outer_parens(term: &str) -> Option<&str> {
    let inner = term.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

fn collect_text(doc: &Record) -> String {
    fn walk(value: &Value, out: &mut String) {
        match value {
            Value::String(s) => {
                out.push_str(s);
                out.push(' ');
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = String::new();
    doc.values().for_each(|v| walk(v, &mut out));
    out
}

/// Compiles a comma-separated index pattern into one glob set.
fn index_matcher(pattern: &str) -> Result<GlobSet, SearchError> {
    let mut builder = GlobSetBuilder::new();
    for part in pattern.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(part).map_err(|e| {
            SearchError::Backend(format!("invalid index pattern [{}]: {}", part, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SearchError::Backend(format!("invalid index pattern [{}]: {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_wildcard_index_patterns() {
        let alerts = index_matcher("wazuh-alerts-*").unwrap();
        assert!(alerts.is_match("wazuh-alerts-4.x-2024.05.01"));
        assert!(!alerts.is_match("wazuh-archives-1"));

        let both = index_matcher("wazuh-archives-*, wazuh-alerts-*").unwrap();
        assert!(both.is_match("wazuh-alerts-1"));
        assert!(both.is_match("wazuh-archives-1"));

        assert!(index_matcher("exact").unwrap().is_match("exact"));
        assert!(!index_matcher("exact").unwrap().is_match("exactly"));
    }

    #[test]
    fn test_many_wildcards_match_quickly() {
        let matcher = index_matcher("*a*a*a*a*a*a*a*a*b").unwrap();
        assert!(!matcher.is_match(&"a".repeat(200)));
        assert!(matcher.is_match(&format!("{}b", "a".repeat(200))));
    }

    #[tokio::test]
    async fn test_invalid_index_pattern_is_backend_error() {
        let backend = InMemoryBackend::new();
        let body = crate::query::build_log_query("*", "1h").to_search_body(20);
        let err = backend.search("wazuh-[", &body).await.unwrap_err();
        assert!(matches!(err, SearchError::Backend(_)));
    }

    #[test]
    fn test_date_math() {
        let now = Utc::now();
        assert_eq!(resolve_date_math("now-1h", now).unwrap(), now - Duration::hours(1));
        assert_eq!(resolve_date_math("now-7d", now).unwrap(), now - Duration::days(7));
        assert_eq!(resolve_date_math("now", now).unwrap(), now);
        assert!(resolve_date_math("now-banana", now).is_err());
        assert!(resolve_date_math("yesterday", now).is_err());
    }

    #[test]
    fn test_out_of_range_date_math_is_error() {
        let now = Utc::now();
        for expr in ["now-99999999999999h", "now-9223372036854775807M", "now-999999999999y"] {
            assert!(
                matches!(resolve_date_math(expr, now), Err(SearchError::Backend(_))),
                "{}",
                expr
            );
        }
    }

    #[tokio::test]
    async fn test_huge_time_range_fails_search_without_panic() {
        let backend = InMemoryBackend::new();
        backend.insert(
            "wazuh-archives-1",
            json!({ "@timestamp": Utc::now().to_rfc3339(), "full_log": "y" }),
        );
        let body = crate::query::build_log_query("y", "99999999999999h").to_search_body(20);
        let err = backend.search("wazuh-archives-*", &body).await.unwrap_err();
        assert!(matches!(err, SearchError::Backend(_)));
    }

    #[test]
    fn test_expression_matching() {
        let d = doc(json!({
            "agent": { "id": "001", "name": "web-01" },
            "rule": { "groups": ["syslog", "vulnerability-detector"], "level": 10 },
            "full_log": "Failed login for root from 10.0.0.5"
        }));
        assert!(matches_expression("*", &d));
        assert!(matches_expression("agent.id:\"001\"", &d));
        assert!(!matches_expression("agent.id:\"002\"", &d));
        assert!(matches_expression("failed login", &d));
        assert!(!matches_expression("failed logout", &d));
        assert!(matches_expression(
            "rule.groups:vulnerability-detector AND (root)",
            &d
        ));
        assert!(!matches_expression(
            "rule.groups:vulnerability-detector AND (admin)",
            &d
        ));
    }

    #[test]
    fn test_split_respects_parens_and_quotes() {
        assert_eq!(split_top_level_and("a AND (b AND c)"), vec!["a", "(b AND c)"]);
        assert_eq!(split_top_level_and("\"x AND y\""), vec!["\"x AND y\""]);
        assert_eq!(strip_outer_parens("(a) OR (b)"), None);
        assert_eq!(strip_outer_parens("(a OR b)"), Some("a OR b"));
    }
}
