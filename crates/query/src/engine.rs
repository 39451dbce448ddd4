use regex::RegexBuilder;
use serde::Serialize;
use serde_json::Value;

use spillway_protocol::canonical_text;

use crate::error::{QueryError, Result};
use crate::path;

pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_CONTEXT_LINES: usize = 2;

/// How a query string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Text,
    Regex,
    JsonPath,
}

impl QueryMode {
    /// Parses the client-facing mode name (`text`, `regex`, `jsonpath`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "regex" => Some(Self::Regex),
            "jsonpath" | "path" => Some(Self::JsonPath),
            _ => None,
        }
    }
}

/// Per-call search options; never persisted.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Forced mode; auto-detected from the query string when unset.
    pub mode: Option<QueryMode>,
    pub limit: usize,
    pub offset: usize,
    pub context_lines: usize,
    /// Applies to text mode, and flips the regex default to case-sensitive.
    pub case_sensitive: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            mode: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            context_lines: DEFAULT_CONTEXT_LINES,
            case_sensitive: false,
        }
    }
}

/// One line-mode match with its surrounding context.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineMatch {
    /// 1-based line number in the canonical rendering.
    pub line: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

/// Paginated result page. `total` counts all matches before slicing.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResults {
    pub results: Vec<Value>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Auto-detection: a leading `$` is a path expression, `/…/` with optional
/// trailing flags is a regex literal, anything else is plain text.
pub fn detect_mode(query: &str) -> QueryMode {
    if query.starts_with('$') {
        QueryMode::JsonPath
    } else if parse_regex_literal(query).is_some() {
        QueryMode::Regex
    } else {
        QueryMode::Text
    }
}

/// Runs a query against a payload and paginates the match set.
pub fn query(value: &Value, query_str: &str, options: &QueryOptions) -> Result<QueryResults> {
    let mode = options.mode.unwrap_or_else(|| detect_mode(query_str));
    let matches = match mode {
        QueryMode::JsonPath => path::eval_path(value, query_str)?,
        QueryMode::Regex => collect_line_values(regex_matches(value, query_str, options)?),
        QueryMode::Text => collect_line_values(text_matches(value, query_str, options)),
    };
    Ok(paginate(matches, options))
}

fn collect_line_values(matches: Vec<LineMatch>) -> Vec<Value> {
    matches
        .into_iter()
        .map(|entry| serde_json::to_value(entry).unwrap_or_default())
        .collect()
}

fn paginate(matches: Vec<Value>, options: &QueryOptions) -> QueryResults {
    let total = matches.len();
    let results: Vec<Value> = matches
        .into_iter()
        .skip(options.offset)
        .take(options.limit)
        .collect();
    QueryResults {
        results,
        total,
        limit: options.limit,
        offset: options.offset,
        has_more: options.offset.saturating_add(options.limit) < total,
    }
}

/// Splits a `/pattern/flags` literal; `None` when the query is not one.
fn parse_regex_literal(query: &str) -> Option<(&str, &str)> {
    let rest = query.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (pattern, flags) = (&rest[..close], &rest[close + 1..]);
    if pattern.is_empty() || !flags.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Some((pattern, flags))
}

fn regex_matches(value: &Value, query_str: &str, options: &QueryOptions) -> Result<Vec<LineMatch>> {
    let (pattern, flags) = parse_regex_literal(query_str).unwrap_or((query_str, ""));

    // Default: global + case-insensitive. `case_sensitive` flips the
    // default; an explicit `i` flag always wins. `g` is accepted and
    // ignored since every line is scanned regardless.
    let mut case_insensitive = !options.case_sensitive;
    let mut multi_line = false;
    let mut dot_matches_new_line = false;
    for flag in flags.chars() {
        match flag {
            'i' => case_insensitive = true,
            'm' => multi_line = true,
            's' => dot_matches_new_line = true,
            'g' => {}
            other => return Err(QueryError::UnknownFlag(other)),
        }
    }

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .dot_matches_new_line(dot_matches_new_line)
        .build()
        .map_err(|err| QueryError::Regex(err.to_string()))?;

    let rendered = canonical_text(value);
    let lines: Vec<&str> = rendered.lines().collect();
    let mut matches = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let Some(found) = regex.find(line) else { continue };
        let (context_before, context_after) = context_around(&lines, index, options.context_lines);
        matches.push(LineMatch {
            line: index + 1,
            content: line.trim().to_string(),
            matched: Some(found.as_str().to_string()),
            context_before,
            context_after,
        });
    }
    Ok(matches)
}

fn text_matches(value: &Value, query_str: &str, options: &QueryOptions) -> Vec<LineMatch> {
    let needle = if options.case_sensitive {
        query_str.to_string()
    } else {
        query_str.to_lowercase()
    };

    let rendered = canonical_text(value);
    let lines: Vec<&str> = rendered.lines().collect();
    let mut matches = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let haystack = if options.case_sensitive {
            (*line).to_string()
        } else {
            line.to_lowercase()
        };
        if !haystack.contains(&needle) {
            continue;
        }
        let (context_before, context_after) = context_around(&lines, index, options.context_lines);
        matches.push(LineMatch {
            line: index + 1,
            content: line.trim().to_string(),
            matched: None,
            context_before,
            context_after,
        });
    }
    matches
}

fn context_around(lines: &[&str], index: usize, span: usize) -> (Vec<String>, Vec<String>) {
    let start = index.saturating_sub(span);
    let end = index.saturating_add(span + 1).min(lines.len());
    let before = lines[start..index].iter().map(|l| l.trim().to_string()).collect();
    let after = lines[index + 1..end].iter().map(|l| l.trim().to_string()).collect();
    (before, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lines_payload(lines: &[&str]) -> Value {
        Value::String(lines.join("\n"))
    }

    #[test]
    fn detects_path_regex_and_text_modes() {
        assert_eq!(detect_mode("$.a.b"), QueryMode::JsonPath);
        assert_eq!(detect_mode("/foo/i"), QueryMode::Regex);
        assert_eq!(detect_mode("/foo/"), QueryMode::Regex);
        assert_eq!(detect_mode("foo"), QueryMode::Text);
        assert_eq!(detect_mode("/not-closed"), QueryMode::Text);
        assert_eq!(detect_mode("a/b/c"), QueryMode::Text);
    }

    #[test]
    fn mode_names_parse_case_insensitively() {
        assert_eq!(QueryMode::parse("Regex"), Some(QueryMode::Regex));
        assert_eq!(QueryMode::parse("jsonpath"), Some(QueryMode::JsonPath));
        assert_eq!(QueryMode::parse("bogus"), None);
    }

    #[test]
    fn text_search_is_case_insensitive_by_default() {
        let payload = lines_payload(&["Alpha", "beta", "ALPHA beta"]);
        let page = query(&payload, "alpha", &QueryOptions::default()).expect("query");
        assert_eq!(page.total, 2);
        assert_eq!(page.results[0]["line"], 1);
        assert_eq!(page.results[1]["line"], 3);

        let sensitive = QueryOptions {
            case_sensitive: true,
            ..QueryOptions::default()
        };
        let page = query(&payload, "alpha", &sensitive).expect("query");
        assert_eq!(page.total, 0);
    }

    #[test]
    fn matches_carry_trimmed_context_lines() {
        let payload = lines_payload(&["  one", "two", "  target  ", "four", "five", "six"]);
        let page = query(&payload, "target", &QueryOptions::default()).expect("query");
        assert_eq!(page.total, 1);
        let hit = &page.results[0];
        assert_eq!(hit["content"], "target");
        assert_eq!(hit["context_before"], json!(["one", "two"]));
        assert_eq!(hit["context_after"], json!(["four", "five"]));
    }

    #[test]
    fn context_is_clamped_at_payload_edges() {
        let payload = lines_payload(&["target", "next"]);
        let page = query(&payload, "target", &QueryOptions::default()).expect("query");
        let hit = &page.results[0];
        assert_eq!(hit["context_before"], json!([]));
        assert_eq!(hit["context_after"], json!(["next"]));
    }

    #[test]
    fn regex_is_case_insensitive_by_default_and_records_the_match() {
        let payload = lines_payload(&["Error: disk full", "all good", "ERROR: retry"]);
        let page = query(&payload, "/error: \\w+/", &QueryOptions::default()).expect("query");
        assert_eq!(page.total, 2);
        assert_eq!(page.results[0]["matched"], "Error: disk");
        assert_eq!(page.results[1]["matched"], "ERROR: retry");
    }

    #[test]
    fn case_sensitive_option_flips_the_regex_default() {
        let payload = lines_payload(&["Error", "error"]);
        let sensitive = QueryOptions {
            case_sensitive: true,
            ..QueryOptions::default()
        };
        let page = query(&payload, "/error/", &sensitive).expect("query");
        assert_eq!(page.total, 1);

        // An explicit `i` flag always wins.
        let page = query(&payload, "/error/i", &sensitive).expect("query");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn raw_pattern_with_forced_regex_mode() {
        let payload = lines_payload(&["value=42", "value=none"]);
        let forced = QueryOptions {
            mode: Some(QueryMode::Regex),
            ..QueryOptions::default()
        };
        let page = query(&payload, r"value=\d+", &forced).expect("query");
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0]["matched"], "value=42");
    }

    #[test]
    fn invalid_regex_fails_the_operation() {
        let payload = lines_payload(&["anything"]);
        let err = query(&payload, "/([unclosed/", &QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::Regex(_)));

        let err = query(&payload, "/foo/x", &QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::UnknownFlag('x')));
    }

    #[test]
    fn pagination_windows_are_contiguous_and_exhaustive() {
        let lines: Vec<String> = (0..10).map(|i| format!("match {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let payload = lines_payload(&refs);

        let first = QueryOptions {
            limit: 4,
            ..QueryOptions::default()
        };
        let second = QueryOptions {
            limit: 4,
            offset: 4,
            ..QueryOptions::default()
        };

        let page_one = query(&payload, "match", &first).expect("query");
        let page_two = query(&payload, "match", &second).expect("query");

        assert_eq!(page_one.total, 10);
        assert_eq!(page_one.results.len(), 4);
        assert!(page_one.has_more);
        assert_eq!(page_two.results.len(), 4);
        assert!(page_two.has_more);

        let seen: Vec<i64> = page_one
            .results
            .iter()
            .chain(page_two.results.iter())
            .map(|hit| hit["line"].as_i64().unwrap_or_default())
            .collect();
        assert_eq!(seen, (1..=8).collect::<Vec<i64>>());

        let last = QueryOptions {
            limit: 4,
            offset: 8,
            ..QueryOptions::default()
        };
        let page_three = query(&payload, "match", &last).expect("query");
        assert_eq!(page_three.results.len(), 2);
        assert!(!page_three.has_more);
    }

    #[test]
    fn path_mode_returns_structured_matches() {
        let payload = json!({"a": {"b": [10, 20]}, "c": 3});
        let page = query(&payload, "$.a.b[1]", &QueryOptions::default()).expect("query");
        assert_eq!(page.results, vec![json!(20)]);
        assert_eq!(page.total, 1);
        assert!(!page.has_more);
    }

    #[test]
    fn path_errors_fail_the_whole_operation() {
        let payload = json!({"a": 1});
        let err = query(&payload, "$.a[", &QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::Path(_)));
    }

    #[test]
    fn searches_the_indented_rendering_of_structured_payloads() {
        let payload = json!({"entries": [{"name": "alpha"}, {"name": "beta"}]});
        let page = query(&payload, "\"name\": \"beta\"", &QueryOptions::default()).expect("query");
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0]["content"], "\"name\": \"beta\"");
    }
}
