//! Query filter: `where` evaluation over JSON records, ordering and pagination.
//!
//! A `where` clause maps field names to conditions. A condition is a literal (equality), an
//! operator object such as `{"gte": 18}`, an `["OR", ...]` / `["AND", ...]` array of conditions,
//! or a nested clause for an object-valued field. The clause itself may also be an
//! `["OR", ...]` / `["AND", ...]` array of clauses.

use crate::response::ListMeta;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;

const OPERATORS: &[&str] = &[
    "eq", "neq", "isNull", "isNotNull", "exists", "notExists", "like", "notLike", "iLike",
    "notILike", "startsWith", "endsWith", "contains", "notContains", "gt", "gte", "lt", "lte",
    "between", "notBetween",
];

/// Parsed `filter` query parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, alias = "sort", skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
}

impl Filter {
    /// Best effort: `None` when the text is not JSON or not filter-shaped.
    pub fn parse(raw: &str) -> Option<Filter> {
        let filter: Filter = serde_json::from_str(raw).ok()?;
        match &filter.where_clause {
            None | Some(Value::Object(_)) | Some(Value::Array(_)) => Some(filter),
            Some(_) => None,
        }
    }

    /// Effective `(limit, offset)`; `page` is 1-based and wins over `offset`.
    pub fn window(&self) -> (u64, u64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = match self.page {
            Some(page) => page.saturating_sub(1).saturating_mul(limit),
            None => self.offset.unwrap_or(0),
        };
        (limit, offset)
    }
}

/// Dotted lookup, e.g. `author.name`.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |v, key| v.get(key))
}

/// True when `record` satisfies the `where` clause.
pub fn matches(record: &Value, clause: &Value) -> bool {
    match clause {
        Value::Object(fields) => fields
            .iter()
            .all(|(key, cond)| check(lookup(record, key), cond)),
        Value::Array(items) => match split_logic(items) {
            Some((true, rest)) => rest.iter().any(|c| matches(record, c)),
            Some((false, rest)) => rest.iter().all(|c| matches(record, c)),
            None => items.iter().all(|c| matches(record, c)),
        },
        Value::Null => true,
        _ => false,
    }
}

/// `Some((is_or, rest))` for `["OR", ...]` / `["AND", ...]`.
fn split_logic(items: &[Value]) -> Option<(bool, &[Value])> {
    match items.first()?.as_str()? {
        "OR" => Some((true, &items[1..])),
        "AND" => Some((false, &items[1..])),
        _ => None,
    }
}

fn is_operator_object(map: &serde_json::Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| OPERATORS.contains(&k.as_str()))
}

fn check(value: Option<&Value>, cond: &Value) -> bool {
    match cond {
        Value::Array(items) => match split_logic(items) {
            Some((true, rest)) => rest.iter().any(|c| check(value, c)),
            Some((false, rest)) => rest.iter().all(|c| check(value, c)),
            None => value.map_or(false, |v| value_eq(v, cond)),
        },
        Value::Object(ops) if is_operator_object(ops) => {
            ops.iter().all(|(op, arg)| apply(op, value, arg))
        }
        Value::Object(_) => matches(value.unwrap_or(&Value::Null), cond),
        literal => value.map_or(literal.is_null(), |v| value_eq(v, literal)),
    }
}

fn apply(op: &str, value: Option<&Value>, arg: &Value) -> bool {
    let flag = arg.as_bool().unwrap_or(true);
    let null = value.map_or(true, Value::is_null);
    let text = value.and_then(Value::as_str);
    match op {
        "eq" => value.map_or(arg.is_null(), |v| value_eq(v, arg)),
        "neq" => !value.map_or(arg.is_null(), |v| value_eq(v, arg)),
        "isNull" => null == flag,
        "isNotNull" => null != flag,
        "exists" => value.is_some() == flag,
        "notExists" => value.is_none() == flag,
        "like" | "notLike" | "iLike" | "notILike" => {
            let insensitive = op.eq_ignore_ascii_case("ilike") || op == "notILike";
            let hit = match (text, arg.as_str().and_then(|p| like_regex(p, insensitive))) {
                (Some(s), Some(re)) => re.is_match(s),
                _ => false,
            };
            if op.starts_with("not") {
                !hit
            } else {
                hit
            }
        }
        "startsWith" => matches_str(text, arg, |s, a| s.starts_with(a)),
        "endsWith" => matches_str(text, arg, |s, a| s.ends_with(a)),
        "contains" => contains(value, arg),
        "notContains" => !contains(value, arg),
        "gt" => compare_opt(value, arg) == Some(Ordering::Greater),
        "gte" => matches!(compare_opt(value, arg), Some(Ordering::Greater | Ordering::Equal)),
        "lt" => compare_opt(value, arg) == Some(Ordering::Less),
        "lte" => matches!(compare_opt(value, arg), Some(Ordering::Less | Ordering::Equal)),
        "between" => within(value, arg),
        "notBetween" => !within(value, arg),
        _ => false,
    }
}

fn matches_str(text: Option<&str>, arg: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (text, arg.as_str()) {
        (Some(s), Some(a)) => f(s, a),
        _ => false,
    }
}

fn contains(value: Option<&Value>, arg: &Value) -> bool {
    match value {
        Some(Value::String(s)) => arg.as_str().map_or(false, |a| s.contains(a)),
        Some(Value::Array(items)) => items.iter().any(|v| value_eq(v, arg)),
        _ => false,
    }
}

fn within(value: Option<&Value>, arg: &Value) -> bool {
    let Some([lo, hi]) = arg.as_array().map(Vec::as_slice).and_then(|s| <&[Value; 2]>::try_from(s).ok()) else {
        return false;
    };
    matches!(compare_opt(value, lo), Some(Ordering::Greater | Ordering::Equal))
        && matches!(compare_opt(value, hi), Some(Ordering::Less | Ordering::Equal))
}

/// SQL `LIKE` pattern to an anchored regex: `%` is any run, `_` any single char.
pub fn like_regex(pattern: &str, insensitive: bool) -> Option<Regex> {
    let mut re = String::from(if insensitive { "(?is)^" } else { "(?s)^" });
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn compare_opt(value: Option<&Value>, arg: &Value) -> Option<Ordering> {
    compare(value?, arg)
}

/// Ordering between two scalars of the same kind.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Stable sort by `"path:asc|desc"` keys, applied left to right. Missing values sort first.
pub fn sort_records(records: &mut [Value], order: &[String]) {
    let keys: Vec<(&str, bool)> = order
        .iter()
        .map(|term| match term.rsplit_once(':') {
            Some((path, dir)) => (path, dir.eq_ignore_ascii_case("desc")),
            None => (term.as_str(), false),
        })
        .collect();
    records.sort_by(|a, b| {
        for (path, desc) in &keys {
            let ord = match (lookup(a, path), lookup(b, path)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Filter, order and paginate `records`. Meta carries `page` when the filter used one, else `offset`.
pub fn apply_filter(mut records: Vec<Value>, filter: Option<&Filter>) -> (Vec<Value>, ListMeta) {
    let default = Filter::default();
    let filter = filter.unwrap_or(&default);
    if let Some(clause) = &filter.where_clause {
        records.retain(|r| matches(r, clause));
    }
    if let Some(order) = &filter.order {
        sort_records(&mut records, order);
    }
    let total = records.len() as u64;
    let (limit, offset) = filter.window();
    let data: Vec<Value> = records
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    let meta = ListMeta {
        total,
        limit,
        offset: filter.page.is_none().then_some(offset),
        page: filter.page.map(|p| p.max(1)),
    };
    (data, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Ada", "age": 36, "tags": ["math"], "address": {"city": "London"}}),
            json!({"id": 2, "name": "alan", "age": 41, "tags": ["logic", "math"], "address": {"city": "Wilmslow"}}),
            json!({"id": 3, "name": "Grace", "age": 85, "nickname": null, "address": {"city": "Arlington"}}),
        ]
    }

    fn ids(where_clause: Value) -> Vec<i64> {
        people()
            .into_iter()
            .filter(|r| matches(r, &where_clause))
            .filter_map(|r| r["id"].as_i64())
            .collect()
    }

    #[test]
    fn literal_and_operator_conditions() {
        assert_eq!(ids(json!({"name": "Ada"})), vec![1]);
        assert_eq!(ids(json!({"age": {"gte": 41}})), vec![2, 3]);
        assert_eq!(ids(json!({"age": {"between": [30, 50]}})), vec![1, 2]);
        assert_eq!(ids(json!({"age": {"notBetween": [30, 50]}})), vec![3]);
        assert_eq!(ids(json!({"tags": {"contains": "logic"}})), vec![2]);
    }

    #[test]
    fn like_family_uses_sql_wildcards() {
        assert_eq!(ids(json!({"name": {"like": "A%"}})), vec![1]);
        assert_eq!(ids(json!({"name": {"iLike": "a%"}})), vec![1, 2]);
        assert_eq!(ids(json!({"name": {"notILike": "_lan"}})), vec![1, 3]);
    }

    #[test]
    fn null_and_existence() {
        assert_eq!(ids(json!({"nickname": {"isNull": true}})), vec![1, 2, 3]);
        assert_eq!(ids(json!({"nickname": {"exists": true}})), vec![3]);
        assert_eq!(ids(json!({"nickname": {"notExists": true}})), vec![1, 2]);
    }

    #[test]
    fn logical_arrays_and_nested_fields() {
        assert_eq!(ids(json!({"age": ["OR", {"lt": 40}, {"gt": 80}]})), vec![1, 3]);
        assert_eq!(ids(json!(["OR", {"id": 2}, {"address": {"city": "London"}}])), vec![1, 2]);
        assert_eq!(ids(json!({"address.city": {"startsWith": "W"}})), vec![2]);
    }

    #[test]
    fn order_and_page_window() {
        let filter = Filter::parse(r#"{"order": ["age:desc"], "limit": 2, "page": 2}"#).unwrap();
        let (data, meta) = apply_filter(people(), Some(&filter));
        assert_eq!(data, vec![people()[0].clone()]);
        assert_eq!(meta, ListMeta { total: 3, limit: 2, offset: None, page: Some(2) });
    }

    #[test]
    fn offset_window_defaults() {
        let (data, meta) = apply_filter(people(), None);
        assert_eq!(data.len(), 3);
        assert_eq!(meta, ListMeta { total: 3, limit: DEFAULT_LIMIT, offset: Some(0), page: None });
        let big = Filter { limit: Some(50_000), ..Filter::default() };
        assert_eq!(big.window().0, MAX_LIMIT);
    }

    #[test]
    fn huge_page_or_offset_yields_an_empty_window() {
        let filter = Filter::parse(r#"{"page": 184467440737095516, "limit": 1000}"#).unwrap();
        assert_eq!(filter.window(), (1000, u64::MAX));
        let (data, meta) = apply_filter(people(), Some(&filter));
        assert!(data.is_empty());
        assert_eq!(meta.total, 3);

        let far = Filter { offset: Some(u64::MAX), ..Filter::default() };
        assert!(apply_filter(people(), Some(&far)).0.is_empty());
    }

    #[test]
    fn malformed_filters_are_ignored() {
        assert_eq!(Filter::parse("{not json"), None);
        assert_eq!(Filter::parse(r#"{"where": 5}"#), None);
        assert_eq!(Filter::parse(r#"{"limit": "ten"}"#), None);
        assert!(Filter::parse(r#"{"sort": ["name:asc"]}"#).unwrap().order.is_some());
    }
}
