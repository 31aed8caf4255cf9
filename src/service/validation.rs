//! Schema validation for request bodies and backend responses.
//!
//! Every violated rule yields one `ApiError` with a `code`, the offending `field` path and a
//! message; validation never stops at the first failure.

use crate::response::ApiError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Anything that can check a JSON value.
pub trait Schema: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), Vec<ApiError>>;
}

impl<F> Schema for F
where
    F: Fn(&Value) -> Result<(), Vec<ApiError>> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), Vec<ApiError>> {
        self(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn accepts(self, v: &Value) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::String => v.is_string(),
            FieldType::Number => v.is_number(),
            FieldType::Integer => v.is_i64() || v.is_u64(),
            FieldType::Boolean => v.is_boolean(),
            FieldType::Object => v.is_object(),
            FieldType::Array => v.is_array(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

/// Rules for one field. Fields are required unless marked otherwise.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type", default)]
    pub kind: FieldType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl FieldRule {
    pub fn of(kind: FieldType) -> Self {
        FieldRule {
            kind,
            required: true,
            nullable: false,
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
            allowed: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, re: impl Into<String>) -> Self {
        self.pattern = Some(re.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn one_of(mut self, values: Vec<Value>) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn min(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }
}

/// Object schema: a rule per field; unknown keys are rejected only when `strict`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub fields: BTreeMap<String, FieldRule>,
    #[serde(default)]
    pub strict: bool,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, value: &Value) -> Result<(), Vec<ApiError>> {
        let Some(body) = value.as_object() else {
            return Err(vec![ApiError::issue(
                "invalid_type",
                None,
                format!("Expected object, received {}", kind_of(value)),
            )]);
        };
        let mut issues = Vec::new();
        for (name, rule) in &self.fields {
            match body.get(name) {
                None if rule.required => issues.push(ApiError::issue(
                    "invalid_type",
                    Some(name.clone()),
                    "Required",
                )),
                None => {}
                Some(Value::Null) if rule.nullable => {}
                Some(Value::Null) if !rule.required => {}
                Some(v) => check_field(name, v, rule, &mut issues),
            }
        }
        if self.strict {
            for key in body.keys().filter(|k| !self.fields.contains_key(*k)) {
                issues.push(ApiError::issue(
                    "unrecognized_keys",
                    Some(key.clone()),
                    format!("Unrecognized key: {}", key),
                ));
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_field(name: &str, v: &Value, rule: &FieldRule, issues: &mut Vec<ApiError>) {
    let field = || Some(name.to_string());
    if !rule.kind.accepts(v) {
        issues.push(ApiError::issue(
            "invalid_type",
            field(),
            format!("Expected {}, received {}", rule.kind.label(), kind_of(v)),
        ));
        return;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count() as u32;
        if let Some(min) = rule.min_length {
            if len < min {
                issues.push(ApiError::issue(
                    "too_small",
                    field(),
                    format!("String must contain at least {} character(s)", min),
                ));
            }
        }
        if let Some(max) = rule.max_length {
            if len > max {
                issues.push(ApiError::issue(
                    "too_big",
                    field(),
                    format!("String must contain at most {} character(s)", max),
                ));
            }
        }
        if let Some(pattern) = &rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => issues.push(ApiError::issue("invalid_string", field(), "Invalid")),
                Err(_) => issues.push(ApiError::issue(
                    "custom",
                    field(),
                    format!("Invalid pattern for {}", name),
                )),
            }
        }
        if let Some(format) = &rule.format {
            if !format_ok(format, s) {
                issues.push(ApiError::issue(
                    "invalid_string",
                    field(),
                    format!("Invalid {}", format.to_lowercase()),
                ));
            }
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                issues.push(ApiError::issue(
                    "too_small",
                    field(),
                    format!("Number must be greater than or equal to {}", min),
                ));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                issues.push(ApiError::issue(
                    "too_big",
                    field(),
                    format!("Number must be less than or equal to {}", max),
                ));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            issues.push(ApiError::issue(
                "invalid_enum_value",
                field(),
                format!(
                    "Invalid enum value. Expected {}",
                    allowed
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(" | ")
                ),
            ));
        }
    }
}

fn format_ok(format: &str, s: &str) -> bool {
    match format.to_lowercase().as_str() {
        "email" => match s.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
            None => false,
        },
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        "url" => url::Url::parse(s).is_ok(),
        _ => true,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a list body `{ data: [item], meta: { total?, limit?, offset?, page? } }`, checking each
/// item against `schema`. Item issues are reported as `data.<index>.<field>`.
pub fn validate_listing(schema: &dyn Schema, body: &Value) -> Result<(), Vec<ApiError>> {
    let mut issues = Vec::new();
    match body.get("data") {
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if let Err(errors) = schema.validate(item) {
                    issues.extend(errors.into_iter().map(|mut e| {
                        e.field = Some(match e.field.take() {
                            Some(f) => format!("data.{}.{}", i, f),
                            None => format!("data.{}", i),
                        });
                        e
                    }));
                }
            }
        }
        other => issues.push(ApiError::issue(
            "invalid_type",
            Some("data".into()),
            format!("Expected array, received {}", other.map_or("undefined", kind_of)),
        )),
    }
    match body.get("meta") {
        Some(Value::Object(meta)) => {
            for key in ["total", "limit", "offset", "page"] {
                match meta.get(key) {
                    None | Some(Value::Number(_)) => {}
                    Some(v) => issues.push(ApiError::issue(
                        "invalid_type",
                        Some(format!("meta.{}", key)),
                        format!("Expected number, received {}", kind_of(v)),
                    )),
                }
            }
        }
        other => issues.push(ApiError::issue(
            "invalid_type",
            Some("meta".into()),
            format!("Expected object, received {}", other.map_or("undefined", kind_of)),
        )),
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> ObjectSchema {
        ObjectSchema::new()
            .field("name", FieldRule::string().min_length(1))
            .field("email", FieldRule::string().format("email").optional())
            .field("age", FieldRule::integer().min(0.0).optional())
            .field("role", FieldRule::string().one_of(vec![json!("admin"), json!("user")]).optional())
    }

    fn codes(result: Result<(), Vec<ApiError>>) -> Vec<(String, String)> {
        result
            .unwrap_err()
            .into_iter()
            .map(|e| (e.code.unwrap_or_default(), e.field.unwrap_or_default()))
            .collect()
    }

    #[test]
    fn valid_body_passes() {
        assert!(user_schema().validate(&json!({"name": "x"})).is_ok());
        assert!(user_schema()
            .validate(&json!({"name": "x", "email": "x@y.io", "age": 3, "role": "admin"}))
            .is_ok());
    }

    #[test]
    fn collects_every_issue() {
        let issues = codes(user_schema().validate(&json!({"email": "nope", "age": -1, "role": "root"})));
        assert_eq!(
            issues,
            vec![
                ("too_small".to_string(), "age".to_string()),
                ("invalid_string".to_string(), "email".to_string()),
                ("invalid_type".to_string(), "name".to_string()),
                ("invalid_enum_value".to_string(), "role".to_string()),
            ]
        );
    }

    #[test]
    fn non_object_body_is_a_root_issue() {
        let issues = user_schema().validate(&json!([1])).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, None);
    }

    #[test]
    fn strict_rejects_unknown_keys() {
        let schema = ObjectSchema::new().field("id", FieldRule::integer()).strict();
        assert_eq!(
            codes(schema.validate(&json!({"id": 1, "extra": true}))),
            vec![("unrecognized_keys".to_string(), "extra".to_string())]
        );
    }

    #[test]
    fn closures_are_schemas() {
        let even = |v: &Value| match v.as_i64() {
            Some(n) if n % 2 == 0 => Ok(()),
            _ => Err(vec![ApiError::issue("custom", None, "must be even")]),
        };
        assert!(even.validate(&json!(2)).is_ok());
        assert!(even.validate(&json!(3)).is_err());
    }

    #[test]
    fn listing_checks_items_and_meta() {
        let schema = ObjectSchema::new().field("id", FieldRule::integer());
        assert!(validate_listing(
            &schema,
            &json!({"data": [{"id": 1}], "meta": {"total": 1, "limit": 1, "page": 1}})
        )
        .is_ok());

        let issues = codes(validate_listing(
            &schema,
            &json!({"data": [{"id": 1}, {"id": "2"}], "meta": {"total": "1"}}),
        ));
        assert_eq!(
            issues,
            vec![
                ("invalid_type".to_string(), "data.1.id".to_string()),
                ("invalid_type".to_string(), "meta.total".to_string()),
            ]
        );
    }

    #[test]
    fn rules_deserialize_from_json() {
        let schema: ObjectSchema = serde_json::from_value(json!({
            "fields": {"title": {"type": "string", "max_length": 3}}
        }))
        .unwrap();
        assert_eq!(
            codes(schema.validate(&json!({"title": "long"}))),
            vec![("too_big".to_string(), "title".to_string())]
        );
    }
}
