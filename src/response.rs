//! Standard response envelope: `RestResponse`, error entries and the helpers drivers build them with.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One violated constraint. A response may carry several.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            code: Some(code.into()),
            field: Some(field.into()),
            message: Some(message.into()),
        }
    }

    /// Validation issue: the field is optional (issues on the root value carry none).
    pub fn issue(code: &str, field: Option<String>, message: impl Into<String>) -> Self {
        ApiError {
            code: Some(code.to_string()),
            field,
            message: Some(message.into()),
        }
    }
}

/// Pagination block of a list body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub total: u64,
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

/// Result of a backend call, before it is turned into an HTTP response.
///
/// `ok == false` implies `body` is `{ "errors": [...] }`; `ok && multiple` implies
/// `body` is `{ "data": [...], "meta": {...} }`.
#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub ok: bool,
    pub status: StatusCode,
    pub body: Value,
    pub multiple: bool,
    pub status_text: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl RestResponse {
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Error entries carried by a failed response; empty for successes.
    pub fn errors(&self) -> Vec<ApiError> {
        self.body
            .get("errors")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

pub fn error_envelope(errors: Vec<ApiError>) -> Value {
    serde_json::json!({ "errors": errors })
}

fn failure(status: StatusCode, status_text: &str, errors: Vec<ApiError>) -> RestResponse {
    RestResponse {
        ok: false,
        status,
        body: error_envelope(errors),
        multiple: false,
        status_text: Some(status_text.to_string()),
        headers: BTreeMap::new(),
    }
}

/// 200 with a single body.
pub fn json(body: Value) -> RestResponse {
    json_with_status(body, StatusCode::OK)
}

pub fn json_with_status(body: Value, status: StatusCode) -> RestResponse {
    RestResponse {
        ok: true,
        status,
        body,
        multiple: false,
        status_text: None,
        headers: BTreeMap::new(),
    }
}

/// 200 with a list body, marked `multiple` so response validation checks `{data, meta}`.
pub fn json_list(data: Vec<Value>, meta: ListMeta) -> RestResponse {
    RestResponse {
        ok: true,
        status: StatusCode::OK,
        body: serde_json::json!({ "data": data, "meta": meta }),
        multiple: true,
        status_text: None,
        headers: BTreeMap::new(),
    }
}

pub fn not_found(field: Option<&str>) -> RestResponse {
    failure(
        StatusCode::NOT_FOUND,
        "Not found",
        vec![ApiError::new("not-found", field.unwrap_or("unknown"), "Not found")],
    )
}

pub fn bad_request(errors: Vec<ApiError>) -> RestResponse {
    failure(StatusCode::BAD_REQUEST, "Bad request", errors)
}

pub fn unauthorized(errors: Vec<ApiError>) -> RestResponse {
    failure(StatusCode::UNAUTHORIZED, "Unauthorized", errors)
}

pub fn forbidden(errors: Vec<ApiError>) -> RestResponse {
    failure(StatusCode::FORBIDDEN, "Forbidden", errors)
}

pub fn error(errors: Vec<ApiError>, status: StatusCode) -> RestResponse {
    failure(status, "Internal error", errors)
}

/// The uniform 500 envelope for anything thrown inside a handler.
pub fn internal(message: impl Into<String>) -> RestResponse {
    error(
        vec![ApiError::new("internal", "service", message)],
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

/// Serialize a `RestResponse` as JSON with its own status and extra headers.
pub fn respond(response: RestResponse) -> Response {
    let RestResponse {
        status, body, headers, ..
    } = response;
    let mut http = (status, Json(body)).into_response();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                http.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid response header"),
        }
    }
    http
}

impl IntoResponse for RestResponse {
    fn into_response(self) -> Response {
        respond(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_carries_errors() {
        let res = not_found(Some("user"));
        assert!(!res.ok);
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(
            res.errors(),
            vec![ApiError::new("not-found", "user", "Not found")]
        );
    }

    #[test]
    fn list_body_is_marked_multiple() {
        let res = json_list(
            vec![serde_json::json!({"id": 1})],
            ListMeta {
                total: 1,
                limit: 1,
                offset: None,
                page: Some(1),
            },
        );
        assert!(res.multiple);
        assert_eq!(res.body["meta"], serde_json::json!({"total": 1, "limit": 1, "page": 1}));
        assert!(res.errors().is_empty());
    }

    #[test]
    fn respond_applies_status_and_headers() {
        let http = respond(json_with_status(serde_json::json!({}), StatusCode::CREATED).with_header("x-total", "3"));
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["x-total"], "3");
    }
}
