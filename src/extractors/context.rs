//! Build `ReadContext` / `WriteContext` from an axum request.

use crate::context::{typify, Cookie, ReadContext, RequestHeaders, WriteContext};
use crate::error::AppError;
use crate::filter::Filter;
use crate::state::{CookieSecret, Remote};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, FromRequestParts, Multipart, OriginalUri, Path, Request};
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST};
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use url::Url;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Absolute request URL. An unusable `Host` falls back to `localhost`.
fn request_url(parts: &Parts) -> Result<Url, AppError> {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri);
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let scheme = parts
        .headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");
    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    Url::parse(&format!("{}://{}{}", scheme, host, target))
        .or_else(|_| Url::parse(&format!("{}://localhost{}", scheme, target)))
        .map_err(|e| AppError::BadRequest(format!("request url: {}", e)))
}

pub async fn create_read_context<S>(parts: &mut Parts, state: &S) -> Result<ReadContext, AppError>
where
    S: Send + Sync,
{
    let url = request_url(parts)?;

    let params: BTreeMap<String, String> = Path::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .map(|Path(map)| map.into_iter().collect())
        .unwrap_or_default();

    let mut search_params = BTreeMap::new();
    let mut filter = None;
    let mut select = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "filter" if filter.is_none() => filter = Filter::parse(&value),
            "select" if select.is_none() => {
                select = serde_json::from_str::<Value>(&value)
                    .ok()
                    .filter(Value::is_object);
            }
            _ => {}
        }
        search_params
            .entry(name.into_owned())
            .or_insert_with(|| typify(&value));
    }
    // `filter.select` applies when there is no standalone `select`.
    let select = select.or_else(|| {
        filter
            .as_ref()
            .and_then(|f| f.select.clone())
            .filter(Value::is_object)
    });

    let secret = parts
        .extensions
        .get::<CookieSecret>()
        .map(|s| s.0.to_string())
        .unwrap_or_default();
    let cookie = Cookie::parse(
        parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok()),
        secret,
    );

    Ok(ReadContext {
        method: parts.method.clone(),
        url,
        params,
        search_params,
        filter,
        select,
        headers: RequestHeaders::new(parts.headers.clone()),
        cookie,
        remote: parts.extensions.get::<Remote>().cloned(),
        extensions: parts.extensions.clone(),
    })
}

pub async fn create_write_context<S>(req: Request, state: &S) -> Result<WriteContext, AppError>
where
    S: Send + Sync,
{
    let (mut parts, body) = req.into_parts();
    let read = create_read_context(&mut parts, state).await?;
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();
    let req = Request::from_parts(parts, body);

    let body = if content_type == "multipart/form-data" {
        multipart_body(req, state).await?
    } else {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| body_error(rejection.status(), rejection.body_text()))?;
        parse_body(&content_type, &bytes)
    };
    Ok(WriteContext { read, body })
}

#[async_trait]
impl<S> FromRequestParts<S> for ReadContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        create_read_context(parts, state).await
    }
}

#[async_trait]
impl<S> FromRequest<S> for WriteContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        create_write_context(req, state).await
    }
}

/// A body the transport refused. Over-limit bodies map to 413.
fn body_error(status: StatusCode, reason: String) -> AppError {
    tracing::debug!(%status, %reason, "request body rejected");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(reason)
    } else {
        AppError::BadRequest(reason)
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn is_json(content_type: &str) -> bool {
    content_type == "application/json" || content_type.ends_with("+json")
}

fn parse_body(content_type: &str, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return empty();
    }
    if is_json(content_type) {
        return serde_json::from_slice(bytes).unwrap_or_else(|_| empty());
    }
    if content_type == "application/x-www-form-urlencoded" {
        let mut fields = Map::new();
        for (name, value) in url::form_urlencoded::parse(bytes) {
            fields
                .entry(name.into_owned())
                .or_insert_with(|| Value::String(value.into_owned()));
        }
        return Value::Object(fields);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => empty(),
    }
}

async fn multipart_body<S: Send + Sync>(req: Request, state: &S) -> Result<Value, AppError> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|rejection| body_error(rejection.status(), rejection.body_text()))?;
    let multipart_error = |err: MultipartError| body_error(err.status(), err.body_text());
    let mut fields = Map::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let size = field.bytes().await.map_err(multipart_error)?.len();
                serde_json::json!({
                    "filename": filename,
                    "content_type": content_type,
                    "size": size,
                })
            }
            None => Value::String(field.text().await.map_err(multipart_error)?),
        };
        fields.entry(name).or_insert(value);
    }
    Ok(Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;
    use serde_json::json;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = axum::http::Request::builder().method(Method::GET).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn read_context_typifies_search_params() {
        let mut parts = parts(
            "/api/users?active=true&age=42&name=ada&age=7&filter=%7B%22limit%22%3A5%7D&select=%7B%22id%22%3Atrue%7D",
            &[("host", "example.com:8080")],
        );
        let ctx = create_read_context(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.url.as_str().split('?').next(), Some("http://example.com:8080/api/users"));
        assert_eq!(ctx.search("active"), Some(&json!(true)));
        assert_eq!(ctx.search("age"), Some(&json!(42)));
        assert_eq!(ctx.search("name"), Some(&json!("ada")));
        assert_eq!(ctx.filter.as_ref().and_then(|f| f.limit), Some(5));
        assert_eq!(ctx.select, Some(json!({"id": true})));
        assert!(ctx.remote.is_none());
    }

    #[tokio::test]
    async fn select_falls_back_to_the_filter() {
        let mut nested = parts("/x?filter=%7B%22select%22%3A%7B%22name%22%3Atrue%7D%7D", &[]);
        let ctx = create_read_context(&mut nested, &()).await.unwrap();
        assert_eq!(ctx.select, Some(json!({"name": true})));

        let mut both = parts(
            "/x?select=%7B%22id%22%3Atrue%7D&filter=%7B%22select%22%3A%7B%22name%22%3Atrue%7D%7D",
            &[],
        );
        let ctx = create_read_context(&mut both, &()).await.unwrap();
        assert_eq!(ctx.select, Some(json!({"id": true})));
    }

    #[tokio::test]
    async fn read_context_survives_bad_filter_and_host() {
        let mut parts = parts("/x?filter=nope&select=%5B1%5D", &[("host", "bad host")]);
        let ctx = create_read_context(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.url.host_str(), Some("localhost"));
        assert!(ctx.filter.is_none());
        assert!(ctx.select.is_none());
    }

    #[tokio::test]
    async fn read_context_reads_cookies_and_scheme() {
        let mut parts = parts(
            "/",
            &[("cookie", "theme=dark; n=3"), ("x-forwarded-proto", "https")],
        );
        let ctx = create_read_context(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.url.scheme(), "https");
        assert_eq!(ctx.cookie.get("theme"), Some(json!("dark")));
        assert_eq!(ctx.cookie.get("n"), Some(json!(3)));
    }

    async fn body_of(content_type: &str, body: &'static str) -> Value {
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        create_write_context(req, &()).await.unwrap().body
    }

    #[tokio::test]
    async fn write_context_parses_by_content_type() {
        assert_eq!(body_of("application/json", r#"{"a":1}"#).await, json!({"a": 1}));
        assert_eq!(body_of("application/json; charset=utf-8", "{broken").await, json!({}));
        assert_eq!(
            body_of("application/x-www-form-urlencoded", "a=1&b=two+words").await,
            json!({"a": "1", "b": "two words"})
        );
        assert_eq!(body_of("text/plain", "hello").await, json!("hello"));
        assert_eq!(body_of("text/plain", "").await, json!({}));
    }

    #[tokio::test]
    async fn write_context_reads_multipart() {
        let payload = "--XX\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n\
--XX\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nabcd\r\n\
--XX--\r\n";
        let body = body_of("multipart/form-data; boundary=XX", payload).await;
        assert_eq!(body["title"], json!("hello"));
        assert_eq!(
            body["doc"],
            json!({"filename": "a.txt", "content_type": "text/plain", "size": 4})
        );
    }
}
