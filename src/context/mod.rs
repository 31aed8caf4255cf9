//! Per-request contexts handed to hooks, middleware, drivers and plain handlers.
//!
//! `ReadContext` is built for every request; `WriteContext` adds the parsed body. Both are
//! created fresh per request and never shared across requests. See `extractors::context` for
//! how they are built from an axum request.

mod cookie;
mod headers;

pub use cookie::{Cookie, CookieOptions, SameSite, Signed};
pub use headers::RequestHeaders;

use crate::filter::Filter;
use crate::state::Remote;
use axum::http::{Extensions, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use url::Url;

#[derive(Clone, Debug)]
pub struct ReadContext {
    pub method: Method,
    pub url: Url,
    pub params: BTreeMap<String, String>,
    /// Query parameters with `true`/`false` and numbers typified. First occurrence wins.
    pub search_params: BTreeMap<String, Value>,
    pub filter: Option<Filter>,
    pub select: Option<Value>,
    pub headers: RequestHeaders,
    pub cookie: Cookie,
    pub remote: Option<Remote>,
    pub extensions: Extensions,
}

impl ReadContext {
    /// Bare context with no params, headers, cookies or backend. Useful for calling drivers directly.
    pub fn new(method: Method, url: Url) -> Self {
        ReadContext {
            method,
            url,
            params: BTreeMap::new(),
            search_params: BTreeMap::new(),
            filter: None,
            select: None,
            headers: RequestHeaders::default(),
            cookie: Cookie::parse(None::<&str>, ""),
            remote: None,
            extensions: Extensions::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn search(&self, name: &str) -> Option<&Value> {
        self.search_params.get(name)
    }

    /// Value previously stored on the request, e.g. by a layer or middleware.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn set<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }
}

#[derive(Clone, Debug)]
pub struct WriteContext {
    pub read: ReadContext,
    pub body: Value,
}

impl Deref for WriteContext {
    type Target = ReadContext;

    fn deref(&self) -> &ReadContext {
        &self.read
    }
}

impl DerefMut for WriteContext {
    fn deref_mut(&mut self) -> &mut ReadContext {
        &mut self.read
    }
}

/// Common view over both context kinds, used by middleware.
pub trait HandlerContext: Send + Sync {
    fn read(&self) -> &ReadContext;
    fn read_mut(&mut self) -> &mut ReadContext;

    fn body(&self) -> Option<&Value> {
        None
    }

    fn body_mut(&mut self) -> Option<&mut Value> {
        None
    }
}

impl HandlerContext for ReadContext {
    fn read(&self) -> &ReadContext {
        self
    }

    fn read_mut(&mut self) -> &mut ReadContext {
        self
    }
}

impl HandlerContext for WriteContext {
    fn read(&self) -> &ReadContext {
        &self.read
    }

    fn read_mut(&mut self) -> &mut ReadContext {
        &mut self.read
    }

    fn body(&self) -> Option<&Value> {
        Some(&self.body)
    }

    fn body_mut(&mut self) -> Option<&mut Value> {
        Some(&mut self.body)
    }
}

/// `"true"`/`"false"` to booleans, numeric text to numbers, anything else stays a string.
pub fn typify(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Value::String(raw.to_string());
            }
            if let Ok(n) = trimmed.parse::<i64>() {
                return Value::from(n);
            }
            match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() => serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(raw.to_string())),
                _ => Value::String(raw.to_string()),
            }
        }
    }
}
