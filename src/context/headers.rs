//! String-keyed accessor over the request headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestHeaders(HeaderMap);

impl RequestHeaders {
    pub fn new(map: HeaderMap) -> Self {
        RequestHeaders(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Replace the value. Returns false when the name or value is not a valid header.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.0.insert(name, value);
                true
            }
            _ => false,
        }
    }

    pub fn append(&mut self, name: &str, value: &str) -> bool {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.0.append(name, value);
                true
            }
            _ => false,
        }
    }

    pub fn delete(&mut self, name: &str) {
        self.0.remove(name);
    }

    pub fn as_map(&self) -> &HeaderMap {
        &self.0
    }

    /// Lower-cased names to values; repeated headers are joined with `, `.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for name in self.0.keys() {
            let joined = self
                .0
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join(", ");
            out.insert(name.as_str().to_string(), Value::String(joined));
        }
        Value::Object(out)
    }
}
