//! Cookie accessor: reads the request's cookies and queues `Set-Cookie` values for the response.
//!
//! Signed cookies are `value.signature`, where the signature is the base64 HMAC-SHA256 of the
//! value under the process secret. The whole pair is percent-encoded.

use crate::context::typify;
use axum::http::{header::SET_COOKIE, HeaderValue};
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

type HmacSha256 = Hmac<Sha256>;

/// Characters left as-is by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        CookieOptions {
            path: Some("/".into()),
            domain: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}

impl CookieOptions {
    fn serialize(&self, name: &str, value: &str) -> String {
        let mut out = format!("{}={}", name, value);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!("; Domain={}", domain));
        }
        if let Some(path) = &self.path {
            out.push_str(&format!("; Path={}", path));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            out.push_str(match same_site {
                SameSite::Strict => "; SameSite=Strict",
                SameSite::Lax => "; SameSite=Lax",
                SameSite::None => "; SameSite=None",
            });
        }
        out
    }
}

/// Outcome of reading a signed cookie that is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signed {
    Valid(String),
    Tampered,
}

#[derive(Clone, Default)]
pub struct Cookie {
    incoming: BTreeMap<String, String>,
    secret: String,
    outgoing: Arc<Mutex<Vec<String>>>,
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("incoming", &self.incoming)
            .field("pending", &self.pending().len())
            .finish()
    }
}

impl Cookie {
    /// Parse `Cookie` header values. Later duplicates do not override earlier ones.
    pub fn parse<'a>(headers: impl IntoIterator<Item = &'a str>, secret: impl Into<String>) -> Self {
        let mut incoming = BTreeMap::new();
        for header in headers {
            for pair in header.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim().trim_matches('"');
                let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
                incoming.entry(name.to_string()).or_insert(decoded);
            }
        }
        Cookie {
            incoming,
            secret: secret.into(),
            outgoing: Arc::default(),
        }
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.incoming
    }

    /// Typified value: `"true"`/`"false"` and numbers are converted.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.incoming.get(name).map(|v| typify(v))
    }

    /// Like `get`, but sets the cookie to `fallback` when it is missing.
    pub fn get_or_init(&self, name: &str, fallback: &Value) -> Value {
        match self.get(name) {
            Some(v) => v,
            None => {
                self.set(name, fallback, &CookieOptions::default());
                typify(&stringify(fallback))
            }
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.incoming.contains_key(name)
    }

    /// Non-string values are stored as their JSON text.
    pub fn set(&self, name: &str, value: &Value, options: &CookieOptions) {
        let encoded = utf8_percent_encode(&stringify(value), COMPONENT).to_string();
        self.push(options.serialize(name, &encoded));
    }

    pub fn set_signed(&self, name: &str, value: &Value, options: &CookieOptions) {
        let value = stringify(value);
        let signed = format!("{}.{}", value, self.sign(&value));
        let encoded = utf8_percent_encode(&signed, COMPONENT).to_string();
        self.push(options.serialize(name, &encoded));
    }

    /// `None` when the cookie is absent.
    pub fn get_signed(&self, name: &str) -> Option<Signed> {
        let raw = self.incoming.get(name)?;
        let Some((value, signature)) = raw.rsplit_once('.') else {
            return Some(Signed::Tampered);
        };
        let Ok(signature) = STANDARD.decode(signature) else {
            return Some(Signed::Tampered);
        };
        let verified = self
            .mac()
            .map(|mut mac| {
                mac.update(value.as_bytes());
                mac.verify_slice(&signature).is_ok()
            })
            .unwrap_or(false);
        Some(if verified {
            Signed::Valid(value.to_string())
        } else {
            Signed::Tampered
        })
    }

    pub fn remove(&self, name: &str, options: &CookieOptions) {
        let expired = CookieOptions {
            max_age: Some(0),
            ..options.clone()
        };
        self.push(format!(
            "{}; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            expired.serialize(name, "")
        ));
    }

    /// Queued `Set-Cookie` values, in call order.
    pub fn pending(&self) -> Vec<String> {
        self.outgoing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Append queued cookies to the outgoing response.
    pub fn apply(&self, response: &mut Response) {
        for value in self.pending() {
            match HeaderValue::from_str(&value) {
                Ok(v) => {
                    response.headers_mut().append(SET_COOKIE, v);
                }
                Err(_) => tracing::warn!(cookie = %value, "dropping unencodable cookie"),
            }
        }
    }

    fn push(&self, value: String) {
        self.outgoing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(value);
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes()).ok()
    }

    fn sign(&self, value: &str) -> String {
        match self.mac() {
            Some(mut mac) => {
                mac.update(value.as_bytes());
                STANDARD.encode(mac.finalize().into_bytes())
            }
            None => String::new(),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
