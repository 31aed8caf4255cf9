//! Config types: API mount points, docs flag, cookie secret and route-discovery conventions.

use serde::{Deserialize, Serialize};

/// Default request body limit (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix for every server route, e.g. `/api`. Empty mounts at the root.
    pub base_path: String,
    /// Prefix doc routes are mounted under, replacing `base_path`.
    pub docs_path: String,
    pub with_docs: bool,
    /// Signing secret for `Cookie::set_signed` / `get_signed`.
    pub secret: String,
    pub body_limit: usize,
    pub conventions: RouteConventions,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_path: "/api".into(),
            docs_path: "/docs".into(),
            with_docs: true,
            secret: String::new(),
            body_limit: DEFAULT_BODY_LIMIT,
            conventions: RouteConventions::default(),
        }
    }
}

impl ApiConfig {
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn with_docs_path(mut self, path: impl Into<String>) -> Self {
        self.docs_path = path.into();
        self
    }

    pub fn with_docs(mut self, enabled: bool) -> Self {
        self.with_docs = enabled;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }
}

/// Filename markers used to classify discovered route modules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConventions {
    /// Prefix stripped from every discovered key, e.g. `/src/routes/`.
    pub root: String,
    pub page: String,
    pub layout: String,
    pub server: String,
    pub doc: String,
    pub schema: String,
}

impl Default for RouteConventions {
    fn default() -> Self {
        RouteConventions {
            root: "/src/routes/".into(),
            page: "+page".into(),
            layout: "+layout".into(),
            server: "+server".into(),
            doc: "+server.mdx".into(),
            schema: "+schema".into(),
        }
    }
}
