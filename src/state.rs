//! Request-scoped state, injected into every request through `Extension` layers.

use crate::service::RestDriver;
use crate::tree::RouteNode;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The storage backend bound to the request.
#[derive(Clone)]
pub struct Remote(pub Arc<dyn RestDriver>);

impl Remote {
    pub fn new(driver: impl RestDriver + 'static) -> Self {
        Remote(Arc::new(driver))
    }

    pub fn driver(&self) -> &dyn RestDriver {
        self.0.as_ref()
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Remote").field(&self.0.name()).finish()
    }
}

/// Process-wide cookie signing secret.
#[derive(Clone, Debug)]
pub struct CookieSecret(pub Arc<str>);

impl CookieSecret {
    pub fn new(secret: &str) -> Self {
        CookieSecret(Arc::from(secret))
    }
}

/// One registered API path and the methods mounted on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlatRoute {
    pub path: String,
    pub methods: Vec<String>,
}

/// Grouped index of every API route, shared read-only with handlers and doc pages.
#[derive(Clone, Debug, Default)]
pub struct RouteIndex(pub Arc<Vec<RouteNode<FlatRoute>>>);

impl RouteIndex {
    pub fn routes(&self) -> &[RouteNode<FlatRoute>] {
        &self.0
    }
}
