//! Path to method-router table; merges verbs per path and drops duplicate registrations.

use crate::endpoint::HttpMethod;
use crate::handler::BoxedHandler;
use crate::state::FlatRoute;
use crate::tree::{group, RouteNode};
use axum::routing::MethodRouter;
use axum::Router;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
pub struct RouteTable {
    routers: BTreeMap<String, MethodRouter>,
    seen: BTreeSet<(String, HttpMethod)>,
    registered: Vec<(HttpMethod, String)>,
}

impl RouteTable {
    pub fn contains(&self, method: HttpMethod, path: &str) -> bool {
        self.seen.contains(&(path.to_string(), method))
    }

    /// Register `handler`; `false` when `method path` is already taken (the first one stays).
    pub fn insert(&mut self, method: HttpMethod, path: &str, handler: BoxedHandler) -> bool {
        if !self.seen.insert((path.to_string(), method)) {
            tracing::warn!(%method, path, "duplicate route, keeping the first");
            return false;
        }
        let added = handler.into_method_router(method.filter());
        let merged = match self.routers.remove(path) {
            Some(existing) => existing.merge(added),
            None => added,
        };
        self.routers.insert(path.to_string(), merged);
        self.registered.push((method, path.to_string()));
        true
    }

    /// `(method, path)` pairs in registration order.
    pub fn registered(&self) -> &[(HttpMethod, String)] {
        &self.registered
    }

    /// Routes under `base`, one entry per path with its methods, grouped into a tree.
    pub fn index(&self, base: &str) -> Vec<RouteNode<FlatRoute>> {
        let mut by_path: Vec<(String, FlatRoute)> = Vec::new();
        for (method, path) in &self.registered {
            let under_base = base.is_empty()
                || path == base
                || path.starts_with(&format!("{}/", base.trim_end_matches('/')));
            if !under_base {
                continue;
            }
            match by_path.iter_mut().find(|(p, _)| p == path) {
                Some((_, route)) => route.methods.push(method.as_str().to_string()),
                None => by_path.push((
                    path.clone(),
                    FlatRoute {
                        path: path.clone(),
                        methods: vec![method.as_str().to_string()],
                    },
                )),
            }
        }
        group(by_path)
    }

    pub fn into_router(self) -> Router {
        self.routers
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            })
    }
}
