//! App composition: walk the resolved trees and mount everything on one axum router.
//!
//! Per server node the module default decides what happens:
//! - endpoint config or endpoint: every endpoint route is mounted under the node path, each with a
//!   doc route. Children are re-rooted under the id path (`/api/users/posts` becomes
//!   `/api/users/:users_id/posts`).
//! - plain handler: GET at the node path plus every verb export; children mount unchanged.
//! - none: CRUD exports map to their verbs (READ is dropped when LIST is present).

use crate::config::{validate, ApiConfig};
use crate::endpoint::{CrudMethod, Endpoint, HttpMethod};
use crate::error::AppError;
use crate::handler::BoxedHandler;
use crate::routes::docs::{DocPage, DocRenderer, PlainDocRenderer};
use crate::routes::resolver::{
    import_routes, ClientRoute, Component, ModuleDefault, RouteModule, RouteSources, ServerRoute,
};
use crate::routes::table::RouteTable;
use crate::service::RestDriver;
use crate::state::{CookieSecret, Remote, RouteIndex};
use crate::tree::{join, RouteNode};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::Uri;
use axum::middleware::{self, Next};
use axum::response::{Html, Response};
use axum::{Extension, Router};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;

pub struct App {
    config: ApiConfig,
    sources: RouteSources,
    remote: Option<Remote>,
    renderer: Arc<dyn DocRenderer>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .field("remote", &self.remote)
            .finish()
    }
}

impl App {
    pub fn new(config: ApiConfig) -> Self {
        App {
            config,
            sources: RouteSources::default(),
            remote: None,
            renderer: Arc::new(PlainDocRenderer),
        }
    }

    pub fn routes(mut self, sources: RouteSources) -> Self {
        self.sources = sources;
        self
    }

    /// Bind a storage backend to every request.
    pub fn driver(self, driver: impl RestDriver + 'static) -> Self {
        self.remote(Remote::new(driver))
    }

    pub fn remote(mut self, remote: Remote) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn doc_renderer(mut self, renderer: impl DocRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn build(self) -> Result<Router, AppError> {
        validate(&self.config)?;
        let resolved = import_routes(self.sources, &self.config);

        let mut composer = Composer {
            table: RouteTable::default(),
            config: &self.config,
            renderer: self.renderer.clone(),
        };
        for node in resolved.server {
            composer.register_api(node);
        }

        // The root layout wraps every page; `/` never adopts children in the tree.
        let root_layout = resolved
            .client
            .iter()
            .find(|node| node.path == "/")
            .and_then(|node| node.value.layout.clone());
        for node in resolved.client {
            let chain = match &root_layout {
                Some(layout) if node.path != "/" => vec![layout.clone()],
                _ => Vec::new(),
            };
            composer.register_page(node, chain);
        }

        let table = composer.table;
        let index = RouteIndex(Arc::new(table.index(&self.config.base_path)));
        tracing::info!(
            routes = table.registered().len(),
            base = %self.config.base_path,
            "app built"
        );

        let mut router = table
            .into_router()
            .fallback(fallback)
            .layer(middleware::from_fn(request_timer))
            .layer(Extension(index))
            .layer(Extension(CookieSecret::new(&self.config.secret)));
        if let Some(remote) = self.remote {
            router = router.layer(Extension(remote));
        }
        // The configured limit replaces axum's default extractor limit.
        Ok(router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.body_limit)))
    }
}

/// Shorthand for `App::new(config).routes(sources)` with an optional driver.
pub fn create_app(
    config: ApiConfig,
    sources: RouteSources,
    driver: Option<Arc<dyn RestDriver>>,
) -> Result<Router, AppError> {
    let app = App::new(config).routes(sources);
    match driver {
        Some(driver) => app.remote(Remote(driver)).build(),
        None => app.build(),
    }
}

/// Where the doc page for an API path is mounted: base path swapped for the docs path.
pub fn doc_path(config: &ApiConfig, path: &str) -> String {
    let base = config.base_path.trim_end_matches('/');
    let rest = match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    join(&[&config.docs_path, rest])
}

struct Composer<'a> {
    table: RouteTable,
    config: &'a ApiConfig,
    renderer: Arc<dyn DocRenderer>,
}

struct DocInfo {
    path: String,
    title: Option<String>,
    description: Option<String>,
    page: Option<Component>,
}

impl Composer<'_> {
    fn add(&mut self, kind: &'static str, method: HttpMethod, path: &str, handler: BoxedHandler) {
        if self.table.insert(method, path, handler) {
            tracing::trace!(kind, %method, path, "registered");
        }
    }

    fn register_api(&mut self, node: RouteNode<ServerRoute>) {
        let RouteNode {
            path,
            value,
            children,
        } = node;
        let ServerRoute {
            module,
            page,
            schema,
        } = value;
        let RouteModule {
            default,
            methods,
            crud,
        } = module;

        match default {
            Some(ModuleDefault::Config(config)) => {
                let config = match schema {
                    Some(schema) if config.schema.is_none() => config.with_schema_arc(schema),
                    _ => config,
                };
                self.mount_endpoint(&path, Endpoint::new(config).all(), page, children);
            }
            Some(ModuleDefault::Endpoint(endpoint)) => {
                self.mount_endpoint(&path, endpoint, page, children);
            }
            Some(ModuleDefault::Handler(handler)) => {
                self.add("HOOK", HttpMethod::Get, &path, handler);
                for (method, handler) in methods {
                    self.add("HTTP", method, &path, handler);
                }
                if page.is_some() {
                    self.doc(&path, page, None, None);
                }
                for child in children {
                    self.register_api(child);
                }
            }
            None => {
                let has_list = crud.contains_key(&CrudMethod::List);
                for (method, handler) in crud {
                    if method == CrudMethod::Read && has_list {
                        tracing::warn!(path = %path, "READ and LIST both map to GET, keeping LIST");
                        continue;
                    }
                    self.add("CRUD", method.http_method(), &path, handler);
                }
                for (method, handler) in methods {
                    self.add("HTTP", method, &path, handler);
                }
                if page.is_some() {
                    self.doc(&path, page, None, None);
                }
                for child in children {
                    self.register_api(child);
                }
            }
        }
    }

    fn mount_endpoint(
        &mut self,
        path: &str,
        endpoint: Endpoint,
        page: Option<Component>,
        children: Vec<RouteNode<ServerRoute>>,
    ) {
        let config = endpoint.config();
        let title = Some(config.title.clone().unwrap_or_else(|| config.name.clone()));
        let description = config.description.clone();

        let mut id_base = None;
        for route in endpoint.routes() {
            let full = join(&[path, &route.path]);
            self.add("REST", route.method, &full, route.handler.clone());
            if id_base.is_none() && route.path.starts_with("/:") {
                id_base = Some(full.clone());
            }
            self.doc(&full, page.clone(), title.clone(), description.clone());
        }

        let to = id_base.unwrap_or_else(|| path.to_string());
        for child in children {
            self.register_api(rebase(child, path, &to));
        }
    }

    fn doc(
        &mut self,
        path: &str,
        page: Option<Component>,
        title: Option<String>,
        description: Option<String>,
    ) {
        if !self.config.with_docs {
            return;
        }
        let target = doc_path(self.config, path);
        if self.table.contains(HttpMethod::Get, &target) {
            return;
        }
        let info = Arc::new(DocInfo {
            path: path.to_string(),
            title,
            description,
            page,
        });
        self.add("DOCS", HttpMethod::Get, &target, doc_handler(self.renderer.clone(), info));
    }

    fn register_page(&mut self, node: RouteNode<ClientRoute>, chain: Vec<Component>) {
        let RouteNode {
            path,
            value,
            children,
        } = node;
        let mut layouts = chain;
        if let Some(layout) = value.layout {
            layouts.push(layout);
        }
        self.add("PAGE", HttpMethod::Get, &path, page_handler(value.page, layouts.clone()));
        for child in children {
            self.register_page(child, layouts.clone());
        }
    }
}

/// Move a subtree from `from` to `to`, keeping the part of each path below `from`.
fn rebase<T>(mut node: RouteNode<T>, from: &str, to: &str) -> RouteNode<T> {
    if let Some(rest) = node.path.strip_prefix(from) {
        node.path = format!("{}{}", to, rest);
    }
    node.children = node
        .children
        .into_iter()
        .map(|child| rebase(child, from, to))
        .collect();
    node
}

/// Page wrapped by its layouts, innermost (own) layout first.
fn render(page: &Component, layouts: &[Component]) -> String {
    layouts
        .iter()
        .rev()
        .fold(page(None), |inner, layout| layout(Some(inner)))
}

fn page_handler(page: Component, layouts: Vec<Component>) -> BoxedHandler {
    let layouts: Arc<[Component]> = layouts.into();
    BoxedHandler::new(move || {
        let (page, layouts) = (page.clone(), layouts.clone());
        async move { Html(render(&page, &layouts)) }
    })
}

fn doc_handler(renderer: Arc<dyn DocRenderer>, info: Arc<DocInfo>) -> BoxedHandler {
    BoxedHandler::new(move |index: Option<Extension<RouteIndex>>| {
        let (renderer, info) = (renderer.clone(), info.clone());
        async move {
            let index = index.map(|Extension(index)| index).unwrap_or_default();
            let page = DocPage {
                path: &info.path,
                title: info.title.as_deref(),
                description: info.description.as_deref(),
                content: info.page.as_ref().map(|page| page(None)),
                routes: index.routes(),
            };
            Html(renderer.render(&page))
        }
    })
}

async fn request_timer(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    let response = next.run(req).await;
    tracing::trace!(
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn fallback(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::resolver::component;

    #[test]
    fn doc_path_swaps_base_for_docs() {
        let config = ApiConfig::default();
        assert_eq!(doc_path(&config, "/api/users"), "/docs/users");
        assert_eq!(doc_path(&config, "/api"), "/docs");
        assert_eq!(doc_path(&config, "/apiary"), "/docs/apiary");
        let rooted = ApiConfig::default().with_base_path("");
        assert_eq!(doc_path(&rooted, "/users/:users_id"), "/docs/users/:users_id");
    }

    #[test]
    fn rebase_moves_whole_subtree() {
        let tree = RouteNode {
            path: "/api/users/posts".to_string(),
            value: (),
            children: vec![RouteNode::leaf("/api/users/posts/tags", ())],
        };
        let moved = rebase(tree, "/api/users", "/api/users/:users_id");
        assert_eq!(moved.path, "/api/users/:users_id/posts");
        assert_eq!(moved.children[0].path, "/api/users/:users_id/posts/tags");
    }

    #[test]
    fn layouts_wrap_innermost_first() {
        let page = component(|_| "page".to_string());
        let outer = component(|c| format!("<outer>{}</outer>", c.unwrap_or_default()));
        let inner = component(|c| format!("<inner>{}</inner>", c.unwrap_or_default()));
        assert_eq!(
            render(&page, &[outer, inner]),
            "<outer><inner>page</inner></outer>"
        );
    }
}
