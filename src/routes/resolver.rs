//! Route discovery: turn file-keyed route modules into client and server route trees.
//!
//! Keys look like `/src/routes/users/[user_id]/+server.rs`. The part before the first `/+` is
//! the route directory; the file marker after it decides what the entry is.

use crate::config::{ApiConfig, RouteConventions};
use crate::endpoint::{CrudMethod, Endpoint, EndpointConfig, HttpMethod};
use crate::handler::BoxedHandler;
use crate::service::Schema;
use crate::tree::{group, join, RouteNode};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Renders HTML. Pages get `None`; layouts get the rendered child.
pub type Component = Arc<dyn Fn(Option<String>) -> String + Send + Sync>;

pub fn component<F>(f: F) -> Component
where
    F: Fn(Option<String>) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What a server module mounts at its own path.
#[derive(Clone, Debug)]
pub enum ModuleDefault {
    /// Plain GET handler.
    Handler(BoxedHandler),
    /// Resource config, mounted with every CRUD handler.
    Config(EndpointConfig),
    /// Prebuilt endpoint.
    Endpoint(Endpoint),
}

/// A server route module: an optional default plus verb and CRUD exports.
#[derive(Clone, Debug, Default)]
pub struct RouteModule {
    pub default: Option<ModuleDefault>,
    pub methods: BTreeMap<HttpMethod, BoxedHandler>,
    pub crud: BTreeMap<CrudMethod, BoxedHandler>,
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(handler: BoxedHandler) -> Self {
        RouteModule {
            default: Some(ModuleDefault::Handler(handler)),
            ..Self::default()
        }
    }

    pub fn config(config: EndpointConfig) -> Self {
        RouteModule {
            default: Some(ModuleDefault::Config(config)),
            ..Self::default()
        }
    }

    pub fn endpoint(endpoint: Endpoint) -> Self {
        RouteModule {
            default: Some(ModuleDefault::Endpoint(endpoint)),
            ..Self::default()
        }
    }

    pub fn on(mut self, method: HttpMethod, handler: BoxedHandler) -> Self {
        self.methods.insert(method, handler);
        self
    }

    pub fn crud(mut self, method: CrudMethod, handler: BoxedHandler) -> Self {
        self.crud.insert(method, handler);
        self
    }
}

/// One discovered value, before it is matched to its filename marker.
#[derive(Clone)]
pub enum Discovered {
    Server(RouteModule),
    Page(Component),
    Layout(Component),
    Doc(Component),
    Schema(Arc<dyn Schema>),
}

impl Discovered {
    fn kind(&self) -> &'static str {
        match self {
            Discovered::Server(_) => "server",
            Discovered::Page(_) => "page",
            Discovered::Layout(_) => "layout",
            Discovered::Doc(_) => "doc",
            Discovered::Schema(_) => "schema",
        }
    }
}

impl fmt::Debug for Discovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[derive(Clone)]
pub struct ServerRoute {
    pub module: RouteModule,
    /// Doc page from the sibling `+server.mdx`.
    pub page: Option<Component>,
    /// Schema from the sibling `+schema` file.
    pub schema: Option<Arc<dyn Schema>>,
}

impl fmt::Debug for ServerRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRoute")
            .field("module", &self.module)
            .field("page", &self.page.is_some())
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct ClientRoute {
    pub page: Component,
    pub layout: Option<Component>,
}

impl fmt::Debug for ClientRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRoute")
            .field("layout", &self.layout.is_some())
            .finish()
    }
}

/// Discovered entries keyed by file path, in discovery order.
#[derive(Clone, Debug, Default)]
pub struct RouteSources {
    pub client: Vec<(String, Discovered)>,
    pub server: Vec<(String, Discovered)>,
}

impl RouteSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, key: impl Into<String>, value: Discovered) -> Self {
        self.client.push((key.into(), value));
        self
    }

    pub fn server(mut self, key: impl Into<String>, value: Discovered) -> Self {
        self.server.push((key.into(), value));
        self
    }

    pub fn page(self, key: impl Into<String>, page: Component) -> Self {
        self.client(key, Discovered::Page(page))
    }

    pub fn layout(self, key: impl Into<String>, layout: Component) -> Self {
        self.client(key, Discovered::Layout(layout))
    }

    pub fn module(self, key: impl Into<String>, module: RouteModule) -> Self {
        self.server(key, Discovered::Server(module))
    }

    pub fn doc(self, key: impl Into<String>, doc: Component) -> Self {
        self.server(key, Discovered::Doc(doc))
    }

    pub fn schema(self, key: impl Into<String>, schema: impl Schema + 'static) -> Self {
        self.server(key, Discovered::Schema(Arc::new(schema)))
    }
}

#[derive(Debug, Default)]
pub struct ResolvedRoutes {
    pub client: Vec<RouteNode<ClientRoute>>,
    pub server: Vec<RouteNode<ServerRoute>>,
}

/// The route directory: everything before the first `/+`.
fn dir_key(key: &str) -> &str {
    key.split("/+").next().unwrap_or(key)
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn has_marker(key: &str, marker: &str) -> bool {
    file_name(key).starts_with(marker)
}

fn dynamic_segment() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]").ok()).as_ref()
}

/// Mount path for a discovered key: root prefix to `/`, `[id]` to `:id`, cut at the first marker.
pub fn mount_path(key: &str, conventions: &RouteConventions) -> String {
    let relative = match key.strip_prefix(conventions.root.as_str()) {
        Some(rest) => format!("/{}", rest),
        None => key.to_string(),
    };
    let rewritten = match dynamic_segment() {
        Some(re) => re.replace_all(&relative, ":$1").into_owned(),
        None => relative,
    };
    let base = rewritten.split("/+").next().unwrap_or("");
    if base.is_empty() {
        "/".to_string()
    } else {
        base.to_string()
    }
}

fn client_routes(
    entries: Vec<(String, Discovered)>,
    conventions: &RouteConventions,
) -> Vec<RouteNode<ClientRoute>> {
    let mut layouts: HashMap<String, Component> = HashMap::new();
    let mut pages = Vec::new();
    for (key, value) in entries {
        if has_marker(&key, &conventions.layout) {
            match value {
                Discovered::Layout(layout) => {
                    layouts.insert(dir_key(&key).to_string(), layout);
                }
                other => tracing::warn!(%key, kind = other.kind(), "expected a layout, skipping"),
            }
            continue;
        }
        if !has_marker(&key, &conventions.page) {
            tracing::warn!(%key, "not a page or layout file, skipping");
            continue;
        }
        match value {
            Discovered::Page(page) => pages.push((key, page)),
            other => tracing::warn!(%key, kind = other.kind(), "expected a page, skipping"),
        }
    }

    let flat = pages
        .into_iter()
        .map(|(key, page)| {
            let layout = layouts.get(dir_key(&key)).cloned();
            (mount_path(&key, conventions), ClientRoute { page, layout })
        })
        .collect();
    group(flat)
}

fn server_routes(
    entries: Vec<(String, Discovered)>,
    config: &ApiConfig,
) -> Vec<RouteNode<ServerRoute>> {
    let conventions = &config.conventions;
    let mut docs: HashMap<String, Component> = HashMap::new();
    let mut schemas: HashMap<String, Arc<dyn Schema>> = HashMap::new();
    let mut modules = Vec::new();
    for (key, value) in entries {
        let dir = dir_key(&key).to_string();
        if has_marker(&key, &conventions.doc) {
            match value {
                Discovered::Doc(doc) => {
                    docs.insert(dir, doc);
                }
                other => tracing::warn!(%key, kind = other.kind(), "expected a doc page, skipping"),
            }
            continue;
        }
        if has_marker(&key, &conventions.schema) {
            match value {
                Discovered::Schema(schema) => {
                    schemas.insert(dir, schema);
                }
                other => tracing::warn!(%key, kind = other.kind(), "expected a schema, skipping"),
            }
            continue;
        }
        if !has_marker(&key, &conventions.server) {
            tracing::warn!(%key, "not a server, doc or schema file, skipping");
            continue;
        }
        match value {
            Discovered::Server(module) => modules.push((key, module)),
            other => tracing::warn!(%key, kind = other.kind(), "expected a server module, skipping"),
        }
    }

    let flat = modules
        .into_iter()
        .map(|(key, module)| {
            let dir = dir_key(&key);
            let route = ServerRoute {
                module,
                page: docs.get(dir).cloned(),
                schema: schemas.get(dir).cloned(),
            };
            (mount_path(&key, conventions), route)
        })
        .collect();
    group(flat)
        .into_iter()
        .map(|node| prefix(node, &config.base_path))
        .collect()
}

fn prefix<T>(mut node: RouteNode<T>, base: &str) -> RouteNode<T> {
    node.path = join(&[base, &node.path]);
    node.children = node
        .children
        .into_iter()
        .map(|child| prefix(child, base))
        .collect();
    node
}

/// Resolve discovered entries into client and server trees. Server paths carry the base path.
pub fn import_routes(sources: RouteSources, config: &ApiConfig) -> ResolvedRoutes {
    let client = client_routes(sources.client, &config.conventions);
    let server = server_routes(sources.server, config);
    tracing::debug!(
        client = client.iter().map(RouteNode::count).sum::<usize>(),
        server = server.iter().map(RouteNode::count).sum::<usize>(),
        "routes resolved"
    );
    ResolvedRoutes { client, server }
}
