//! Endpoint factory: mounts CRUD handlers for one resource at the conventional paths.
//!
//! | operation | verb   | path          |
//! |-----------|--------|---------------|
//! | list      | GET    | `/`           |
//! | create    | POST   | `/`           |
//! | read      | GET    | `/:{name}_id` |
//! | update    | PATCH  | `/:{name}_id` |
//! | replace   | PUT    | `/:{name}_id` |
//! | delete    | DELETE | `/:{name}_id` |
//!
//! `only` mounts a subset at `/` regardless of verb; `http` mounts raw verbs at `/`.

pub mod config;
pub(crate) mod pipeline;

pub use config::{after, before, middleware, AfterHook, BeforeHook, EndpointConfig, EndpointHooks, Middleware};
pub use pipeline::{ensure_method, validate_response, UNAVAILABLE_MESSAGE};

use crate::context::{ReadContext, WriteContext};
use crate::handler::BoxedHandler;
use crate::routes::RouteTable;
use axum::routing::MethodFilter;
use axum::Router;
use pipeline::Plan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrudMethod {
    List,
    Read,
    Create,
    Update,
    Replace,
    Delete,
}

impl CrudMethod {
    pub const ALL: [CrudMethod; 6] = [
        CrudMethod::List,
        CrudMethod::Read,
        CrudMethod::Create,
        CrudMethod::Update,
        CrudMethod::Replace,
        CrudMethod::Delete,
    ];

    /// Verb used when a route module exports this method directly.
    pub fn http_method(self) -> HttpMethod {
        match self {
            CrudMethod::List | CrudMethod::Read => HttpMethod::Get,
            CrudMethod::Create => HttpMethod::Post,
            CrudMethod::Update => HttpMethod::Patch,
            CrudMethod::Replace => HttpMethod::Put,
            CrudMethod::Delete => HttpMethod::Delete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrudMethod::List => "LIST",
            CrudMethod::Read => "READ",
            CrudMethod::Create => "CREATE",
            CrudMethod::Update => "UPDATE",
            CrudMethod::Replace => "REPLACE",
            CrudMethod::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mounted handler, relative to the endpoint's mount path.
#[derive(Clone, Debug)]
pub struct EndpointRoute {
    pub method: HttpMethod,
    pub path: String,
    pub handler: BoxedHandler,
}

#[derive(Clone)]
pub struct Endpoint {
    config: Arc<EndpointConfig>,
    middleware: Vec<Middleware>,
    routes: Vec<EndpointRoute>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.config.name)
            .field("middleware", &self.middleware.len())
            .field("routes", &self.routes)
            .finish()
    }
}

impl Endpoint {
    pub fn new(config: EndpointConfig) -> Self {
        Endpoint {
            config: Arc::new(config),
            middleware: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Endpoint-wide middleware, run before any per-mount middleware.
    pub fn with_middleware(mut self, hook: Middleware) -> Self {
        self.middleware.push(hook);
        self
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn routes(&self) -> &[EndpointRoute] {
        &self.routes
    }

    /// Relative id route, e.g. `/:user_id`.
    pub fn id_path(&self) -> String {
        self.config.id_path()
    }

    pub fn list(self) -> Self {
        self.list_with(Vec::new())
    }

    pub fn list_with(self, hooks: Vec<Middleware>) -> Self {
        let plan = Plan::list(&self.config.hooks);
        self.mount_read(HttpMethod::Get, "/", hooks, plan)
    }

    pub fn create(self) -> Self {
        self.create_with(Vec::new())
    }

    pub fn create_with(self, hooks: Vec<Middleware>) -> Self {
        let plan = Plan::create(&self.config.hooks);
        self.mount_write(HttpMethod::Post, "/", hooks, plan)
    }

    pub fn read(self) -> Self {
        self.read_with(Vec::new())
    }

    pub fn read_with(self, hooks: Vec<Middleware>) -> Self {
        let plan = Plan::read(&self.config.hooks);
        let path = self.id_path();
        self.mount_read(HttpMethod::Get, &path, hooks, plan)
    }

    pub fn update(self) -> Self {
        self.update_with(Vec::new())
    }

    pub fn update_with(self, hooks: Vec<Middleware>) -> Self {
        let plan = Plan::update(&self.config.hooks);
        let path = self.id_path();
        self.mount_write(HttpMethod::Patch, &path, hooks, plan)
    }

    pub fn replace(self) -> Self {
        self.replace_with(Vec::new())
    }

    pub fn replace_with(self, hooks: Vec<Middleware>) -> Self {
        let plan = Plan::replace(&self.config.hooks);
        let path = self.id_path();
        self.mount_write(HttpMethod::Put, &path, hooks, plan)
    }

    pub fn delete(self) -> Self {
        self.delete_with(Vec::new())
    }

    pub fn delete_with(self, hooks: Vec<Middleware>) -> Self {
        let plan = Plan::delete(&self.config.hooks);
        let path = self.id_path();
        self.mount_read(HttpMethod::Delete, &path, hooks, plan)
    }

    pub fn all(self) -> Self {
        self.all_with(Vec::new())
    }

    /// All six CRUD handlers, each with the same per-mount middleware.
    pub fn all_with(self, hooks: Vec<Middleware>) -> Self {
        self.list_with(hooks.clone())
            .create_with(hooks.clone())
            .read_with(hooks.clone())
            .update_with(hooks.clone())
            .replace_with(hooks.clone())
            .delete_with(hooks)
    }

    pub fn only(self, methods: &[CrudMethod]) -> Self {
        self.only_with(methods, Vec::new())
    }

    /// Selected CRUD handlers, all mounted at `/` (collection-level custom verbs).
    pub fn only_with(mut self, methods: &[CrudMethod], hooks: Vec<Middleware>) -> Self {
        for method in methods {
            let verb = method.http_method();
            let h = &self.config.hooks;
            self = match method {
                CrudMethod::List => {
                    let plan = Plan::list(h);
                    self.mount_read(verb, "/", hooks.clone(), plan)
                }
                CrudMethod::Read => {
                    let plan = Plan::read(h);
                    self.mount_read(verb, "/", hooks.clone(), plan)
                }
                CrudMethod::Create => {
                    let plan = Plan::create(h);
                    self.mount_write(verb, "/", hooks.clone(), plan)
                }
                CrudMethod::Update => {
                    let plan = Plan::update(h);
                    self.mount_write(verb, "/", hooks.clone(), plan)
                }
                CrudMethod::Replace => {
                    let plan = Plan::replace(h);
                    self.mount_write(verb, "/", hooks.clone(), plan)
                }
                CrudMethod::Delete => {
                    let plan = Plan::delete(h);
                    self.mount_read(verb, "/", hooks.clone(), plan)
                }
            };
        }
        self
    }

    pub fn http(self, methods: &[HttpMethod]) -> Self {
        self.http_with(methods, Vec::new())
    }

    /// Raw verbs at `/`, dispatched to the driver's `get`/`post`/`put`/`patch`/`delete`.
    pub fn http_with(mut self, methods: &[HttpMethod], hooks: Vec<Middleware>) -> Self {
        for &method in methods {
            let h = &self.config.hooks;
            self = match method {
                HttpMethod::Get => {
                    let plan = Plan::http_get(h);
                    self.mount_read(method, "/", hooks.clone(), plan)
                }
                HttpMethod::Delete => {
                    let plan = Plan::http_delete(h);
                    self.mount_read(method, "/", hooks.clone(), plan)
                }
                HttpMethod::Post => {
                    let plan = Plan::http_post(h);
                    self.mount_write(method, "/", hooks.clone(), plan)
                }
                HttpMethod::Put => {
                    let plan = Plan::http_put(h);
                    self.mount_write(method, "/", hooks.clone(), plan)
                }
                HttpMethod::Patch => {
                    let plan = Plan::http_patch(h);
                    self.mount_write(method, "/", hooks.clone(), plan)
                }
            };
        }
        self
    }

    /// Standalone router with every mounted route.
    pub fn into_router(self) -> Router {
        let mut table = RouteTable::default();
        for route in self.routes {
            table.insert(route.method, &route.path, route.handler);
        }
        table.into_router()
    }

    fn chain(&self, hooks: Vec<Middleware>) -> Arc<[Middleware]> {
        self.middleware.iter().cloned().chain(hooks).collect()
    }

    fn mount_read(
        self,
        method: HttpMethod,
        path: &str,
        hooks: Vec<Middleware>,
        plan: Plan<ReadContext>,
    ) -> Self {
        let config = self.config.clone();
        let chain = self.chain(hooks);
        let plan = Arc::new(plan);
        let handler = BoxedHandler::new(move |ctx: ReadContext| {
            let (config, chain, plan) = (config.clone(), chain.clone(), plan.clone());
            async move { pipeline::dispatch(ctx, &config, &chain, &plan).await }
        });
        self.mount(method, path, handler)
    }

    fn mount_write(
        self,
        method: HttpMethod,
        path: &str,
        hooks: Vec<Middleware>,
        plan: Plan<WriteContext>,
    ) -> Self {
        let config = self.config.clone();
        let chain = self.chain(hooks);
        let plan = Arc::new(plan);
        let handler = BoxedHandler::new(move |ctx: WriteContext| {
            let (config, chain, plan) = (config.clone(), chain.clone(), plan.clone());
            async move { pipeline::dispatch(ctx, &config, &chain, &plan).await }
        });
        self.mount(method, path, handler)
    }

    fn mount(mut self, method: HttpMethod, path: &str, handler: BoxedHandler) -> Self {
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.path == path)
        {
            tracing::warn!(resource = %self.config.name, %method, path, "route already mounted, keeping the first");
            return self;
        }
        self.routes.push(EndpointRoute {
            method,
            path: path.to_string(),
            handler,
        });
        self
    }
}

/// Builds endpoints that share a middleware stack.
#[derive(Clone, Default)]
pub struct EndpointFactory {
    middleware: Vec<Middleware>,
}

impl EndpointFactory {
    pub fn new(middleware: Vec<Middleware>) -> Self {
        EndpointFactory { middleware }
    }

    pub fn create(&self, config: EndpointConfig) -> Endpoint {
        self.middleware
            .iter()
            .cloned()
            .fold(Endpoint::new(config), Endpoint::with_middleware)
    }
}

pub fn create_endpoint(config: EndpointConfig) -> Endpoint {
    Endpoint::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(endpoint: &Endpoint) -> Vec<(HttpMethod, String)> {
        endpoint
            .routes()
            .iter()
            .map(|r| (r.method, r.path.clone()))
            .collect()
    }

    #[test]
    fn all_mounts_the_convention() {
        let endpoint = Endpoint::new(EndpointConfig::new("user")).all();
        assert_eq!(
            table(&endpoint),
            vec![
                (HttpMethod::Get, "/".to_string()),
                (HttpMethod::Post, "/".to_string()),
                (HttpMethod::Get, "/:user_id".to_string()),
                (HttpMethod::Patch, "/:user_id".to_string()),
                (HttpMethod::Put, "/:user_id".to_string()),
                (HttpMethod::Delete, "/:user_id".to_string()),
            ]
        );
    }

    #[test]
    fn only_mounts_at_collection_root() {
        let endpoint = Endpoint::new(EndpointConfig::new("job"))
            .only(&[CrudMethod::Update, CrudMethod::Delete]);
        assert_eq!(
            table(&endpoint),
            vec![(HttpMethod::Patch, "/".to_string()), (HttpMethod::Delete, "/".to_string())]
        );
    }

    #[test]
    fn duplicate_mount_keeps_first() {
        let endpoint = Endpoint::new(EndpointConfig::new("post"))
            .list()
            .only(&[CrudMethod::List, CrudMethod::Read])
            .http(&[HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(
            table(&endpoint),
            vec![(HttpMethod::Get, "/".to_string()), (HttpMethod::Post, "/".to_string())]
        );
    }

    #[test]
    fn factory_shares_middleware() {
        let noop = middleware(|_, _| Box::pin(async { Ok(None) }));
        let factory = EndpointFactory::new(vec![noop.clone(), noop]);
        let endpoint = factory.create(EndpointConfig::new("tag"));
        assert_eq!(endpoint.middleware.len(), 2);
        assert_eq!(endpoint.config().id_param(), "tag_id");
    }
}
