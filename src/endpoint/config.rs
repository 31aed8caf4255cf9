//! Endpoint configuration: resource name, schema, primary key, lifecycle hooks and driver extras.

use crate::context::{HandlerContext, ReadContext, WriteContext};
use crate::error::BoxError;
use crate::response::RestResponse;
use crate::service::Schema;
use axum::response::Response;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Runs before the backend call; may mutate the context but cannot short-circuit.
pub type BeforeHook<C> =
    Arc<dyn for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync>;

/// Runs after the backend call; may mutate the response in place.
pub type AfterHook<C> = Arc<
    dyn for<'a> Fn(&'a C, &'a mut RestResponse) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync,
>;

/// Per-mount pre-hook. `Some(response)` is returned to the client as-is.
pub type Middleware = Arc<
    dyn for<'a> Fn(
            &'a mut dyn HandlerContext,
            &'a EndpointConfig,
        ) -> BoxFuture<'a, Result<Option<Response>, BoxError>>
        + Send
        + Sync,
>;

pub fn before<C, F>(f: F) -> BeforeHook<C>
where
    F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn after<C, F>(f: F) -> AfterHook<C>
where
    F: for<'a> Fn(&'a C, &'a mut RestResponse) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub fn middleware<F>(f: F) -> Middleware
where
    F: for<'a> Fn(
            &'a mut dyn HandlerContext,
            &'a EndpointConfig,
        ) -> BoxFuture<'a, Result<Option<Response>, BoxError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Hook pairs per verb. Replace shares the update pair; http GET and DELETE share read and delete.
#[derive(Clone, Default)]
pub struct EndpointHooks {
    pub before_list: Option<BeforeHook<ReadContext>>,
    pub after_list: Option<AfterHook<ReadContext>>,
    pub before_read: Option<BeforeHook<ReadContext>>,
    pub after_read: Option<AfterHook<ReadContext>>,
    pub before_create: Option<BeforeHook<WriteContext>>,
    pub after_create: Option<AfterHook<WriteContext>>,
    pub before_update: Option<BeforeHook<WriteContext>>,
    pub after_update: Option<AfterHook<WriteContext>>,
    pub before_delete: Option<BeforeHook<ReadContext>>,
    pub after_delete: Option<AfterHook<ReadContext>>,
    pub before_post: Option<BeforeHook<WriteContext>>,
    pub after_post: Option<AfterHook<WriteContext>>,
    pub before_put: Option<BeforeHook<WriteContext>>,
    pub after_put: Option<AfterHook<WriteContext>>,
    pub before_patch: Option<BeforeHook<WriteContext>>,
    pub after_patch: Option<AfterHook<WriteContext>>,
}

impl fmt::Debug for EndpointHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = [
            ("before_list", self.before_list.is_some()),
            ("after_list", self.after_list.is_some()),
            ("before_read", self.before_read.is_some()),
            ("after_read", self.after_read.is_some()),
            ("before_create", self.before_create.is_some()),
            ("after_create", self.after_create.is_some()),
            ("before_update", self.before_update.is_some()),
            ("after_update", self.after_update.is_some()),
            ("before_delete", self.before_delete.is_some()),
            ("after_delete", self.after_delete.is_some()),
            ("before_post", self.before_post.is_some()),
            ("after_post", self.after_post.is_some()),
            ("before_put", self.before_put.is_some()),
            ("after_put", self.after_put.is_some()),
            ("before_patch", self.before_patch.is_some()),
            ("after_patch", self.after_patch.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
        f.debug_tuple("EndpointHooks").field(&set).finish()
    }
}

#[derive(Clone)]
pub struct EndpointConfig {
    /// Resource name; also names the id path parameter (`:{name}_id`).
    pub name: String,
    pub schema: Option<Arc<dyn Schema>>,
    pub primary_key: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub hooks: EndpointHooks,
    /// Driver-specific settings, e.g. a table name.
    pub extras: Map<String, Value>,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("name", &self.name)
            .field("schema", &self.schema.is_some())
            .field("primary_key", &self.primary_key)
            .field("title", &self.title)
            .field("hooks", &self.hooks)
            .field("extras", &self.extras)
            .finish()
    }
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>) -> Self {
        EndpointConfig {
            name: name.into(),
            schema: None,
            primary_key: None,
            title: None,
            description: None,
            hooks: EndpointHooks::default(),
            extras: Map::new(),
        }
    }

    pub fn with_schema(self, schema: impl Schema + 'static) -> Self {
        self.with_schema_arc(Arc::new(schema))
    }

    pub fn with_schema_arc(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_hooks(mut self, hooks: EndpointHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    /// Record key field; `id` unless configured.
    pub fn key(&self) -> &str {
        self.primary_key.as_deref().unwrap_or("id")
    }

    pub fn id_param(&self) -> String {
        format!("{}_id", self.name)
    }

    pub fn id_path(&self) -> String {
        format!("/:{}_id", self.name)
    }
}
