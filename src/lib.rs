//! honor-rest: file-based routing and convention-driven CRUD endpoints on axum.
//!
//! Route modules are resolved into nested trees, resource configs become CRUD endpoints, and
//! every generated handler runs the same dispatch pipeline against a pluggable `RestDriver`.

pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod extractors;
pub mod filter;
pub mod handler;
pub mod projection;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod telemetry;
pub mod tree;

pub use config::{validate, ApiConfig, RouteConventions};
pub use context::{Cookie, CookieOptions, HandlerContext, ReadContext, WriteContext};
pub use endpoint::{
    after, before, create_endpoint, middleware, CrudMethod, Endpoint, EndpointConfig,
    EndpointFactory, EndpointHooks, HttpMethod,
};
pub use error::{AppError, BoxError, ConfigError, DriverError};
pub use filter::{apply_filter, Filter};
pub use handler::{load, write, BoxedHandler};
pub use response::{
    bad_request, error, forbidden, json, json_list, not_found, respond, unauthorized, ApiError,
    ListMeta, RestResponse,
};
pub use routes::{component, create_app, import_routes, App, RouteModule, RouteSources};
pub use service::{DriverMethod, FieldRule, MemoryDriver, ObjectSchema, RestDriver, Schema};
pub use state::Remote;
pub use tree::{group, RouteNode};
