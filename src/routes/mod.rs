//! Route discovery, route table and app composition.

pub mod app;
pub mod docs;
pub mod resolver;
pub mod table;

pub use app::{create_app, doc_path, App};
pub use docs::{DocPage, DocRenderer, PlainDocRenderer};
pub use resolver::{
    component, import_routes, mount_path, ClientRoute, Component, Discovered, ModuleDefault,
    ResolvedRoutes, RouteModule, RouteSources, ServerRoute,
};
pub use table::RouteTable;
