//! Example consumer: an in-memory users/posts API with docs and one page.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Then try `curl localhost:3000/api/users` or open `http://localhost:3000/docs/users`.

use honor_rest::endpoint::before;
use honor_rest::service::FieldRule;
use honor_rest::{
    component, load, telemetry, ApiConfig, App, EndpointConfig, EndpointHooks, MemoryDriver,
    ObjectSchema, RouteModule, RouteSources, WriteContext,
};
use serde_json::json;
use tokio::net::TcpListener;

fn user_schema() -> ObjectSchema {
    ObjectSchema::new()
        .field("id", FieldRule::string().optional())
        .field("name", FieldRule::string().min_length(1))
        .field("email", FieldRule::string().format("email").optional())
}

fn sources() -> RouteSources {
    let hooks = EndpointHooks {
        before_create: Some(before::<WriteContext, _>(|ctx| {
            Box::pin(async move {
                if let Some(body) = ctx.body.as_object_mut() {
                    body.entry("role").or_insert(json!("member"));
                }
                Ok(())
            })
        })),
        ..EndpointHooks::default()
    };
    let users = EndpointConfig::new("users")
        .with_title("Users")
        .with_description("People who can sign in.")
        .with_hooks(hooks);
    let posts = EndpointConfig::new("posts").with_extra("table", "posts");

    RouteSources::new()
        .module("/src/routes/users/+server.rs", RouteModule::config(users))
        .schema("/src/routes/users/+schema.rs", user_schema())
        .doc(
            "/src/routes/users/+server.mdx",
            component(|_| "<p>Create, list and edit users.</p>".to_string()),
        )
        .module("/src/routes/users/posts/+server.rs", RouteModule::config(posts))
        .module(
            "/src/routes/health/+server.rs",
            RouteModule::handler(load(|_| async {
                Ok(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
            })),
        )
        .page(
            "/src/routes/+page.rs",
            component(|_| "<h1>honor-rest</h1><p>See /docs/users.</p>".to_string()),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init("honor_rest=trace,example_consumer=info");
    let config = ApiConfig::from_env()?;

    let driver = MemoryDriver::new();
    driver
        .seed("users", vec![json!({"id": "1", "name": "Ada", "role": "admin"})])
        .await;

    let app = App::new(config).routes(sources()).driver(driver).build()?;
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
