//! App composition end to end through `oneshot`.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use honor_rest::context::CookieOptions;
use honor_rest::service::FieldRule;
use honor_rest::tree::is_ancestor;
use honor_rest::{
    component, group, load, write, ApiConfig, App, AppError, CrudMethod, EndpointConfig,
    HttpMethod, MemoryDriver, ObjectSchema, RouteModule, RouteSources,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// Test helpers

fn wrap(name: &'static str) -> honor_rest::routes::Component {
    component(move |inner| match inner {
        Some(inner) => format!("<{0}>{1}</{0}>", name, inner),
        None => name.to_string(),
    })
}

fn sources() -> RouteSources {
    let users = EndpointConfig::new("users").with_title("Users");
    let posts = EndpointConfig::new("posts");
    let tags = RouteModule::new()
        .crud(CrudMethod::List, load(|_| async { Ok(json!(["list"])) }))
        .crud(CrudMethod::Read, load(|_| async { Ok(json!("read")) }))
        .crud(CrudMethod::Create, write(|ctx| async move { Ok(ctx.body.clone()) }));
    let health = RouteModule::handler(load(|ctx| async move {
        let visits = ctx.cookie.get("visits").and_then(|v| v.as_i64()).unwrap_or(0);
        ctx.cookie
            .set("visits", &json!(visits + 1), &CookieOptions::default());
        Ok(json!({"status": "ok", "visits": visits, "extra": "hidden"}))
    }))
    .on(HttpMethod::Post, write(|_| async { Ok(json!("pong")) }));

    RouteSources::new()
        .module("/src/routes/users/+server.rs", RouteModule::config(users))
        .schema(
            "/src/routes/users/+schema.rs",
            ObjectSchema::new().field("name", FieldRule::string()),
        )
        .doc("/src/routes/users/+server.mdx", wrap("users-doc"))
        .module("/src/routes/users/posts/+server.rs", RouteModule::config(posts))
        .module("/src/routes/tags/+server.rs", tags)
        .module("/src/routes/health/+server.rs", health)
        .page("/src/routes/+page.rs", wrap("home"))
        .layout("/src/routes/+layout.rs", wrap("root"))
        .page("/src/routes/blog/+page.rs", wrap("blog"))
        .layout("/src/routes/blog/+layout.rs", wrap("shell"))
        .page("/src/routes/blog/[slug]/+page.rs", wrap("post"))
}

fn app_with(config: ApiConfig) -> (Router, MemoryDriver) {
    let driver = MemoryDriver::new();
    let app = App::new(config)
        .routes(sources())
        .driver(driver.clone())
        .build()
        .unwrap();
    (app, driver)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let (status, text) = call(app, request).await;
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

async fn get_text(app: &Router, path: &str) -> (StatusCode, String) {
    call(app, Request::builder().uri(path).body(Body::empty()).unwrap()).await
}

// Server routes

#[tokio::test]
async fn config_modules_mount_crud_endpoints() {
    let (app, driver) = app_with(ApiConfig::default());

    let (status, created) = send(&app, Method::POST, "/api/users", Some(json!({"name": "Ada"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, listed) = send(&app, Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["total"], 1);

    let (status, read) = send(&app, Method::GET, &format!("/api/users/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["name"], "Ada");

    let (status, _) = send(&app, Method::PATCH, &format!("/api/users/{}", id), Some(json!({"age": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "sibling schema applies to writes");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(driver.records("users").await.is_empty());
}

#[tokio::test]
async fn over_limit_streamed_body_is_rejected_before_the_driver() {
    let config = ApiConfig {
        body_limit: 16,
        ..ApiConfig::default()
    };
    let (app, driver) = app_with(config);

    let chunk = format!(r#"{{"name":"{}"}}"#, "x".repeat(40));
    let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(chunk)]);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users")
        .header("content-type", "application/json")
        .body(Body::from_stream(stream))
        .unwrap();
    let (status, text) = call(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["errors"][0]["code"], "too-large");
    assert!(driver.records("users").await.is_empty());
}

#[tokio::test]
async fn endpoint_children_nest_under_the_id_path() {
    let (app, _) = app_with(ApiConfig::default());

    let (status, created) =
        send(&app, Method::POST, "/api/users/1/posts", Some(json!({"title": "hi"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, listed) = send(&app, Method::GET, "/api/users/1/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"][0], created);

    let (status, _) = send(&app, Method::GET, "/api/users/posts", None).await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn crud_exports_prefer_list_over_read() {
    let (app, _) = app_with(ApiConfig::default());

    let (status, body) = send(&app, Method::GET, "/api/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["list"]));

    let (status, body) = send(&app, Method::POST, "/api/tags", Some(json!({"name": "rust"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"name": "rust"}));
}

#[tokio::test]
async fn handler_modules_mount_get_and_verb_exports() {
    let (app, _) = app_with(ApiConfig::default());

    let request = Request::builder()
        .uri("/api/health?select=%7B%22status%22%3Atrue%2C%22visits%22%3Atrue%7D")
        .header(header::COOKIE, "visits=4")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("visits=5"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok", "visits": 4}));

    let (status, text) = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "pong");
}

#[tokio::test]
async fn unknown_paths_get_the_error_envelope() {
    let (app, _) = app_with(ApiConfig::default());
    let (status, body) = send(&app, Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["code"], "not-found");
}

// Docs and pages

#[tokio::test]
async fn doc_routes_render_with_the_route_index() {
    let (app, _) = app_with(ApiConfig::default());

    let (status, html) = get_text(&app, "/docs/users").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<title>Users</title>"));
    assert!(html.contains("users-doc"));
    assert!(html.contains("/api/users/:users_id/posts"));
    assert!(!html.contains("/docs/users"), "index only lists API routes");

    let (status, _) = get_text(&app, "/docs/users/:users_id").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_text(&app, "/docs/tags").await;
    assert_eq!(status, StatusCode::NOT_FOUND, "no doc page, no doc route");
}

#[tokio::test]
async fn docs_can_be_disabled() {
    let (app, _) = app_with(ApiConfig::default().with_docs(false));
    let (status, _) = get_text(&app, "/docs/users").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pages_are_wrapped_by_their_layouts() {
    let (app, _) = app_with(ApiConfig::default());

    assert_eq!(get_text(&app, "/").await.1, "<root>home</root>");
    assert_eq!(get_text(&app, "/blog").await.1, "<root><shell>blog</shell></root>");
    assert_eq!(
        get_text(&app, "/blog/hello").await.1,
        "<root><shell>post</shell></root>"
    );
}

// Configuration and grouping

#[test]
fn clashing_docs_and_base_paths_are_rejected() {
    let config = ApiConfig::default().with_docs_path("/api");
    let err = App::new(config).routes(sources()).build().unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn grouped_trees_keep_prefix_invariants() {
    let paths = [
        "/", "/a", "/a/b", "/a/b/c", "/ab", "/a/bc", "/x/y", "/x", "/a/b", "/x/y/z/w",
    ];
    let forest = group(paths.iter().map(|p| (p.to_string(), ())).collect());

    fn check(nodes: &[honor_rest::RouteNode<()>]) {
        for a in nodes {
            for b in nodes {
                if !std::ptr::eq(a, b) {
                    assert!(!is_ancestor(&a.path, &b.path), "{} above sibling {}", a.path, b.path);
                }
            }
            for d in a.flatten().into_iter().skip(1) {
                assert!(is_ancestor(&a.path, &d.path), "{} not below {}", d.path, a.path);
            }
            check(&a.children);
        }
    }
    check(&forest);
    assert_eq!(forest.iter().map(|n| n.count()).sum::<usize>(), paths.len());
}
