//! Dispatch pipeline shared by every generated handler.
//!
//! Order: middleware, before-hook, capability check, request validation, backend call,
//! after-hook, response validation, respond. Errors and panics from the hook and backend steps
//! become the uniform 500 envelope; nothing escapes to the transport.

use crate::context::{HandlerContext, ReadContext, WriteContext};
use crate::endpoint::config::{AfterHook, BeforeHook, EndpointConfig, EndpointHooks, Middleware};
use crate::response::{bad_request, error, internal, respond, ApiError, RestResponse};
use crate::service::{validate_listing, DriverMethod, DriverResult, RestDriver};
use crate::state::Remote;
use axum::http::StatusCode;
use axum::response::Response;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;

pub const UNAVAILABLE_MESSAGE: &str =
    "Remote service not available. Have you set up the remote middleware?";

pub(crate) type Invoke<C> =
    for<'a> fn(&'a C, &'a dyn RestDriver, &'a EndpointConfig) -> BoxFuture<'a, DriverResult>;

/// What one generated handler does: the driver method, its hook pair and how to call it.
pub(crate) struct Plan<C> {
    pub method: DriverMethod,
    pub before: Option<BeforeHook<C>>,
    pub after: Option<AfterHook<C>>,
    pub invoke: Invoke<C>,
    pub validates_body: bool,
}

impl Plan<ReadContext> {
    pub fn list(hooks: &EndpointHooks) -> Self {
        Self::read_side(DriverMethod::GetAll, &hooks.before_list, &hooks.after_list, |ctx, d, c| {
            d.get_all(ctx, c)
        })
    }

    pub fn read(hooks: &EndpointHooks) -> Self {
        Self::read_side(DriverMethod::GetOne, &hooks.before_read, &hooks.after_read, |ctx, d, c| {
            d.get_one(ctx, c, id_of(ctx, c))
        })
    }

    pub fn delete(hooks: &EndpointHooks) -> Self {
        Self::read_side(
            DriverMethod::DeleteOne,
            &hooks.before_delete,
            &hooks.after_delete,
            |ctx, d, c| d.delete_one(ctx, c, id_of(ctx, c)),
        )
    }

    pub fn http_get(hooks: &EndpointHooks) -> Self {
        Self::read_side(DriverMethod::Get, &hooks.before_read, &hooks.after_read, |ctx, d, c| {
            d.get(ctx, c)
        })
    }

    pub fn http_delete(hooks: &EndpointHooks) -> Self {
        Self::read_side(DriverMethod::Delete, &hooks.before_delete, &hooks.after_delete, |ctx, d, c| {
            d.delete(ctx, c)
        })
    }

    fn read_side(
        method: DriverMethod,
        before: &Option<BeforeHook<ReadContext>>,
        after: &Option<AfterHook<ReadContext>>,
        invoke: Invoke<ReadContext>,
    ) -> Self {
        Plan {
            method,
            before: before.clone(),
            after: after.clone(),
            invoke,
            validates_body: false,
        }
    }
}

impl Plan<WriteContext> {
    pub fn create(hooks: &EndpointHooks) -> Self {
        Self::write_side(DriverMethod::Create, &hooks.before_create, &hooks.after_create, |ctx, d, c| {
            d.create(ctx, c, &ctx.body)
        })
    }

    pub fn update(hooks: &EndpointHooks) -> Self {
        Self::write_side(DriverMethod::Update, &hooks.before_update, &hooks.after_update, |ctx, d, c| {
            d.update(ctx, c, id_of(ctx, c), &ctx.body)
        })
    }

    pub fn replace(hooks: &EndpointHooks) -> Self {
        Self::write_side(DriverMethod::Replace, &hooks.before_update, &hooks.after_update, |ctx, d, c| {
            d.replace(ctx, c, id_of(ctx, c), &ctx.body)
        })
    }

    pub fn http_post(hooks: &EndpointHooks) -> Self {
        Self::write_side(DriverMethod::Post, &hooks.before_post, &hooks.after_post, |ctx, d, c| {
            d.post(ctx, c)
        })
    }

    pub fn http_put(hooks: &EndpointHooks) -> Self {
        Self::write_side(DriverMethod::Put, &hooks.before_put, &hooks.after_put, |ctx, d, c| {
            d.put(ctx, c)
        })
    }

    pub fn http_patch(hooks: &EndpointHooks) -> Self {
        Self::write_side(DriverMethod::Patch, &hooks.before_patch, &hooks.after_patch, |ctx, d, c| {
            d.patch(ctx, c)
        })
    }

    fn write_side(
        method: DriverMethod,
        before: &Option<BeforeHook<WriteContext>>,
        after: &Option<AfterHook<WriteContext>>,
        invoke: Invoke<WriteContext>,
    ) -> Self {
        Plan {
            method,
            before: before.clone(),
            after: after.clone(),
            invoke,
            validates_body: true,
        }
    }
}

/// The id path parameter, `""` when the route has none (e.g. under `only`).
fn id_of<'a>(ctx: &'a ReadContext, config: &EndpointConfig) -> &'a str {
    ctx.param(&config.id_param()).unwrap_or("")
}

pub(crate) async fn dispatch<C>(
    mut ctx: C,
    config: &EndpointConfig,
    middleware: &[Middleware],
    plan: &Plan<C>,
) -> Response
where
    C: HandlerContext + 'static,
{
    tracing::debug!(
        resource = %config.name,
        method = plan.method.name(),
        url = %ctx.read().url,
        "dispatch"
    );

    for hook in middleware {
        match AssertUnwindSafe(hook(&mut ctx, config)).catch_unwind().await {
            Ok(Ok(None)) => {}
            Ok(Ok(Some(mut early))) => {
                ctx.read().cookie.apply(&mut early);
                return early;
            }
            Ok(Err(err)) => return finish(&ctx, caught(err)),
            Err(panic) => return finish(&ctx, caught(panic_message(panic.as_ref()))),
        }
    }

    let response = match AssertUnwindSafe(run(&mut ctx, config, plan))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(panic) => caught(panic_message(panic.as_ref())),
    };
    finish(&ctx, response)
}

async fn run<C: HandlerContext>(ctx: &mut C, config: &EndpointConfig, plan: &Plan<C>) -> RestResponse {
    if let Some(before) = &plan.before {
        if let Err(err) = before(ctx).await {
            return caught(err);
        }
    }

    let remote = match ensure_method(ctx.read().remote.as_ref(), plan.method) {
        Ok(remote) => remote.clone(),
        Err(rejected) => return rejected,
    };

    if plan.validates_body {
        if let (Some(schema), Some(body)) = (&config.schema, ctx.body()) {
            if let Err(errors) = schema.validate(body) {
                tracing::debug!(resource = %config.name, issues = errors.len(), "request validation failed");
                let mut rejected = bad_request(errors);
                rejected.status_text = Some("Validation error".into());
                return rejected;
            }
        }
    }

    let mut response = match (plan.invoke)(&*ctx, remote.driver(), config).await {
        Ok(response) => response,
        Err(err) => return caught(err),
    };

    if let Some(after) = &plan.after {
        if let Err(err) = after(&*ctx, &mut response).await {
            return caught(err);
        }
    }

    validate_response(config, response)
}

/// Capability check: a bound backend that supports `method`.
pub fn ensure_method(remote: Option<&Remote>, method: DriverMethod) -> Result<&Remote, RestResponse> {
    let Some(remote) = remote else {
        return Err(error(
            vec![ApiError::new("unavailable", "remote", UNAVAILABLE_MESSAGE)],
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
    };
    if !remote.driver().supports(method) {
        let name = method.name();
        return Err(error(
            vec![ApiError::new(
                "not-allowed",
                format!("method:{}", name),
                format!("{} method not allowed", name),
            )],
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
    }
    Ok(remote)
}

/// Check an `ok` backend response with a body against the schema. On failure the response is replaced by a
/// 400 "Invalid response", even though the backend call itself already took effect.
pub fn validate_response(config: &EndpointConfig, response: RestResponse) -> RestResponse {
    let Some(schema) = &config.schema else {
        return response;
    };
    if !response.ok || response.body.is_null() {
        return response;
    }
    let outcome = if response.multiple {
        validate_listing(schema.as_ref(), &response.body)
    } else {
        schema.validate(&response.body)
    };
    match outcome {
        Ok(()) => response,
        Err(errors) => {
            tracing::warn!(resource = %config.name, issues = errors.len(), "response validation failed");
            RestResponse {
                ok: false,
                status: StatusCode::BAD_REQUEST,
                body: serde_json::json!({
                    "errors": errors,
                    "message": "Response validation failed",
                    "status": 400,
                }),
                multiple: false,
                status_text: Some("Invalid response".into()),
                headers: Default::default(),
            }
        }
    }
}

fn finish<C: HandlerContext>(ctx: &C, response: RestResponse) -> Response {
    let mut http = respond(response);
    ctx.read().cookie.apply(&mut http);
    http
}

pub(crate) fn caught(err: impl Display) -> RestResponse {
    tracing::error!(error = %err, "handler failed");
    internal(err.to_string())
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Internal server error".into()
    }
}
