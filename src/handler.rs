//! Type-erased handlers plus `load` / `write` wrappers for handlers outside the CRUD convention.

use crate::context::{HandlerContext, ReadContext, WriteContext};
use crate::endpoint::pipeline::{caught, panic_message};
use crate::error::BoxError;
use crate::projection;
use crate::response::respond;
use axum::extract::Request;
use axum::handler::Handler;
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Json;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Any axum handler, boxed so route modules can be stored in maps.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>);

impl BoxedHandler {
    pub fn new<H, T>(handler: H) -> Self
    where
        H: Handler<T, ()> + Sync,
        T: 'static,
    {
        BoxedHandler(Arc::new(move |req| handler.clone().call(req, ()).boxed()))
    }

    pub fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.0)(req)
    }

    pub fn into_method_router(self, filter: MethodFilter) -> MethodRouter {
        on(filter, move |req: Request| self.call(req))
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedHandler")
    }
}

pub type HandlerResult = Result<Value, BoxError>;

/// Wrap a read handler. The result is projected by `select`; a string result is sent as text.
pub fn load<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(ReadContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    BoxedHandler::new(move |ctx: ReadContext| {
        let f = f.clone();
        async move { handle(ctx, f).await }
    })
}

/// Wrap a write handler; the context carries the parsed body.
pub fn write<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(WriteContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    BoxedHandler::new(move |ctx: WriteContext| {
        let f = f.clone();
        async move { handle(ctx, f).await }
    })
}

async fn handle<C, F, Fut>(ctx: C, f: F) -> Response
where
    C: HandlerContext,
    F: Fn(C) -> Fut,
    Fut: Future<Output = HandlerResult>,
{
    let cookie = ctx.read().cookie.clone();
    let select = ctx.read().select.clone();
    let mut response = match AssertUnwindSafe(f(ctx)).catch_unwind().await {
        Ok(Ok(Value::String(text))) => text.into_response(),
        Ok(Ok(value)) => match &select {
            Some(fields) => Json(projection::select(&value, fields)).into_response(),
            None => Json(value).into_response(),
        },
        Ok(Err(err)) => respond(caught(err)),
        Err(panic) => respond(caught(panic_message(panic.as_ref()))),
    };
    cookie.apply(&mut response);
    response
}
