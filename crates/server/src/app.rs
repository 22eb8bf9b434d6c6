use std::any::Any;

use axum::{
    body::Body,
    http::{Response, StatusCode},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use crate::{admin, bootstrap::Application, health, webhook};

/// Every HTTP surface of the server on one router.
pub fn router(app: &Application) -> Router {
    let routes = Router::new()
        .merge(health::router(app.db_pool.clone()))
        .merge(webhook::router(app.webhook.clone()))
        .merge(admin::router(app.admin.clone()));

    with_panic_guard(routes).layer(TraceLayer::new_for_http())
}

/// Answers a panicking handler with an empty `500`.
pub fn with_panic_guard(routes: Router) -> Router {
    routes.layer(CatchPanicLayer::custom(empty_internal_error))
}

fn empty_internal_error(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(event_name = "http.handler_panicked", detail, "request handler panicked");

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
