use axum::{
    Json, Router,
    http::{HeaderValue, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::{auth::auth_middleware, handlers, openapi::ApiDoc};
use crate::AppState;

/// Public routes (no auth required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/openapi.json", get(openapi_json))
}

/// Authenticated routes; the caller is resolved before the handler runs
fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/receivers/test", post(handlers::test_receiver))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn common_layers(router: Router, max_body_bytes: usize) -> Router {
    router
        .layer(middleware::from_fn(super::metrics::http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(super::request_id::request_id))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.settings.http.max_body_bytes;
    let router = public_routes()
        .merge(api_routes(state.clone()))
        .with_state(state);

    common_layers(router, max_body_bytes)
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
