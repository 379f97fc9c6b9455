//! Route registration — module routers + system endpoints.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;

use workbridge_account::token::TokenService;

use crate::auth_middleware;

/// Build the complete router with all routes.
pub fn build_router(tokens: Arc<TokenService>, module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    // Mount each module's routes under /{module_name}. Module routers
    // are already Router<()> (they called .with_state() internally).
    for (name, router) in module_routes {
        app = app.nest(&format!("/{name}"), router);
    }

    // Bearer auth on everything except the public paths.
    app.layer(middleware::from_fn_with_state(
        tokens,
        auth_middleware::auth_middleware,
    ))
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "workbridged",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
