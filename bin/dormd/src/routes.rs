//! Route registration — collects all module routes + system endpoints.

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;

/// Build the complete router with all routes.
pub fn build_router(module_routes: Vec<(String, Router)>) -> Router {
    // System endpoints (public, no state needed).
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    // Module routes are already Router<()> and carry their own prefix
    // (they called .nest() and .with_state() internally).
    for (_name, router) in module_routes {
        app = app.merge(router);
    }

    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "dormd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
