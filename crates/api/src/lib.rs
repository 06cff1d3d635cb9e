#![forbid(unsafe_code)]

pub mod dto;
pub mod error;
pub mod extract;
mod routes;
pub mod state;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use extract::SESSION_COOKIE;
pub use state::AppState;

/// Full HTTP surface: `/health` plus every `/api` route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::auth::routes())
        .merge(routes::content::routes())
        .merge(routes::progress::routes())
        .merge(routes::assessment::routes())
        .merge(routes::admin::routes())
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
