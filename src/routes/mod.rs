use axum::{routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub mod analysis;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Backend is running. Use /api/v1/data/upload to POST a dataset."
    }))
}

async fn health_check() -> &'static str {
    "OK"
}
