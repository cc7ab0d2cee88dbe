//! Health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let indices = state.engine.list_indices().await.ok();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "graphloom",
        "dbType": state.config.db_kind,
        "indices": indices.as_ref().map(|i| i.len()).unwrap_or(0),
    }))
}
