use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config::StoreBackend;
use crate::state::AppState;

/// GET /health
/// Returns service version plus which optional collaborators are wired in.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let store = match state.config.store {
        StoreBackend::JsonFile { .. } => "json",
        StoreBackend::Postgres { .. } => "postgres",
    };
    let note_refiner = if state.refiner.is_some() {
        "enabled"
    } else {
        "disabled"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "fairprice-api",
        "store": store,
        "noteRefiner": note_refiner
    }))
}
