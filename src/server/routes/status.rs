//! Liveness and queue statistics endpoints

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// GET / - online probe used by monitors. Does not check that
/// conversions actually work.
pub async fn index() -> Json<Value> {
    Json(json!({"status": "online"}))
}

/// GET /stats - running task count and pending jobs in the work queue.
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let tasks = tokio::runtime::Handle::current()
        .metrics()
        .num_alive_tasks();
    Json(json!({
        "goroutines": tasks,
        "pending": state.queue().len(),
    }))
}
