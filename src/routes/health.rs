use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}
