use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};

// GET /health - Liveness check
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().timestamp(),
    }))
}
