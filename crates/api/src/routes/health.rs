//! Liveness endpoint

use axum::Json;
use serde_json::{json, Value};

/// GET /health - liveness probe for operators and load balancers
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
