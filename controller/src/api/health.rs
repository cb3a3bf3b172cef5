//! ヘルスチェックAPIハンドラー

use axum::Json;
use serde_json::{json, Value};

/// GET /api/health - 死活確認
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
