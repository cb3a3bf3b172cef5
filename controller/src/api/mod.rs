//! REST APIハンドラー
//!
//! エージェント登録、ステータス照会、接続・切断トリガー

pub mod agents;
pub mod health;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// APIルーターを作成
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/agents",
            post(agents::register_agent).get(agents::list_agents),
        )
        .route(
            "/api/agents/:name",
            get(agents::get_agent).delete(agents::delete_agent),
        )
        .route("/api/agents/:name/log", get(agents::agent_log))
        .route("/api/agents/:name/connect", post(agents::connect_agent))
        .route(
            "/api/agents/:name/disconnect",
            post(agents::disconnect_agent),
        )
        .route("/api/health", get(health::health_check))
        .with_state(state)
}
