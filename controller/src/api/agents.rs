//! エージェントAPIハンドラー
//!
//! ステータスAPIの認可判定は内部のリゾルバと同一で、
//! `absolute_remote_path` は未認可・未設定を区別せずnullになる。

use crate::acl::ANONYMOUS_PRINCIPAL;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use buildgrid_common::{
    error::ControllerError,
    protocol::AgentStatusReport,
    types::AgentSpec,
};
use serde_json::json;
use tracing::{info, warn};

/// リクエスト元プリンシパルを運ぶヘッダー名
pub const PRINCIPAL_HEADER: &str = "x-grid-user";

fn principal_from(headers: &HeaderMap) -> String {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| ANONYMOUS_PRINCIPAL.to_string())
}

/// POST /api/agents - エージェント登録
pub async fn register_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(spec): Json<AgentSpec>,
) -> Result<(StatusCode, Json<AgentStatusReport>), AppError> {
    info!(agent = %spec.name, "Agent registration request");

    let computer = state.registry.register(spec).await?;
    let principal = principal_from(&headers);
    let report = computer.status_report(&principal, state.authorizer.as_ref());
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/agents - エージェント一覧取得
pub async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Vec<AgentStatusReport>> {
    let principal = principal_from(&headers);
    let reports = state
        .registry
        .list()
        .await
        .iter()
        .map(|computer| computer.status_report(&principal, state.authorizer.as_ref()))
        .collect();
    Json(reports)
}

/// GET /api/agents/:name - エージェントステータス取得
pub async fn get_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AgentStatusReport>, AppError> {
    let computer = state
        .registry
        .get(&name)
        .await
        .ok_or(ControllerError::AgentNotFound(name))?;
    let principal = principal_from(&headers);
    Ok(Json(computer.status_report(&principal, state.authorizer.as_ref())))
}

/// GET /api/agents/:name/log - エージェントログ取得
pub async fn agent_log(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<String, AppError> {
    let computer = state
        .registry
        .get(&name)
        .await
        .ok_or(ControllerError::AgentNotFound(name))?;
    Ok(computer.get_log())
}

/// POST /api/agents/:name/connect - 接続開始
///
/// 遷移は専用タスクで実行され、ハンドラーは即座に戻る。
/// 結果はエージェントログとステータスで観測する。
pub async fn connect_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let computer = state
        .registry
        .get(&name)
        .await
        .ok_or(ControllerError::AgentNotFound(name))?;

    let _task = state.launcher.connect_detached(computer);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "connecting" })),
    ))
}

/// POST /api/agents/:name/disconnect - 切断
pub async fn disconnect_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AgentStatusReport>, AppError> {
    let computer = state
        .registry
        .get(&name)
        .await
        .ok_or(ControllerError::AgentNotFound(name))?;

    state
        .launcher
        .disconnect(&computer, "Disconnect requested via API")
        .await?;

    let principal = principal_from(&headers);
    Ok(Json(computer.status_report(&principal, state.authorizer.as_ref())))
}

/// DELETE /api/agents/:name - エージェント削除
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let computer = state
        .registry
        .get(&name)
        .await
        .ok_or_else(|| ControllerError::AgentNotFound(name.clone()))?;

    // リスナーへのオフライン通知を先に済ませてから切り離す
    if let Err(e) = state
        .launcher
        .disconnect(&computer, "Agent removed")
        .await
    {
        warn!(agent = %name, error = %e, "Listener failure during removal disconnect");
    }
    state.registry.remove(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(ControllerError);

impl From<ControllerError> for AppError {
    fn from(err: ControllerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ControllerError::DuplicateAgentName(_) => StatusCode::CONFLICT,
            ControllerError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            ControllerError::Common(_) => StatusCode::BAD_REQUEST,
            ControllerError::LaunchFailure(_) => StatusCode::BAD_GATEWAY,
            ControllerError::ChannelClosed(_) => StatusCode::CONFLICT,
            ControllerError::ListenerFatal { .. } | ControllerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.0.to_string()).into_response()
    }
}
