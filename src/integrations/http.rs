//! HTTP 接入层（axum）
//!
//! 路由：
//! - `POST /agent/turn`：跑一个回合（新用户消息和/或外部动作结果）
//! - `GET /agent/sessions/:id`：读取会话检查点
//! - `DELETE /agent/sessions/:id`：清空会话
//! - `GET /health`
//!
//! 错误映射：StateConflict → 409，ModelAccess → 502，请求不合法 → 400，其余 → 500。

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, TurnController, TurnPhase, TurnRequest};
use crate::llm::ToolSpec;
use crate::memory::{Checkpoint, Message, ToolCall};

pub struct HttpState {
    pub controller: TurnController,
}

#[derive(Debug, Deserialize)]
pub struct ToolResultBody {
    pub tool_call_id: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TurnBody {
    /// 缺省时生成新会话 ID
    pub session_id: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub tool_results: Vec<ToolResultBody>,
    pub language: Option<String>,
    #[serde(default)]
    pub actions: Vec<ToolSpec>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub phase: TurnPhase,
    pub pending_actions: Vec<ToolCall>,
    pub reasoning_steps: usize,
    pub dispatch_steps: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: String,
    pub cleared: bool,
}

type ApiError = (StatusCode, String);

pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/agent/turn", post(api_turn))
        .route(
            "/agent/sessions/:id",
            get(api_session_get).delete(api_session_reset),
        )
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

fn error_response(e: AgentError) -> ApiError {
    let status = match &e {
        AgentError::StateConflict(_) => StatusCode::CONFLICT,
        AgentError::ModelAccess(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "agent request failed");
    }
    (status, e.to_string())
}

async fn api_turn(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnResponse>, ApiError> {
    let message = body
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    if message.is_none() && body.tool_results.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "message or tool_results is required".to_string(),
        ));
    }

    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut request = TurnRequest::new(session_id).with_actions(body.actions);
    request.language = body.language;
    for result in body.tool_results {
        request = request.with_tool_result(result.tool_call_id, result.content);
    }
    if let Some(text) = message {
        request = request.with_message(Message::user(text));
    }

    let outcome = state
        .controller
        .run_turn(request, CancellationToken::new())
        .await
        .map_err(error_response)?;

    Ok(Json(TurnResponse {
        session_id: outcome.session_id,
        messages: outcome.messages,
        phase: outcome.phase,
        pending_actions: outcome.pending_actions,
        reasoning_steps: outcome.reasoning_steps,
        dispatch_steps: outcome.dispatch_steps,
    }))
}

async fn api_session_get(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> Result<Json<Checkpoint>, ApiError> {
    match state.controller.store().load(&id).await.map_err(error_response)? {
        Some(checkpoint) => Ok(Json(checkpoint)),
        None => Err((StatusCode::NOT_FOUND, format!("session '{id}' not found"))),
    }
}

async fn api_session_reset(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let cleared = state
        .controller
        .reset_session(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(ResetResponse {
        session_id: id,
        cleared,
    }))
}
