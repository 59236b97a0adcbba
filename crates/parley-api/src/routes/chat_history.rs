use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use parley_persist::{Turn, TurnVersion};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiQuery},
    routes::OkResponse,
    state::AppState,
};

pub const ALLOW: &str = "GET, POST, PATCH, PUT";
pub const REGENERATE_ALLOW: &str = "POST";

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Restrict to one thread; all of the caller's turns otherwise
    pub thread_id: Option<String>,
    /// Defaults to 100, capped at 200; values that are not a positive
    /// integer fall back to the default
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
}

impl HistoryQuery {
    pub fn limit(&self) -> Option<usize> {
        self.limit.as_deref().and_then(|l| l.trim().parse().ok())
    }
}

/// Body of `POST /chat-history`, discriminated by `role`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PostHistoryRequest {
    /// Starts a new turn
    #[serde(rename_all = "camelCase")]
    User {
        content: String,
        thread_id: String,
        #[serde(default)]
        model: Option<String>,
    },
    /// Fills the reply of an existing turn
    #[serde(rename_all = "camelCase")]
    Assistant {
        content: String,
        thread_id: String,
        turn_id: String,
        #[serde(default)]
        model: Option<String>,
    },
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditTurnRequest {
    pub turn_id: String,
    pub thread_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchVersionRequest {
    pub turn_id: String,
    pub thread_id: String,
    pub version: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub turn_id: String,
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReplyAck {
    #[serde(rename = "_id")]
    pub id: String,
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnVersionResponse {
    pub user_content: String,
    pub assistant_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub thread_id: String,
    pub user_content: String,
    pub assistant_content: Option<String>,
    pub versions: Vec<TurnVersionResponse>,
    pub current_version: usize,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TurnVersion> for TurnVersionResponse {
    fn from(version: TurnVersion) -> Self {
        Self {
            user_content: version.user_content,
            assistant_content: version.assistant_content,
            created_at: version.created_at,
        }
    }
}

impl From<Turn> for TurnResponse {
    fn from(turn: Turn) -> Self {
        Self {
            id: turn.id,
            user: turn.user_id,
            thread_id: turn.thread_id,
            user_content: turn.user_content,
            assistant_content: turn.assistant_content,
            versions: turn.versions.into_iter().map(TurnVersionResponse::from).collect(),
            current_version: turn.current_version,
            model: turn.model,
            created_at: turn.created_at,
            updated_at: turn.updated_at,
        }
    }
}

/// Turns in creation order
#[utoipa::path(
    get,
    path = "/chat-history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Turns, oldest first", body = [TurnResponse]),
        (status = 404, description = "Thread not found")
    ),
    tag = "chat-history"
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<Vec<TurnResponse>>> {
    let turns = state
        .store
        .list_turns(user.id(), query.thread_id.as_deref(), query.limit())
        .await?;
    Ok(Json(turns.into_iter().map(TurnResponse::from).collect()))
}

/// Append a user turn, or attach the assistant reply to an existing one
#[utoipa::path(
    post,
    path = "/chat-history",
    request_body = PostHistoryRequest,
    responses(
        (status = 201, description = "User turn created", body = TurnResponse),
        (status = 200, description = "Assistant reply stored", body = ReplyAck),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Thread or turn not found")
    ),
    tag = "chat-history"
)]
pub async fn post_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<PostHistoryRequest>,
) -> ApiResult<Response> {
    match req {
        PostHistoryRequest::User { content, thread_id, model } => {
            let turn = state
                .store
                .append_user_turn(user.id(), &thread_id, &content, model)
                .await?;
            Ok((StatusCode::CREATED, Json(TurnResponse::from(turn))).into_response())
        }
        PostHistoryRequest::Assistant { content, thread_id, turn_id, model } => {
            let turn = state
                .store
                .attach_assistant_reply(user.id(), &thread_id, &turn_id, &content, model)
                .await?;
            Ok(Json(ReplyAck { id: turn.id, ok: true }).into_response())
        }
    }
}

/// Edit the user message of a turn, branching a new version
#[utoipa::path(
    patch,
    path = "/chat-history",
    request_body = EditTurnRequest,
    responses(
        (status = 200, description = "Version appended", body = OkResponse),
        (status = 404, description = "Thread or turn not found")
    ),
    tag = "chat-history"
)]
pub async fn edit_turn(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<EditTurnRequest>,
) -> ApiResult<Json<OkResponse>> {
    state
        .store
        .edit_user_turn(user.id(), &req.thread_id, &req.turn_id, &req.content)
        .await?;
    Ok(Json(OkResponse::new()))
}

/// Make a historical version of a turn current
#[utoipa::path(
    put,
    path = "/chat-history",
    request_body = SwitchVersionRequest,
    responses(
        (status = 200, description = "Version selected", body = OkResponse),
        (status = 400, description = "Version out of range"),
        (status = 404, description = "Thread or turn not found")
    ),
    tag = "chat-history"
)]
pub async fn switch_version(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<SwitchVersionRequest>,
) -> ApiResult<Json<OkResponse>> {
    state
        .store
        .switch_version(user.id(), &req.thread_id, &req.turn_id, req.version)
        .await?;
    Ok(Json(OkResponse::new()))
}

/// Generate the assistant reply for a turn's current version
///
/// Used both to retry a finished turn and to answer a freshly edited one.
#[utoipa::path(
    post,
    path = "/chat-history/regenerate",
    request_body = RegenerateRequest,
    responses(
        (status = 200, description = "Turn with the new reply", body = TurnResponse),
        (status = 404, description = "Thread or turn not found"),
        (status = 500, description = "Completion provider failed")
    ),
    tag = "chat-history"
)]
pub async fn regenerate_turn(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<RegenerateRequest>,
) -> ApiResult<Json<TurnResponse>> {
    let (turn, messages) = state
        .store
        .prompt_history(user.id(), &req.thread_id, &req.turn_id)
        .await?;

    let reply = state.gateway.complete(&messages, &[]).await?;
    if reply.trim().is_empty() {
        return Err(ApiError::Upstream("Completion returned empty content".to_string()));
    }

    let turn = state
        .store
        .attach_assistant_reply(
            user.id(),
            &req.thread_id,
            &turn.id,
            &reply,
            Some(state.gateway.model().to_string()),
        )
        .await?;

    tracing::info!(turn_id = %turn.id, version = turn.current_version, "Turn regenerated");
    Ok(Json(turn.into()))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed(ALLOW)
}

pub async fn regenerate_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed(REGENERATE_ALLOW)
}
