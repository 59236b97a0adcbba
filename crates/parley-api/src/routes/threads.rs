use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use parley_persist::Thread;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::OkResponse,
    state::AppState,
};

pub const ALLOW: &str = "GET, POST, PATCH, DELETE";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameThreadRequest {
    pub thread_id: String,
    pub title: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteThreadRequest {
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Thread> for ThreadResponse {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            user: thread.user_id,
            title: thread.title,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

/// List the caller's threads, most recently active first
#[utoipa::path(
    get,
    path = "/threads",
    responses(
        (status = 200, description = "Threads", body = [ThreadResponse]),
        (status = 401, description = "Unauthorized")
    ),
    tag = "threads"
)]
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ThreadResponse>>> {
    let threads = state.store.list_threads(user.id()).await?;
    Ok(Json(threads.into_iter().map(ThreadResponse::from).collect()))
}

/// Create a new thread
#[utoipa::path(
    post,
    path = "/threads",
    request_body = CreateThreadRequest,
    responses(
        (status = 201, description = "Thread created", body = ThreadResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "threads"
)]
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Option<ApiJson<CreateThreadRequest>>,
) -> ApiResult<(StatusCode, Json<ThreadResponse>)> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let thread = state
        .store
        .create_thread(user.id(), req.title.as_deref())
        .await?;

    tracing::info!(thread_id = %thread.id, "Thread created");
    Ok((StatusCode::CREATED, Json(thread.into())))
}

/// Rename a thread
#[utoipa::path(
    patch,
    path = "/threads",
    request_body = RenameThreadRequest,
    responses(
        (status = 200, description = "Thread renamed", body = OkResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads"
)]
pub async fn rename_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<RenameThreadRequest>,
) -> ApiResult<Json<OkResponse>> {
    state
        .store
        .rename_thread(user.id(), &req.thread_id, &req.title)
        .await?;
    Ok(Json(OkResponse::new()))
}

/// Delete a thread together with its chat history
#[utoipa::path(
    delete,
    path = "/threads",
    request_body = DeleteThreadRequest,
    responses(
        (status = 200, description = "Thread deleted", body = OkResponse),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads"
)]
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<DeleteThreadRequest>,
) -> ApiResult<Json<OkResponse>> {
    let removed = state.store.delete_thread(user.id(), &req.thread_id).await?;

    tracing::info!(thread_id = %req.thread_id, turns = removed, "Thread deleted");
    Ok(Json(OkResponse::new()))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed(ALLOW)
}
