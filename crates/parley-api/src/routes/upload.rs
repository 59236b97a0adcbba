use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
    uploads::{StoredFile, UploadError},
};

pub const ALLOW: &str = "POST";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_url: String,
    /// Echoed back; defaults to `document`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub file: StoredFile,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Copy a remote file into the configured object storage
#[utoipa::path(
    post,
    path = "/upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "fileUrl missing"),
        (status = 500, description = "Storage not configured or provider failed")
    ),
    tag = "upload"
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    if req.file_url.trim().is_empty() {
        return Err(ApiError::InvalidArgument("fileUrl is required".to_string()));
    }

    let storage = state.uploads.as_ref().ok_or(UploadError::NotConfigured)?;
    let folder = format!("{}/{}", state.config.upload.folder, user.id());
    let file = storage.store_remote(&req.file_url, &folder).await?;

    Ok(Json(UploadResponse {
        file,
        kind: req.kind.unwrap_or_else(|| "document".to_string()),
    }))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed(ALLOW)
}
