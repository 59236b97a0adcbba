use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use parley_llm::{Attachment, AttachmentKind, PromptMessage};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
};

pub const ALLOW: &str = "POST";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletionAttachment {
    pub url: String,
    /// `image` attachments are sent to the model; anything else is ignored
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletionRequest {
    pub messages: Vec<CompletionMessage>,
    #[serde(default)]
    pub attachments: Vec<CompletionAttachment>,
}

impl CompletionRequest {
    pub fn into_parts(self) -> (Vec<PromptMessage>, Vec<Attachment>) {
        let messages = self
            .messages
            .into_iter()
            .map(|m| PromptMessage::new(m.role, m.content))
            .collect();

        let attachments = self
            .attachments
            .into_iter()
            .map(|a| Attachment {
                kind: match a.kind.as_deref() {
                    Some("image") => AttachmentKind::Image,
                    _ => AttachmentKind::Document,
                },
                url: a.url,
            })
            .collect();

        (messages, attachments)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    pub message: String,
}

/// Generate a reply for a role-tagged conversation
#[utoipa::path(
    post,
    path = "/openai",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Generated text", body = CompletionResponse),
        (status = 400, description = "Invalid messages"),
        (status = 500, description = "Completion provider failed")
    ),
    tag = "completion"
)]
pub async fn complete(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiJson(req): ApiJson<CompletionRequest>,
) -> ApiResult<Json<CompletionResponse>> {
    let (messages, attachments) = req.into_parts();
    let message = state.gateway.complete(&messages, &attachments).await?;

    Ok(Json(CompletionResponse { message }))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed(ALLOW)
}
