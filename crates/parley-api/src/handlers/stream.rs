use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use parley_llm::StreamEvent;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::completion::CompletionRequest,
    state::AppState,
};

pub const ALLOW: &str = "POST";

/// Stream a completion using Server-Sent Events
///
/// Emits `message` events carrying `{"content"}` chunks in order, then a
/// single `done` event. A provider failure mid-stream ends the stream with
/// an `error` event.
#[utoipa::path(
    post,
    path = "/openai/stream",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Streaming response", content_type = "text/event-stream"),
        (status = 400, description = "Invalid messages"),
        (status = 500, description = "Completion provider failed")
    ),
    tag = "completion"
)]
pub async fn complete_stream(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ApiJson(req): ApiJson<CompletionRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (messages, attachments) = req.into_parts();
    let mut events = state.gateway.complete_stream(&messages, &attachments).await?;

    let sse_stream = async_stream::stream! {
        let mut finish_reason: Option<String> = None;

        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::Message { content }) => {
                    yield Ok::<Event, Infallible>(sse_event("message", serde_json::json!({ "content": content })));
                }
                Ok(StreamEvent::Done { finish_reason: reason }) => {
                    if reason.is_some() {
                        finish_reason = reason;
                    }
                }
                Err(e) => {
                    tracing::warn!("Completion stream failed: {:#}", e);
                    yield Ok::<Event, Infallible>(sse_event("error", serde_json::json!({ "error": format!("{:#}", e) })));
                    return;
                }
            }
        }

        yield Ok::<Event, Infallible>(sse_event("done", serde_json::json!({ "finishReason": finish_reason })));
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn sse_event(name: &str, data: serde_json::Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed(ALLOW)
}
