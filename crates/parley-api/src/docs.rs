use utoipa::OpenApi;

use crate::handlers::stream;
use crate::routes::{chat_history, completion, health, threads, upload, OkResponse};
use crate::uploads::StoredFile;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        threads::list_threads,
        threads::create_thread,
        threads::rename_thread,
        threads::delete_thread,
        chat_history::list_history,
        chat_history::post_history,
        chat_history::edit_turn,
        chat_history::switch_version,
        chat_history::regenerate_turn,
        completion::complete,
        stream::complete_stream,
        upload::upload,
    ),
    components(schemas(
        OkResponse,
        health::HealthResponse,
        threads::CreateThreadRequest,
        threads::RenameThreadRequest,
        threads::DeleteThreadRequest,
        threads::ThreadResponse,
        chat_history::PostHistoryRequest,
        chat_history::EditTurnRequest,
        chat_history::SwitchVersionRequest,
        chat_history::RegenerateRequest,
        chat_history::ReplyAck,
        chat_history::TurnResponse,
        chat_history::TurnVersionResponse,
        completion::CompletionMessage,
        completion::CompletionAttachment,
        completion::CompletionRequest,
        completion::CompletionResponse,
        upload::UploadRequest,
        upload::UploadResponse,
        StoredFile,
    )),
    tags(
        (name = "health"),
        (name = "threads", description = "Conversation threads"),
        (name = "chat-history", description = "Versioned turns"),
        (name = "completion", description = "Language model proxy"),
        (name = "upload", description = "File hosting proxy"),
    )
)]
pub struct ApiDoc;
