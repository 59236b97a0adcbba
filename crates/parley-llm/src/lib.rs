pub mod types;
pub mod traits;
pub mod streaming;
pub mod config;
pub mod openai;
pub mod gateway;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, ChatStream, TokenUsage};
pub use streaming::{collect_text, SseDecoder, StreamEvent};
pub use config::OpenAIConfig;
pub use openai::OpenAIClient;
pub use gateway::{build_prompt, Attachment, AttachmentKind, CompletionGateway, GatewayError, PromptMessage};
pub use types::{Content, ContentPart, ImageUrl, Message};
