use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::streaming::collect_text;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatStream};
use crate::types::{Content, ContentPart, Message};

/// Fallback MIME type when the attachment host does not report one
const FALLBACK_IMAGE_MIME: &str = "image/*";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// One role-tagged entry of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
}

/// Join role-tagged history into a single prompt: `role: content` per line
pub fn build_prompt(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stateless proxy in front of the language model
///
/// The history is flattened into one user message; the underlying model is
/// never asked to follow a structured multi-turn protocol. Image attachments
/// are downloaded and inlined as base64 `data:` URLs.
pub struct CompletionGateway {
    client: Arc<dyn ChatClient>,
    http: reqwest::Client,
    model: String,
    options: ChatOptions,
}

impl CompletionGateway {
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
            model: model.into(),
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// HTTP client used to download attachments
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Non-streaming completion
    pub async fn complete(
        &self,
        messages: &[PromptMessage],
        attachments: &[Attachment],
    ) -> Result<String, GatewayError> {
        let request = self.build_request(messages, attachments).await?;

        let response = self
            .client
            .chat(request)
            .await
            .map_err(|e| GatewayError::Upstream(format!("{:#}", e)))?;

        let text = response
            .content
            .ok_or_else(|| GatewayError::Upstream("Completion returned no content".to_string()))?;

        tracing::debug!(
            model = %self.model,
            chars = text.len(),
            finish_reason = ?response.finish_reason,
            "Completion received"
        );

        Ok(text)
    }

    /// Streaming completion; chunks arrive in order
    pub async fn complete_stream(
        &self,
        messages: &[PromptMessage],
        attachments: &[Attachment],
    ) -> Result<ChatStream, GatewayError> {
        let request = self.build_request(messages, attachments).await?;

        self.client
            .chat_stream(request)
            .await
            .map_err(|e| GatewayError::Upstream(format!("{:#}", e)))
    }

    /// Streaming completion drained into a single string
    pub async fn complete_via_stream(
        &self,
        messages: &[PromptMessage],
        attachments: &[Attachment],
    ) -> Result<String, GatewayError> {
        let stream = self.complete_stream(messages, attachments).await?;
        collect_text(stream)
            .await
            .map_err(|e| GatewayError::Upstream(format!("{:#}", e)))
    }

    async fn build_request(
        &self,
        messages: &[PromptMessage],
        attachments: &[Attachment],
    ) -> Result<ChatRequest, GatewayError> {
        if messages.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "messages must be a non-empty list".to_string(),
            ));
        }

        let prompt = build_prompt(messages);

        let mut images = Vec::new();
        for attachment in attachments.iter().filter(|a| a.kind == AttachmentKind::Image) {
            images.push(self.fetch_inline_image(&attachment.url).await?);
        }

        let content = if images.is_empty() {
            Content::text(prompt)
        } else {
            let mut parts = vec![ContentPart::text(prompt)];
            parts.extend(images.into_iter().map(ContentPart::image_url));
            Content::Parts(parts)
        };

        Ok(ChatRequest::new(self.model.clone(), vec![Message::human(content)])
            .with_options(self.options.clone()))
    }

    async fn fetch_inline_image(&self, url: &str) -> Result<String, GatewayError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Failed to fetch attachment {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "Failed to fetch attachment {} ({})",
                url,
                response.status()
            )));
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Upstream(format!("Failed to read attachment {}: {}", url, e)))?;

        Ok(format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_joins_role_tagged_lines() {
        let messages = vec![
            PromptMessage::user("Hello"),
            PromptMessage::assistant("Hi"),
            PromptMessage::user("How are you?"),
        ];
        assert_eq!(build_prompt(&messages), "user: Hello\nassistant: Hi\nuser: How are you?");
    }

    #[test]
    fn test_build_prompt_single_message() {
        assert_eq!(build_prompt(&[PromptMessage::user("x")]), "user: x");
    }

    #[test]
    fn test_attachment_deserializes_type_field() {
        let a: Attachment = serde_json::from_str(r#"{"url":"http://x/y.png","type":"image"}"#).unwrap();
        assert_eq!(a.kind, AttachmentKind::Image);
    }
}
