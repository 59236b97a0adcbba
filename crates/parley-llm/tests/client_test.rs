use mockito::Matcher;
use parley_llm::{collect_text, ChatClient, ChatOptions, ChatRequest, Message, OpenAIClient, OpenAIConfig};
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> OpenAIClient {
    OpenAIClient::from_config(OpenAIConfig::new("test-key").with_base_url(server.url())).unwrap()
}

#[tokio::test]
async fn test_chat_parses_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gemini-1.5-pro",
            "stream": false,
            "max_tokens": 64
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "model": "gemini-1.5-pro",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hi!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let request = ChatRequest::new("gemini-1.5-pro", vec![Message::human("user: Hello")])
        .with_options(ChatOptions::new().max_tokens(64));
    let response = client.chat(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content.as_deref(), Some("Hi!"));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.unwrap().total_tokens, 5);
}

#[tokio::test]
async fn test_chat_surfaces_upstream_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("quota exceeded")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .chat(ChatRequest::new("m", vec![Message::human("x")]))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("429"), "{}", message);
    assert!(message.contains("quota exceeded"), "{}", message);
}

#[tokio::test]
async fn test_chat_stream_yields_ordered_chunks() {
    let mut server = mockito::Server::new_async().await;
    let body = [
        r#"data: {"choices":[{"delta":{"role":"assistant","content":"Hel"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
    ]
    .join("\n\n");

    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(format!("{}\n\n", body))
        .create_async()
        .await;

    let client = client_for(&server);
    let stream = client
        .chat_stream(ChatRequest::new("m", vec![Message::human("x")]))
        .await
        .unwrap();

    assert_eq!(collect_text(stream).await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_chat_stream_keeps_unterminated_final_chunk() {
    let mut server = mockito::Server::new_async().await;
    let body = [
        r#"data: {"choices":[{"delta":{"content":"Good"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{"content":"bye"},"finish_reason":"stop"}]}"#,
    ]
    .join("\n\n");

    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(&server);
    let stream = client
        .chat_stream(ChatRequest::new("m", vec![Message::human("x")]))
        .await
        .unwrap();

    assert_eq!(collect_text(stream).await.unwrap(), "Goodbye");
}
