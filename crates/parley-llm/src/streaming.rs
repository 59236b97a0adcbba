use anyhow::Result;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::traits::ChatStream;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Message {
        content: String,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }

    fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Message {
                        content: content.clone(),
                    });
                }
            }

            if let Some(finish_reason) = &choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }

        events
    }
}

/// Incremental decoder for `text/event-stream` bodies
///
/// Bytes go in as they arrive from the network; complete `data:` lines come
/// out as events. Partial lines stay buffered until the next push.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: VecDeque<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(8192),
            finished: false,
        }
    }

    /// True once the `[DONE]` sentinel has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent>> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.buffer.extend(bytes);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

            let line = match std::str::from_utf8(&line_bytes) {
                Ok(line) => line.trim(),
                Err(e) => {
                    out.push(Err(anyhow::anyhow!("Invalid UTF-8 in stream: {}", e)));
                    continue;
                }
            };

            let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
                continue;
            };

            if data == "[DONE]" {
                out.push(Ok(StreamEvent::Done { finish_reason: None }));
                self.finished = true;
                self.buffer.clear();
                break;
            }

            match serde_json::from_str::<ChatStreamChunk>(data) {
                Ok(chunk) => out.extend(chunk.to_stream_events().into_iter().map(Ok)),
                Err(e) => out.push(Err(anyhow::anyhow!("Failed to parse chat chunk: {}", e))),
            }
        }

        out
    }

    /// Flush a final line left without a trailing newline once the body ends
    pub fn finish(&mut self) -> Vec<Result<StreamEvent>> {
        if self.finished || self.buffer.is_empty() {
            self.finished = true;
            return Vec::new();
        }
        let out = self.push(b"\n");
        self.finished = true;
        out
    }
}

pub fn parse_chat_sse_stream(response: reqwest::Response) -> ChatStream {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut decoder = SseDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield event;
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => yield Err(anyhow::anyhow!("Stream error: {}", e)),
            }
        }

        for event in decoder.finish() {
            yield event;
        }
    })
}

/// Drain a completion stream into the full generated text
pub async fn collect_text<S>(stream: S) -> Result<String>
where
    S: Stream<Item = Result<StreamEvent>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut text = String::new();

    while let Some(event) = stream.next().await {
        if let StreamEvent::Message { content } = event? {
            text.push_str(&content);
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {{\"id\":\"c1\",\"model\":\"m\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{}\"}},\"finish_reason\":null}}]}}\n\n",
            content
        )
    }

    #[test]
    fn test_decoder_emits_message_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(chunk("Hel").as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Message { content: "Hel".to_string() }
        );
    }

    #[test]
    fn test_decoder_buffers_partial_lines() {
        let mut decoder = SseDecoder::new();
        let line = chunk("lo");
        let (head, tail) = line.split_at(20);

        assert!(decoder.push(head.as_bytes()).is_empty());
        let events = decoder.push(tail.as_bytes());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_decoder_stops_at_done_marker() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}data: [DONE]\n\n{}", chunk("a"), chunk("ignored"));
        let events = decoder.push(body.as_bytes());

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1].as_ref().unwrap(), StreamEvent::Done { finish_reason: None }));
        assert!(decoder.is_finished());
        assert!(decoder.push(chunk("late").as_bytes()).is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_last_line() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}{}", chunk("Hel"), chunk("lo").trim_end());

        assert_eq!(decoder.push(body.as_bytes()).len(), 1);
        let tail = decoder.finish();
        assert_eq!(tail.len(), 1);
        assert_eq!(
            tail[0].as_ref().unwrap(),
            &StreamEvent::Message { content: "lo".to_string() }
        );
        assert!(decoder.is_finished());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_finish_after_done_marker_is_empty() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: [DONE]\n");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_decoder_reports_finish_reason() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n";
        let events = decoder.push(line.as_bytes());
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Done { finish_reason: Some("stop".to_string()) }
        );
    }

    #[test]
    fn test_decoder_surfaces_malformed_chunks() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {not json}\n");
        assert!(events[0].is_err());
    }

    #[tokio::test]
    async fn test_collect_text_concatenates_in_order() {
        let events = vec![
            Ok(StreamEvent::Message { content: "Hi".to_string() }),
            Ok(StreamEvent::Message { content: " there".to_string() }),
            Ok(StreamEvent::Done { finish_reason: None }),
        ];
        let text = collect_text(futures::stream::iter(events)).await.unwrap();
        assert_eq!(text, "Hi there");
    }

    #[tokio::test]
    async fn test_collect_text_propagates_errors() {
        let events = vec![
            Ok(StreamEvent::Message { content: "Hi".to_string() }),
            Err(anyhow::anyhow!("boom")),
        ];
        assert!(collect_text(futures::stream::iter(events)).await.is_err());
    }
}
