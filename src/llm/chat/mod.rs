pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use serde::{ Deserialize, Serialize };
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::error::ProviderError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::debug;

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    System,
    Human,
    #[serde(rename = "ai")]
    Assistant,
}

impl MessageKind {
    /// Role name used by OpenAI-compatible chat APIs.
    pub fn api_role(&self) -> &'static str {
        match self {
            MessageKind::System => "system",
            MessageKind::Human => "user",
            MessageKind::Assistant => "assistant",
        }
    }
}

/// One entry of an assembled prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { kind: MessageKind::System, content: content.into() }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self { kind: MessageKind::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { kind: MessageKind::Assistant, content: content.into() }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn stream_chat(
        &self,
        messages: &[PromptMessage],
        temperature: f32
    ) -> Result<ChatStream, ProviderError>;

    fn get_model(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> ChatStream
    where
        F: FnOnce(mpsc::Sender<Result<String, ProviderError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ProviderError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// What a provider's line parser made of one line of a streamed body.
#[derive(Debug, PartialEq)]
pub enum LineEvent {
    Token(String),
    Done,
    Skip,
}

/// Splits a byte stream into complete lines, holding partial lines (and
/// partial UTF-8 sequences) until the rest arrives.
#[derive(Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

/// Sends `request`, then feeds each line of the response body through
/// `line_parser` and forwards the tokens.
pub fn http_stream_generate(
    service: &'static str,
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> Result<LineEvent, ProviderError>
) -> ChatStream {
    create_streaming_response(move |tx| async move {
        let resp = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(Err(ProviderError::Transport(e))).await;
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let _ = tx.send(Err(ProviderError::Status { service, status: status.as_u16(), body })).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut buffer = LineBuffer::default();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    debug!("{} raw chunk: {} bytes", service, buf.len());
                    for line in buffer.push(&buf) {
                        match line_parser(&line) {
                            Ok(LineEvent::Token(tok)) => {
                                if tx.send(Ok(tok)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(LineEvent::Done) => {
                                return;
                            }
                            Ok(LineEvent::Skip) => {}
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(ProviderError::Transport(e))).await;
                    return;
                }
            }
        }

        if let Some(line) = buffer.finish() {
            match line_parser(&line) {
                Ok(LineEvent::Token(tok)) => {
                    let _ = tx.send(Ok(tok)).await;
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_holds_partial_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\r\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_rejoins_split_utf8() {
        let mut buf = LineBuffer::default();
        let bytes = "é\n".as_bytes();
        assert!(buf.push(&bytes[..1]).is_empty());
        assert_eq!(buf.push(&bytes[1..]), vec!["é"]);
    }

    #[test]
    fn line_buffer_flushes_trailing_line() {
        let mut buf = LineBuffer::default();
        buf.push(b"{\"done\":true}");
        assert_eq!(buf.finish().as_deref(), Some("{\"done\":true}"));
    }

    #[test]
    fn prompt_messages_map_to_api_roles() {
        assert_eq!(PromptMessage::human("q").kind.api_role(), "user");
        assert_eq!(PromptMessage::assistant("a").kind.api_role(), "assistant");
        assert_eq!(PromptMessage::system("s").kind.api_role(), "system");
    }
}
