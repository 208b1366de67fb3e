use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use log::info;

use super::{ http_stream_generate, ChatClient, ChatStream, LineEvent, PromptMessage };
use crate::error::ProviderError;
use crate::llm::{ LlmConfig, LlmType };

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    content: String,
}

/// Ollama streams newline-delimited JSON objects.
pub(crate) fn parse_ndjson_line(line: &str) -> Result<LineEvent, ProviderError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }
    let resp = serde_json
        ::from_str::<StreamResponse>(line)
        .map_err(|e| ProviderError::decode("ollama", e))?;
    if let Some(err) = resp.error {
        return Err(ProviderError::Other(format!("Ollama stream error: {}", err)));
    }
    match resp.message {
        Some(m) if !m.content.is_empty() => Ok(LineEvent::Token(m.content)),
        _ if resp.done => Ok(LineEvent::Done),
        _ => Ok(LineEvent::Skip),
    }
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        if config.llm_type != LlmType::Ollama {
            return Err(ProviderError::Config("ollama", "config is not an Ollama config".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn stream_chat(
        &self,
        messages: &[PromptMessage],
        temperature: f32
    ) -> Result<ChatStream, ProviderError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: &self.completion_model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage { role: m.kind.api_role(), content: &m.content })
                .collect(),
            stream: true,
            options: ChatOptions { temperature },
        };
        info!("Ollama stream request: model={}, messages={}", self.completion_model, messages.len());

        let request = self.http.post(&url).json(&req);
        Ok(http_stream_generate("ollama", request, parse_ndjson_line))
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }
}
