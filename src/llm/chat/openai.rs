use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ http_stream_generate, ChatClient, ChatStream, LineEvent, PromptMessage };
use crate::error::ProviderError;
use crate::llm::LlmConfig;

const DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    url: String,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
    #[serde(rename = "finish_reason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIError,
}

#[derive(Deserialize)]
struct OpenAIError {
    message: String,
}

/// Parses one server-sent-event line of a chat completions stream.
pub(crate) fn parse_sse_line(line: &str) -> Result<LineEvent, ProviderError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(LineEvent::Skip);
    }
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(LineEvent::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    if let Ok(env) = serde_json::from_str::<OpenAIErrorEnvelope>(data) {
        return Err(ProviderError::Other(format!("OpenAI stream error: {}", env.error.message)));
    }

    let resp = serde_json
        ::from_str::<OpenAIStreamResponse>(data)
        .map_err(|e| ProviderError::decode("openai", e))?;

    let mut text = String::new();
    let mut finished = false;
    for choice in resp.choices {
        if let Some(content) = choice.delta.content {
            text.push_str(&content);
        }
        if choice.finish_reason.is_some() {
            finished = true;
        }
    }

    if !text.is_empty() {
        Ok(LineEvent::Token(text))
    } else if finished {
        Ok(LineEvent::Done)
    } else {
        Ok(LineEvent::Skip)
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, ProviderError> {
        let chat_model = model.unwrap_or_else(|| "gpt-4-turbo-preview".to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_URL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                ProviderError::Config("openai", format!("Invalid API key format: {}", e))
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model: chat_model,
            url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| ProviderError::Config("openai", "API key is required".to_string()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(
        &self,
        messages: &[PromptMessage],
        temperature: f32
    ) -> Result<ChatStream, ProviderError> {
        let req = OpenAIChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage { role: m.kind.api_role(), content: &m.content })
                .collect(),
            temperature,
            stream: true,
        };
        info!("OpenAI stream request: model={}, messages={}", self.model, messages.len());

        let request = self.http.post(self.url.trim_end_matches('/')).json(&req);
        Ok(http_stream_generate("openai", request, parse_sse_line))
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
