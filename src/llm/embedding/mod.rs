pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use super::{ LlmConfig, LlmType };
use self::ollama::OllamaEmbeddingClient;
use self::openai::OpenAIEmbeddingClient;
use crate::error::ProviderError;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn EmbeddingClient>, ProviderError> {
    let client: Arc<dyn EmbeddingClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIEmbeddingClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
