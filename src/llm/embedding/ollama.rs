use async_trait::async_trait;
use super::EmbeddingClient;
use super::super::LlmConfig;
use crate::error::ProviderError;
use rllm::{ builder::{ LLMBackend, LLMBuilder }, LLMProvider };

pub struct OllamaEmbeddingClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
}

impl OllamaEmbeddingClient {
    pub fn new(base_url: Option<String>, model: Option<String>) -> Result<Self, ProviderError> {
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".to_string());
        let embed_model = model.unwrap_or_else(|| "nomic-embed-text".to_string());

        let builder = LLMBuilder::new()
            .backend(LLMBackend::Ollama)
            .base_url(url)
            .model(embed_model)
            .stream(false);

        let llm_provider = builder
            .build()
            .map_err(|e| ProviderError::Config("ollama embeddings", e.to_string()))?;

        Ok(Self {
            llm: llm_provider,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        Self::new(config.base_url.clone(), config.embedding_model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut embeddings = self.llm
            .embed(vec![text.to_string()]).await
            .map_err(|e| ProviderError::Other(format!("Ollama embedding failed: {}", e)))?;
        embeddings
            .pop()
            .ok_or_else(|| ProviderError::Other("Ollama embedding generation returned no results".to_string()))
    }
}
