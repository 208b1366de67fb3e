use async_trait::async_trait;
use rllm::{ builder::{ LLMBackend, LLMBuilder }, LLMProvider };
use super::super::LlmConfig;
use super::EmbeddingClient;
use crate::error::ProviderError;

pub struct OpenAIEmbeddingClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
}

impl OpenAIEmbeddingClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        dimensions: Option<u32>
    ) -> Result<Self, ProviderError> {
        let model_name = model.unwrap_or_else(|| "text-embedding-3-large".to_string());

        let mut builder = LLMBuilder::new()
            .backend(LLMBackend::OpenAI)
            .api_key(api_key)
            .model(&model_name);

        if let Some(url) = base_url {
            builder = builder.base_url(url);
        }
        if let Some(dims) = dimensions {
            builder = builder.embedding_dimensions(dims);
        }

        let llm = builder
            .build()
            .map_err(|e| ProviderError::Config("openai embeddings", e.to_string()))?;

        Ok(Self { llm })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(||
                ProviderError::Config("openai embeddings", "API key is required".to_string())
            )?;

        Self::new(
            api_key,
            config.embedding_model.clone(),
            config.base_url.clone(),
            config.embedding_dimensions
        )
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut embeddings = self.llm
            .embed(vec![text.to_string()]).await
            .map_err(|e| ProviderError::Other(format!("OpenAI embedding failed: {}", e)))?;
        embeddings
            .pop()
            .ok_or_else(|| ProviderError::Other("OpenAI embedding generation returned no results".to_string()))
    }
}
