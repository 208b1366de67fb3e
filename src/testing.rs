//! In-memory providers with canned answers, used by the test suites.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Mutex;

use crate::error::ProviderError;
use crate::llm::chat::{ ChatClient, ChatStream, PromptMessage };
use crate::llm::embedding::EmbeddingClient;
use crate::models::product::{ Product, SearchResult };
use crate::store::{ ProductStore, VectorSearch };

pub struct StaticEmbedding {
    result: Result<Vec<f32>, String>,
    calls: AtomicUsize,
}

impl StaticEmbedding {
    pub fn ok(vector: Vec<f32>) -> Self {
        Self { result: Ok(vector), calls: AtomicUsize::new(0) }
    }

    pub fn failing(message: &str) -> Self {
        Self { result: Err(message.to_string()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for StaticEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(ProviderError::Other)
    }
}

pub struct StaticSearch {
    result: Result<Vec<SearchResult>, String>,
    calls: AtomicUsize,
    last_top_k: AtomicUsize,
}

impl StaticSearch {
    pub fn ok(results: Vec<SearchResult>) -> Self {
        Self { result: Ok(results), calls: AtomicUsize::new(0), last_top_k: AtomicUsize::new(0) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_top_k: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_top_k(&self) -> usize {
        self.last_top_k.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorSearch for StaticSearch {
    async fn similarity_search(
        &self,
        _embedding: &[f32],
        top_k: usize
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_top_k.store(top_k, Ordering::SeqCst);
        match &self.result {
            Ok(results) => Ok(results.iter().take(top_k).cloned().collect()),
            Err(message) => Err(ProviderError::Other(message.clone())),
        }
    }
}

pub struct StaticProducts {
    result: Result<Option<Product>, String>,
    calls: AtomicUsize,
}

impl StaticProducts {
    pub fn found(product: Product) -> Self {
        Self { result: Ok(Some(product)), calls: AtomicUsize::new(0) }
    }

    pub fn missing() -> Self {
        Self { result: Ok(None), calls: AtomicUsize::new(0) }
    }

    pub fn failing(message: &str) -> Self {
        Self { result: Err(message.to_string()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductStore for StaticProducts {
    async fn fetch_product(&self, _id: &str) -> Result<Option<Product>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(ProviderError::Other)
    }
}

/// Replays a fixed list of chunks; an `Err` entry fails the stream at that point.
pub struct ScriptedChat {
    chunks: Vec<Result<String, String>>,
    refuse: Option<String>,
    last_prompt: Mutex<Option<Vec<PromptMessage>>>,
    last_temperature: Mutex<Option<f32>>,
}

impl ScriptedChat {
    pub fn new(chunks: Vec<Result<&str, &str>>) -> Self {
        Self {
            chunks: chunks
                .into_iter()
                .map(|c| c.map(str::to_string).map_err(str::to_string))
                .collect(),
            refuse: None,
            last_prompt: Mutex::new(None),
            last_temperature: Mutex::new(None),
        }
    }

    pub fn replying(chunks: &[&str]) -> Self {
        Self::new(chunks.iter().map(|c| Ok(*c)).collect())
    }

    /// Fails before any chunk is produced.
    pub fn refusing(message: &str) -> Self {
        let mut chat = Self::new(Vec::new());
        chat.refuse = Some(message.to_string());
        chat
    }

    pub fn last_prompt(&self) -> Option<Vec<PromptMessage>> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }

    pub fn last_temperature(&self) -> Option<f32> {
        self.last_temperature.lock().ok().and_then(|t| *t)
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn stream_chat(
        &self,
        messages: &[PromptMessage],
        temperature: f32
    ) -> Result<ChatStream, ProviderError> {
        if let Ok(mut p) = self.last_prompt.lock() {
            *p = Some(messages.to_vec());
        }
        if let Ok(mut t) = self.last_temperature.lock() {
            *t = Some(temperature);
        }
        if let Some(message) = &self.refuse {
            return Err(ProviderError::Other(message.clone()));
        }
        let items: Vec<Result<String, ProviderError>> = self.chunks
            .iter()
            .cloned()
            .map(|c| c.map_err(ProviderError::Other))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }
}
