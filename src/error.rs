use thiserror::Error;

/// Failure reported by an external collaborator (LLM, embedding, Supabase, Qdrant).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{0} is not configured correctly: {1}")]
    Config(&'static str, String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        ProviderError::Decode {
            service,
            message: err.to_string(),
        }
    }
}

impl From<qdrant_client::QdrantError> for ProviderError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        ProviderError::Other(format!("qdrant: {}", err))
    }
}
