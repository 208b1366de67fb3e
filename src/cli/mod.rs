use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4-turbo-preview")]
    pub chat_model: String,

    /// Sampling temperature passed to the chat model
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    // --- Embedding LLM Provider Args ---
    /// Type of LLM provider for text embedding (openai, ollama)
    #[arg(long, env = "EMBEDDING_LLM_TYPE", default_value = "openai")]
    pub embedding_llm_type: String,

    /// Base URL for the Embedding LLM provider API
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    pub embedding_base_url: Option<String>,

    /// API Key for the Embedding LLM provider. Defaults to the chat key when empty.
    #[arg(long, env = "EMBEDDING_API_KEY", default_value = "")]
    pub embedding_api_key: String,

    /// Model name for text embedding
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-large")]
    pub embedding_model: String,

    /// Embedding vector dimension size
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "3072")]
    pub dimension: u32,

    // --- Vector Search / Product Store Args ---
    /// Vector search backend (supabase, qdrant)
    #[arg(short = 't', long, env = "VECTOR_TYPE", default_value = "supabase")]
    pub vector_type: String,

    /// Supabase project URL hosting the products table and match_products RPC
    #[arg(long, env = "SUPABASE_PROJECT_URL", default_value = "")]
    pub supabase_url: String,

    /// Supabase service role key
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", default_value = "")]
    pub supabase_key: String,

    /// Vector index / collection name searched for similar products
    #[arg(long, env = "VECTOR_INDEX_NAME", default_value = "products")]
    pub index_name: String,

    /// Qdrant URL, used when --vector-type=qdrant
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    pub qdrant_url: String,

    /// Optional API Key for the Qdrant instance.
    #[arg(long, env = "QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// Number of similar products pulled into the prompt context.
    #[arg(long, env = "SIMILARITY_TOP_K", default_value = "3")]
    pub top_k: usize,

    // --- General App Args ---
    /// Optional path to a JSON prompt file overriding the built-in system template.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,
}
