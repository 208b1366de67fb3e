pub mod qdrant;
pub mod supabase;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::ProviderError;
use crate::models::product::{ Product, SearchResult };
use self::qdrant::QdrantProductSearch;
use self::supabase::SupabaseClient;

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// `Ok(None)` when no row has this id.
    async fn fetch_product(&self, id: &str) -> Result<Option<Product>, ProviderError>;
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Most similar products first.
    async fn similarity_search(
        &self,
        embedding: &[f32],
        top_k: usize
    ) -> Result<Vec<SearchResult>, ProviderError>;
}

/// Connections built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductStore>,
    pub search: Arc<dyn VectorSearch>,
}

pub fn initialize_stores(args: &Args) -> Result<Stores, ProviderError> {
    let supabase = Arc::new(SupabaseClient::new(&args.supabase_url, &args.supabase_key)?);
    info!("Product store: supabase at {}", args.supabase_url);

    let search: Arc<dyn VectorSearch> = match args.vector_type.to_lowercase().as_str() {
        "supabase" => {
            info!("Vector search: supabase rpc match_products");
            supabase.clone()
        }
        "qdrant" => {
            info!("Vector search: qdrant collection '{}' at {}", args.index_name, args.qdrant_url);
            Arc::new(
                QdrantProductSearch::new(
                    &args.qdrant_url,
                    args.qdrant_api_key.clone(),
                    &args.index_name
                )?
            )
        }
        other => {
            return Err(
                ProviderError::Config("vector search", format!("Unsupported vector type: {}", other))
            );
        }
    };

    Ok(Stores { products: supabase, search })
}
