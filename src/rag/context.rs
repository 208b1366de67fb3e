use log::{ info, warn };
use std::sync::Arc;

use crate::debug::DebugTrace;
use crate::llm::embedding::EmbeddingClient;
use crate::models::product::{ Product, SearchResult };
use crate::store::VectorSearch;

pub const DEFAULT_TOP_K: usize = 3;

/// Where the prompt context comes from.
pub enum ContextSource<'a> {
    /// Run a similarity search for this query.
    Query(&'a str),
    /// The caller already knows the product; no search happens.
    Product(&'a Product),
}

#[derive(Clone)]
pub struct ContextAssembler {
    embedding_client: Arc<dyn EmbeddingClient>,
    search: Arc<dyn VectorSearch>,
    top_k: usize,
}

/// `Product context: {...}\n`
pub fn product_context(product: &Product) -> String {
    format!("Product context: {}\n", product.to_spaced_json())
}

pub fn format_search_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let blocks = results
        .iter()
        .map(|r| {
            format!(
                "Product: {}\nDescription: {}\nPrice: {}\n",
                r.product.name().unwrap_or("Unknown"),
                r.product.description().unwrap_or("No description available"),
                r.product.display_price()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("\nRelevant products:\n{}", blocks)
}

impl ContextAssembler {
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        search: Arc<dyn VectorSearch>,
        top_k: usize
    ) -> Self {
        Self { embedding_client, search, top_k }
    }

    /// Never fails: retrieval problems are written to the trace and produce an
    /// empty context.
    pub async fn assemble(
        &self,
        source: ContextSource<'_>,
        trace: &mut DebugTrace
    ) -> (String, Vec<SearchResult>) {
        let query = match source {
            ContextSource::Product(product) => {
                let text = product_context(product);
                trace.context_text = Some(text.clone());
                return (text, Vec::new());
            }
            ContextSource::Query(query) => query,
        };

        let embedding = match self.embedding_client.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("[{}] query embedding failed: {}", trace.request_id(), e);
                trace.record_error("context_error_embedding_query", e.to_string());
                return (String::new(), Vec::new());
            }
        };
        trace.query_embedding_size = Some(embedding.len());

        let results = match self.search.similarity_search(&embedding, self.top_k).await {
            Ok(r) => r,
            Err(e) => {
                warn!("[{}] similarity search failed: {}", trace.request_id(), e);
                trace.record_error("context_error_similarity_search", e.to_string());
                return (String::new(), Vec::new());
            }
        };
        trace.similarity_results = Some(results.clone());

        if results.is_empty() {
            info!("[{}] similarity search returned no products", trace.request_id());
            trace.record_error("context_error_no_results", "similarity search returned no products");
            return (String::new(), Vec::new());
        }

        info!("[{}] similarity search returned {} product(s)", trace.request_id(), results.len());
        let text = format_search_results(&results);
        trace.context_text = Some(text.clone());
        (text, results)
    }
}
