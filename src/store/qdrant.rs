use async_trait::async_trait;
use log::warn;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{ point_id::PointIdOptions, ScoredPoint, SearchPointsBuilder };
use serde_json::{ Map, Value as JsonValue };

use super::VectorSearch;
use crate::error::ProviderError;
use crate::models::product::{ Product, SearchResult };

pub struct QdrantProductSearch {
    client: Qdrant,
    collection_name: String,
}

impl QdrantProductSearch {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection_name: &str
    ) -> Result<Self, ProviderError> {
        let client = Qdrant::from_url(url).api_key(api_key).build()?;
        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
        })
    }

    fn point_to_result(point: ScoredPoint) -> SearchResult {
        let mut map = Map::new();
        for (k, v) in point.payload {
            match serde_json::to_value(v) {
                Ok(val) => {
                    map.insert(k, val);
                }
                Err(err) => warn!("Skipping field '{}' in product payload: {}", k, err),
            }
        }
        if !map.contains_key("id") {
            let id = point.id.and_then(|p| p.point_id_options).map(|opt| match opt {
                PointIdOptions::Num(n) => JsonValue::from(n),
                PointIdOptions::Uuid(s) => JsonValue::String(s),
            });
            if let Some(id) = id {
                map.insert("id".to_string(), id);
            }
        }
        SearchResult { product: Product(map), similarity: Some(point.score) }
    }
}

#[async_trait]
impl VectorSearch for QdrantProductSearch {
    async fn similarity_search(
        &self,
        embedding: &[f32],
        top_k: usize
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let response = self.client.search_points(
            SearchPointsBuilder::new(&self.collection_name, embedding.to_vec(), top_k as u64)
                .with_payload(true)
        ).await?;

        Ok(response.result.into_iter().map(Self::point_to_result).collect())
    }
}
