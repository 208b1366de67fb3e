use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, AUTHORIZATION } };
use serde::Serialize;

use super::{ ProductStore, VectorSearch };
use crate::error::ProviderError;
use crate::models::product::{ Product, SearchResult };

const SERVICE: &str = "supabase";

/// PostgREST access to the `products` table and the `match_products` RPC.
pub struct SupabaseClient {
    http: HttpClient,
    rest_url: String,
}

#[derive(Serialize)]
struct MatchProductsParams<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
}

impl SupabaseClient {
    pub fn new(project_url: &str, service_key: &str) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(service_key).map_err(|e|
            ProviderError::Config(SERVICE, format!("Invalid service key: {}", e))
        )?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", service_key)).map_err(|e|
            ProviderError::Config(SERVICE, format!("Invalid service key: {}", e))
        )?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
        })
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::Status { service: SERVICE, status: status.as_u16(), body })
    }
}

#[async_trait]
impl ProductStore for SupabaseClient {
    async fn fetch_product(&self, id: &str) -> Result<Option<Product>, ProviderError> {
        let url = format!("{}/products", self.rest_url);
        let resp = self.http
            .get(&url)
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send().await?;
        let rows: Vec<Product> = Self::check(resp).await?
            .json().await
            .map_err(|e| ProviderError::decode(SERVICE, e))?;
        debug!("products lookup for id={} returned {} row(s)", id, rows.len());
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl VectorSearch for SupabaseClient {
    async fn similarity_search(
        &self,
        embedding: &[f32],
        top_k: usize
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let url = format!("{}/rpc/match_products", self.rest_url);
        let params = MatchProductsParams { query_embedding: embedding, match_count: top_k };
        let resp = self.http.post(&url).json(&params).send().await?;
        let results: Option<Vec<SearchResult>> = Self::check(resp).await?
            .json().await
            .map_err(|e| ProviderError::decode(SERVICE, e))?;
        Ok(results.unwrap_or_default())
    }
}
