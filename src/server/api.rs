use crate::chain::ChatChain;
use crate::debug::{ DebugTrace, Step };
use crate::models::chat::ChatRequest;
use crate::rag::context::ContextSource;
use crate::store::ProductStore;

use axum::{
    extract::{ rejection::JsonRejection, State },
    http::StatusCode,
    response::{ sse::{ Event, KeepAlive, Sse }, IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use futures::{ Stream, StreamExt };
use log::{ info, warn, error };
use serde::Serialize;
use serde_json::{ json, Value };
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{ Any, CorsLayer };

#[derive(Clone)]
pub struct AppState {
    pub chain: ChatChain,
    pub products: Arc<dyn ProductStore>,
}

#[derive(Serialize)]
struct ChunkPayload<'a> {
    content: &'a str,
    debug: &'a DebugTrace,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: String,
    debug: &'a DebugTrace,
}

/// Failure returned before any event is streamed. Always answered with `500`
/// and an `{error, debug}` body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    message: String,
    debug: Box<DebugTrace>,
}

impl ApiError {
    fn new(message: impl Into<String>, mut debug: DebugTrace) -> Self {
        let message = message.into();
        debug.record_error("request_error", message.clone());
        debug.fail();
        Self { message, debug: Box::new(debug) }
    }

    pub fn debug(&self) -> &DebugTrace {
        &self.debug
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorPayload { error: self.message, debug: &self.debug };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn event_for<T: Serialize>(payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(data) => Event::default().data(data),
        Err(e) => {
            error!("Failed to serialize event payload: {}", e);
            Event::default().data(json!({ "error": e.to_string() }).to_string())
        }
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut trace = state.chain.begin_trace();

    let raw_request = match payload {
        Ok(Json(value)) => value,
        Err(rejection) => {
            warn!("[{}] rejected chat request body: {}", trace.request_id(), rejection);
            return Err(ApiError::new(rejection.body_text(), trace));
        }
    };
    trace.intermediate_values.raw_messages = raw_request.get("messages").cloned();
    trace.intermediate_values.raw_request = Some(raw_request.clone());

    let request: ChatRequest = match serde_json::from_value(raw_request) {
        Ok(r) => r,
        Err(e) => {
            warn!("[{}] chat request has an invalid shape: {}", trace.request_id(), e);
            return Err(ApiError::new(format!("Invalid chat request: {}", e), trace));
        }
    };
    trace.intermediate_values.product_id = request.product_id.clone();
    info!(
        "[{}] chat request with {} message(s), product_id={:?}",
        trace.request_id(),
        request.messages.len(),
        request.product_id
    );

    let mut context_override = None;
    if let Some(product_id) = request.product_id.as_deref().filter(|id| !id.is_empty()) {
        trace.advance(Step::FetchingProduct);
        match state.products.fetch_product(product_id).await {
            Ok(Some(product)) => {
                let record = serde_json::to_value(&product).ok();
                trace.intermediate_values.product_fetch_result = record.clone();
                trace.product_context = record;
                let (text, _) = state.chain
                    .context()
                    .assemble(ContextSource::Product(&product), &mut trace).await;
                context_override = Some(text);
            }
            Ok(None) => {
                warn!("[{}] product {} not found", trace.request_id(), product_id);
                trace.record_error("product_fetch_error", format!("product {} not found", product_id));
            }
            Err(e) => {
                warn!("[{}] product {} fetch failed: {}", trace.request_id(), product_id, e);
                trace.record_error("product_fetch_error", e.to_string());
            }
        }
    }

    let mut chunks = state.chain.produce_with_trace(request.messages, context_override, trace.clone());

    let stream =
        async_stream::stream! {
        let mut last_trace = trace;
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    if !chunk.content.is_empty() {
                        yield Ok(event_for(&ChunkPayload { content: &chunk.content, debug: &chunk.debug }));
                    }
                    last_trace = chunk.debug;
                }
                Err(e) => {
                    error!("[{}] chat stream failed: {}", last_trace.request_id(), e);
                    yield Ok(event_for(&ErrorPayload { error: e.to_string(), debug: &last_trace }));
                    return;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
