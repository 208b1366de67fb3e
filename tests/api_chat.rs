use axum::body::Body;
use axum::http::{ Request, StatusCode };
use axum::Router;
use catalog_chat::chain::{ ChatChain, STREAM_ERROR_SENTINEL };
use catalog_chat::config::prompt::PromptConfig;
use catalog_chat::debug::ConfigInfo;
use catalog_chat::models::product::{ Product, SearchResult };
use catalog_chat::rag::context::ContextAssembler;
use catalog_chat::server::{ router, AppState };
use catalog_chat::testing::{ ScriptedChat, StaticEmbedding, StaticProducts, StaticSearch };
use http_body_util::BodyExt;
use serde_json::{ json, Value };
use std::sync::Arc;
use tower::ServiceExt;

struct App {
    router: Router,
    chat: Arc<ScriptedChat>,
    search: Arc<StaticSearch>,
    products: Arc<StaticProducts>,
}

fn config() -> ConfigInfo {
    ConfigInfo {
        openai_model: "gpt-4-turbo-preview".into(),
        openai_temperature: 0.7,
        embedding_model: "text-embedding-3-large".into(),
        embedding_dimensions: 3072,
        vector_type: "supabase".into(),
        vector_index: Some("products".into()),
        supabase_url: Some("http://localhost:54321".into()),
    }
}

fn app(chat: ScriptedChat, search: StaticSearch, products: StaticProducts) -> App {
    let chat = Arc::new(chat);
    let search = Arc::new(search);
    let products = Arc::new(products);
    let context = ContextAssembler::new(
        Arc::new(StaticEmbedding::ok(vec![0.25; 8])),
        search.clone(),
        3
    );
    let chain = ChatChain::new(
        chat.clone(),
        context,
        Arc::new(PromptConfig::default()),
        config()
    );
    let router = router(AppState { chain, products: products.clone() });
    App { router, chat, search, products }
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// JSON payloads of every `data:` line in an SSE body.
fn sse_events(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

fn boot() -> SearchResult {
    SearchResult {
        product: Product::from(json!({"id": 7, "name": "Boot", "description": "Leather boot", "price": 120})),
        similarity: Some(0.91),
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app(ScriptedChat::replying(&[]), StaticSearch::ok(vec![]), StaticProducts::missing());

    let response = app.router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let v: Value = serde_json::from_str(&body_text(response.into_body()).await).unwrap();
    assert_eq!(v, json!({"status": "ok"}));
}

#[tokio::test]
async fn chat_streams_content_with_debug() {
    let app = app(
        ScriptedChat::replying(&["Boots ", "", "are $120.00."]),
        StaticSearch::ok(vec![boot()]),
        StaticProducts::missing()
    );

    let response = app.router
        .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "boots?"}]}))).await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"].to_str().unwrap().starts_with("text/event-stream")
    );
    let events = sse_events(&body_text(response.into_body()).await);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["content"], "Boots ");
    assert_eq!(events[1]["content"], "are $120.00.");
    let debug = &events[1]["debug"];
    assert_eq!(debug["execution_step"], "generating_response");
    assert_eq!(debug["config"]["openai_model"], "gpt-4-turbo-preview");
    assert_eq!(debug["similarity_results"][0]["name"], "Boot");
    assert_eq!(debug["intermediate_values"]["last_message"], "boots?");
    assert!(debug["errors"].as_object().unwrap().is_empty());
    assert_eq!(app.search.calls(), 1);
    assert_eq!(app.products.calls(), 0);
}

#[tokio::test]
async fn product_id_supplies_context_without_search() {
    let app = app(
        ScriptedChat::replying(&["It costs $19.50."]),
        StaticSearch::ok(vec![boot()]),
        StaticProducts::found(Product::from(json!({"id": 42, "name": "Widget", "price": 19.5})))
    );

    let response = app.router
        .oneshot(
            chat_request(
                json!({
                "messages": [{"role": "user", "content": "What's the price of SKU 42?"}],
                "product_id": "42"
            })
            )
        ).await
        .unwrap();
    let events = sse_events(&body_text(response.into_body()).await);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["content"], "It costs $19.50.");
    assert_eq!(events[0]["debug"]["product_context"]["name"], "Widget");
    assert_eq!(events[0]["debug"]["intermediate_values"]["product_id"], "42");
    assert_eq!(app.search.calls(), 0);
    let system = &app.chat.last_prompt().unwrap()[0].content;
    assert!(
        system.contains("Product context: {\"id\": 42, \"name\": \"Widget\", \"price\": 19.5}\n")
    );
}

#[tokio::test]
async fn product_fetch_failure_still_streams() {
    let app = app(
        ScriptedChat::replying(&["Sorry, I could not find that product."]),
        StaticSearch::ok(vec![]),
        StaticProducts::failing("connection refused")
    );

    let response = app.router
        .oneshot(
            chat_request(
                json!({
                "messages": [{"role": "user", "content": "tell me about 99"}],
                "product_id": "99"
            })
            )
        ).await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let events = sse_events(&body_text(response.into_body()).await);
    assert_eq!(events.len(), 1);
    let errors = events[0]["debug"]["errors"].as_object().unwrap();
    assert!(errors["product_fetch_error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(app.products.calls(), 1);
}

#[tokio::test]
async fn missing_product_is_recorded() {
    let app = app(ScriptedChat::replying(&["ok"]), StaticSearch::ok(vec![]), StaticProducts::missing());

    let response = app.router
        .oneshot(
            chat_request(json!({"messages": [{"role": "user", "content": "q"}], "product_id": "5"}))
        ).await
        .unwrap();
    let events = sse_events(&body_text(response.into_body()).await);

    assert_eq!(events[0]["debug"]["errors"]["product_fetch_error"], "product 5 not found");
}

#[tokio::test]
async fn stream_failure_ends_with_error_event() {
    let app = app(
        ScriptedChat::new(vec![Ok("Partial"), Err("upstream reset")]),
        StaticSearch::ok(vec![boot()]),
        StaticProducts::missing()
    );

    let response = app.router
        .oneshot(chat_request(json!({"messages": [{"role": "user", "content": "boots?"}]}))).await
        .unwrap();
    let events = sse_events(&body_text(response.into_body()).await);

    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["content"], "Partial");
    assert_eq!(events[1]["content"], STREAM_ERROR_SENTINEL);
    assert!(events[2]["error"].as_str().unwrap().contains("upstream reset"));
    assert_eq!(events[2]["debug"]["execution_step"], "generating_response_error");
    assert!(events[2]["debug"]["errors"]["stream_error_generating_response"].is_string());
}

#[tokio::test]
async fn malformed_history_yields_sentinel_and_error() {
    let app = app(ScriptedChat::replying(&["unused"]), StaticSearch::ok(vec![boot()]), StaticProducts::missing());

    let response = app.router
        .oneshot(
            chat_request(
                json!({"messages": [
                {"role": "assistant", "content": " "},
                {"role": "user", "content": "boots?"}
            ]})
            )
        ).await
        .unwrap();
    let events = sse_events(&body_text(response.into_body()).await);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["content"], STREAM_ERROR_SENTINEL);
    assert!(events[1]["debug"]["errors"]["format_chat_history_error"].is_string());
    assert!(events[1]["debug"]["errors"]["stream_error_formatting_history"].is_string());
    assert!(app.chat.last_prompt().is_none());
}

#[tokio::test]
async fn empty_conversation_streams_sentinel_and_error() {
    let app = app(ScriptedChat::replying(&["unused"]), StaticSearch::ok(vec![]), StaticProducts::missing());

    let response = app.router.oneshot(chat_request(json!({"messages": []}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let events = sse_events(&body_text(response.into_body()).await);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["content"], STREAM_ERROR_SENTINEL);
    assert_eq!(events[1]["error"], "conversation has no messages");
    assert_eq!(events[1]["debug"]["execution_step"], "stream_started_error");
    assert!(events[1]["debug"]["errors"]["stream_error_stream_started"].is_string());
    assert!(app.chat.last_prompt().is_none());
}

#[tokio::test]
async fn malformed_body_is_a_server_error_with_debug() {
    let app = app(ScriptedChat::replying(&[]), StaticSearch::ok(vec![]), StaticProducts::missing());

    let response = app.router.oneshot(chat_request(json!({"messages": "nope"}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let v: Value = serde_json::from_str(&body_text(response.into_body()).await).unwrap();
    assert!(v["error"].as_str().unwrap().starts_with("Invalid chat request"));
    assert_eq!(v["debug"]["execution_step"], "initializing_error");
    assert_eq!(v["debug"]["intermediate_values"]["raw_request"], json!({"messages": "nope"}));
    assert!(v["debug"]["request_id"].is_string());
}

#[tokio::test]
async fn non_json_body_is_a_server_error() {
    let app = app(ScriptedChat::replying(&[]), StaticSearch::ok(vec![]), StaticProducts::missing());
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let v: Value = serde_json::from_str(&body_text(response.into_body()).await).unwrap();
    assert!(v["debug"]["errors"]["request_error"].is_string());
}

#[tokio::test]
async fn trace_keeps_the_request_as_sent() {
    let app = app(ScriptedChat::replying(&["ok"]), StaticSearch::ok(vec![]), StaticProducts::missing());
    let body = json!({"messages": [
        {"role": "system", "content": "be brief"},
        {"role": "user", "content": "boots?"}
    ]});

    let response = app.router.oneshot(chat_request(body.clone())).await.unwrap();
    let events = sse_events(&body_text(response.into_body()).await);

    let values = &events[0]["debug"]["intermediate_values"];
    assert_eq!(values["raw_request"], body);
    assert_eq!(values["raw_messages"][0]["role"], "system");
    assert_eq!(values["formatted_messages"][0], json!({"type": "ai", "content": "be brief"}));
}
