//! Integration tests for the concierge API.
//!
//! Drives the router with `oneshot` and the WebSocket connection loop over
//! an in-memory frame stream. Each test builds its own in-memory state over a small catalog
//! indexed with the feature-hashing embedder.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use concierge_api::handlers::{ClearResponse, HealthResponse, ServiceInfo, StatsResponse};
use concierge_api::state::AppState;
use concierge_api::ws::{serve_connection, CLEARED_MESSAGE, WELCOME_MESSAGE};
use concierge_api::create_router;
use concierge_catalog::{CatalogStore, HashingEmbedding, VectorCatalog};
use concierge_chat::verify::UNVERIFIED_NOTE;
use concierge_chat::{ComposerSettings, ConversationHub, LlmClient, LlmError, ResponseComposer};
use concierge_core::config::ServerConfig;
use concierge_core::CatalogItem;
use concierge_memory::{InMemoryProfileStore, PreferenceExtractor, SessionMemory};

// =============================================================================
// Helpers
// =============================================================================

/// Recommends the top grounded record verbatim plus one invented item, and
/// answers small talk with a fixed line.
struct CatalogEchoLlm;

#[async_trait]
impl LlmClient for CatalogEchoLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let Some(start) = prompt.find("VERIFIED EXPERIENCE 1 (Catalog ID: ") else {
            return Ok("Hello from the concierge!".to_string());
        };
        let block = &prompt[start..];
        let id = block
            .split("Catalog ID: ")
            .nth(1)
            .and_then(|s| s.split(')').next())
            .unwrap_or_default();
        let field = |name: &str| {
            block
                .lines()
                .find_map(|line| line.strip_prefix(name))
                .unwrap_or_default()
                .to_string()
        };

        Ok(serde_json::json!({
            "conversational_intro": "Good news!",
            "experiences": [
                {"id": id, "title": field("Title: "), "budget": field("Budget: ")},
                {"id": "404", "title": "Invented Safari", "budget": "₹1"}
            ],
            "conversational_closing": "Interested?"
        })
        .to_string())
    }

    fn model(&self) -> &str {
        "echo"
    }
}

fn items() -> Vec<CatalogItem> {
    let item = |id: &str, title: &str, category: &str, location: &str, price: u64, description: &str| {
        CatalogItem {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            location: location.to_string(),
            price,
        }
    };
    vec![
        item("1", "Mangrove Kayaking", "Adventure", "Goa", 2500, "Paddle through mangroves at sunrise with a guide."),
        item("2", "Backwater Houseboat", "Relaxation", "Kerala", 8000, "Drift along palm-lined backwaters overnight."),
        item("3", "Desert Camping", "Nature", "Rajasthan", 4500, "Camp under the stars among the Thar dunes."),
    ]
}

async fn make_state() -> AppState {
    let catalog: Arc<dyn CatalogStore> = Arc::new(
        VectorCatalog::build(items(), Box::new(HashingEmbedding::new()))
            .await
            .unwrap(),
    );
    let memory = Arc::new(SessionMemory::new(Arc::new(InMemoryProfileStore::new()), 50));
    let composer = ResponseComposer::new(
        catalog.clone(),
        Arc::new(CatalogEchoLlm),
        memory.clone(),
        PreferenceExtractor::with_locations(catalog.locations()),
        ComposerSettings::default(),
    );
    let hub = Arc::new(ConversationHub::new(memory, composer));
    AppState::new(hub, catalog)
}

async fn make_app_with(server: ServerConfig) -> (axum::Router, AppState) {
    let state = make_state().await;
    (create_router(state.clone(), &server), state)
}

async fn make_app() -> (axum::Router, AppState) {
    make_app_with(ServerConfig::default()).await
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

/// Run one connection over the given inbound frames and return every
/// outbound frame as JSON.
async fn converse(state: &AppState, client_id: &str, inbound: Vec<Message>) -> Vec<Value> {
    let stream = futures::stream::iter(inbound.into_iter().map(Ok::<_, axum::Error>));
    let mut sent: Vec<Message> = Vec::new();
    serve_connection(&mut sent, stream, &state.hub, client_id).await;

    sent.into_iter()
        .map(|msg| match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected outbound message: {:?}", other),
        })
        .collect()
}

fn text(raw: &str) -> Message {
    Message::Text(raw.into())
}

async fn converse_text(state: &AppState, client_id: &str, inbound: &[&str]) -> Vec<Value> {
    converse(state, client_id, inbound.iter().map(|raw| text(raw)).collect()).await
}

// =============================================================================
// REST
// =============================================================================

#[tokio::test]
async fn test_root_reports_service_info() {
    let (app, _) = make_app().await;
    let resp = app.oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let info: ServiceInfo = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(info.status, "running");
    assert_eq!(info.embedding_model, "feature-hashing");
    assert!(!info.version.is_empty());
}

#[tokio::test]
async fn test_health() {
    let (app, _) = make_app().await;
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.catalog_size, 3);
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_stats_for_unknown_client_is_empty() {
    let (app, _) = make_app().await;
    let resp = app.oneshot(get("/api/stats/nobody")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stats: StatsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(stats.client_id, "nobody");
    assert_eq!(stats.stats.total_messages, 0);
    assert_eq!(stats.stats.previously_discussed, 0);
}

#[tokio::test]
async fn test_stats_reflect_chat_history() {
    let (app, state) = make_app().await;
    converse_text(&state, "alice", &[r#"{"type":"chat","message":"Hi there"}"#]).await;

    let resp = app.oneshot(get("/api/stats/alice")).await.unwrap();
    let stats: StatsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(stats.stats.total_messages, 2);
}

#[tokio::test]
async fn test_clear_memory_over_rest() {
    let (app, state) = make_app().await;
    converse_text(&state, "bob", &[r#"{"message":"Hello"}"#]).await;

    let resp = app.clone().oneshot(post("/api/clear_memory/bob")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared: ClearResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(cleared.client_id, "bob");
    assert_eq!(cleared.message, "Memory cleared successfully");

    let resp = app.oneshot(get("/api/stats/bob")).await.unwrap();
    let stats: StatsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(stats.stats.total_messages, 0);
}

#[tokio::test]
async fn test_clear_memory_requires_post() {
    let (app, _) = make_app().await;
    let resp = app.oneshot(get("/api/clear_memory/bob")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_overlong_client_id_is_rejected() {
    let (app, _) = make_app().await;
    let uri = format!("/api/stats/{}", "x".repeat(200));
    let resp = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("maximum length"));
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let (app, _) = make_app().await;
    let resp = app.oneshot(get("/ws/chat/carol")).await.unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_only() {
    let server = ServerConfig {
        rate_limit_per_sec: 0,
        ..ServerConfig::default()
    };
    let (app, _) = make_app_with(server).await;

    let resp = app.clone().oneshot(get("/api/stats/dave")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["error"], "too_many_requests");

    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_allows_burst_then_rejects() {
    let server = ServerConfig {
        rate_limit_per_sec: 2,
        ..ServerConfig::default()
    };
    let (app, _) = make_app_with(server).await;

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let resp = app.clone().oneshot(get("/api/stats/erin")).await.unwrap();
        statuses.push(resp.status());
    }
    assert_eq!(statuses[0], StatusCode::OK);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_cors_open_by_default() {
    let (app, _) = make_app().await;
    let req = Request::get("/health")
        .header("origin", "http://anywhere.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_restricted_to_configured_origins() {
    let server = ServerConfig {
        allowed_origins: vec!["http://shop.example".to_string()],
        ..ServerConfig::default()
    };
    let (app, _) = make_app_with(server).await;

    let allowed = Request::get("/health")
        .header("origin", "http://shop.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://shop.example"
    );

    let other = Request::get("/health")
        .header("origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(other).await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

// =============================================================================
// WebSocket connections
// =============================================================================

#[tokio::test]
async fn test_connection_welcomes_and_ends_session() {
    let state = make_state().await;
    let frames = converse_text(&state, "jane", &[]).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "system");
    assert_eq!(frames[0]["client_id"], "jane");
    assert_eq!(frames[0]["message"], WELCOME_MESSAGE);

    assert_eq!(state.hub.active_sessions(), 0);
    assert_eq!(state.hub.stats("jane").await.session_count, 1);
}

#[tokio::test]
async fn test_typing_precedes_chat_reply_only() {
    let state = make_state().await;
    let frames = converse_text(
        &state,
        "kiran",
        &[r#"{"message":"Hello!"}"#, r#"{"type":"get_stats"}"#],
    )
    .await;

    let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["system", "typing", "response", "stats"]);
}

#[tokio::test]
async fn test_close_frame_stops_the_loop() {
    let state = make_state().await;
    let frames = converse(
        &state,
        "lena",
        vec![
            text(r#"{"message":"Hello!"}"#),
            Message::Close(None),
            text(r#"{"message":"never answered"}"#),
        ],
    )
    .await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2]["type"], "response");
    assert_eq!(state.hub.stats("lena").await.total_messages, 2);
    assert_eq!(state.hub.active_sessions(), 0);
}

#[tokio::test]
async fn test_binary_frames_are_read_as_text() {
    let state = make_state().await;
    let frames = converse(
        &state,
        "mona",
        vec![Message::Binary(r#"{"type":"get_stats"}"#.as_bytes().to_vec().into())],
    )
    .await;

    assert_eq!(frames[1]["type"], "stats");
    assert_eq!(frames[1]["data"]["total_messages"], 0);
}

#[tokio::test]
async fn test_experience_request_is_grounded() {
    let state = make_state().await;
    let frames = converse_text(
        &state,
        "frank",
        &[r#"{"type":"chat","message":"Show me kayaking adventure trips in Goa"}"#],
    )
    .await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1]["type"], "typing");
    let reply = &frames[2];
    assert_eq!(reply["type"], "response");

    let cards = reply["experiences"]["experiences"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    let id = cards[0]["id"].as_str().unwrap();
    assert_ne!(id, "404");
    assert!(state.catalog.get(id).is_some());

    let message = reply["message"].as_str().unwrap();
    assert!(message.starts_with("Good news! I found: "));
    assert!(message.ends_with(UNVERIFIED_NOTE));

    let stats = state.hub.stats("frank").await;
    assert_eq!(stats.total_messages, 2);
    assert_eq!(stats.previously_discussed, 1);
}

#[tokio::test]
async fn test_user_message_alias_and_greeting() {
    let state = make_state().await;
    let frames = converse_text(&state, "gina", &[r#"{"type":"user_message","message":"Hello!"}"#]).await;

    let reply = frames.last().unwrap();
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["message"], "Hello from the concierge!");
    assert!(reply.get("experiences").is_none());
}

#[tokio::test]
async fn test_stats_and_clear_envelopes() {
    let state = make_state().await;
    let frames = converse_text(
        &state,
        "hana",
        &[
            r#"{"message":"hey, I love beach trips in Goa"}"#,
            r#"{"type":"get_stats"}"#,
            r#"{"type":"clear_memory"}"#,
        ],
    )
    .await;

    let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["system", "typing", "response", "stats", "system"]);

    assert_eq!(frames[3]["data"]["total_messages"], 2);
    assert_eq!(frames[3]["data"]["known_interests"], 1);

    assert_eq!(frames[4]["message"], CLEARED_MESSAGE);
    assert!(frames[4].get("client_id").is_none());
    assert_eq!(state.hub.stats("hana").await.total_messages, 0);
}

#[tokio::test]
async fn test_invalid_envelopes_produce_error_frames() {
    let state = make_state().await;
    let long = serde_json::json!({"type": "chat", "message": "a".repeat(2001)}).to_string();
    let frames = converse_text(
        &state,
        "ivan",
        &["not json", r#"{"type":"teleport"}"#, long.as_str(), r#"{"type":"chat"}"#],
    )
    .await;

    let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        ["system", "error", "error", "typing", "error", "typing", "error"]
    );
    assert!(frames[1]["message"].as_str().unwrap().starts_with("Invalid message format"));
    assert_eq!(frames[2]["message"], "Unknown message type: teleport");
    assert!(frames[4]["message"].as_str().unwrap().contains("maximum length of 2000"));
    assert_eq!(frames[6]["message"], "message cannot be empty");

    assert_eq!(state.hub.stats("ivan").await.total_messages, 0);
}
