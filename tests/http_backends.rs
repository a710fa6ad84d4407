use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method};
use axum::routing::{any, post};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use engichat::core::{
    BackendConfig, Category, ChatError, ConversationId, ConversationPatch, NewConversation,
    ProfileId, ServerConfig,
};
use engichat::manager::{ConversationManager, FALLBACK_REPLY};
use engichat::responder::{ChatRequest, HttpResponder, Responder, RuleResponder};
use engichat::server::{self, AppState};
use engichat::start_engichat::resolve_profile;
use engichat::storage::{ChatStore, RestChatStore, SortOrder, SqliteChatStore};

async fn spawn_chat_function(api_key: Option<&str>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        api_key: api_key.map(str::to_string),
        ..ServerConfig::default()
    };
    let state = AppState::new(Arc::new(RuleResponder::new()), &config);
    tokio::spawn(server::serve(listener, state, std::future::pending()));
    Url::parse(&format!("http://{addr}")).unwrap()
}

async fn closed_port() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn test_http_responder_against_live_function() {
    let base = spawn_chat_function(None).await;
    let responder = HttpResponder::new(&base, "anon", Duration::from_secs(5)).unwrap();

    let reply = responder
        .respond(ChatRequest::new("how should I study for the exam", ConversationId::new()))
        .await
        .unwrap();
    assert_eq!(
        reply.response,
        RuleResponder::new().reply("how should I study for the exam")
    );
}

#[tokio::test]
async fn test_http_responder_surfaces_status() {
    let base = spawn_chat_function(Some("secret")).await;
    let responder = HttpResponder::new(&base, "anon", Duration::from_secs(5)).unwrap();

    let err = responder
        .respond(ChatRequest::new("hi", ConversationId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::ResponderStatus { status: 401, .. }));
    assert!(!err.is_retryable());

    let authorized = HttpResponder::new(&base, "secret", Duration::from_secs(5)).unwrap();
    assert!(
        authorized
            .respond(ChatRequest::new("hi", ConversationId::new()))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_http_responder_network_failure_is_retryable() {
    let responder = HttpResponder::new(&closed_port().await, "anon", Duration::from_secs(2)).unwrap();
    let err = responder
        .respond(ChatRequest::new("hi", ConversationId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Http(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_undecodable_reply_is_not_retried() {
    let app = Router::new().route("/functions/v1/chat", post(|| async { "<html>oops</html>" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    let base = Url::parse(&format!("http://{addr}")).unwrap();

    let responder = HttpResponder::new(&base, "anon", Duration::from_secs(5)).unwrap();
    let err = responder
        .respond(ChatRequest::new("hi", ConversationId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Responder(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_network_failure_gives_single_fallback_turn() {
    let store = Arc::new(SqliteChatStore::open_in_memory().await.unwrap());
    let owner = ProfileId::new();
    store.upsert_profile(owner, "s@example.com", "").await.unwrap();
    let responder = HttpResponder::new(&closed_port().await, "anon", Duration::from_secs(2)).unwrap();
    let manager = ConversationManager::new(owner, store.clone(), Arc::new(responder));

    let outcome = manager.send_message("Help me debug this loop").await.unwrap();
    assert!(outcome.is_fallback());

    let id = manager.snapshot().active_id().unwrap();
    let stored = store.list_messages(id, SortOrder::Ascending).await.unwrap();
    let contents: Vec<&str> = stored.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["Help me debug this loop", FALLBACK_REPLY]);
}

type Seen = Arc<Mutex<Vec<String>>>;

async fn conversations_table(
    State(seen): State<Seen>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    seen.lock().unwrap().push(format!(
        "{method} {} apikey={} auth={} prefer={}",
        query.unwrap_or_default(),
        header("apikey"),
        header("authorization"),
        header("prefer"),
    ));

    let owner = ProfileId::new();
    let row = |id: ConversationId, title: &str, category: &str| {
        json!({
            "id": id,
            "user_id": owner,
            "title": title,
            "category": category,
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-01T10:05:00+00:00"
        })
    };

    if method == Method::POST {
        let sent: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let title = sent["title"].as_str().unwrap_or("?").to_string();
        let category = sent["category"].as_str().unwrap_or("?").to_string();
        Json(json!([row(ConversationId::new(), &title, &category)]))
    } else {
        Json(json!([
            row(ConversationId::new(), "Beam deflection", "exam_prep"),
            row(ConversationId::new(), "Mystery", "cooking"),
        ]))
    }
}

async fn spawn_row_service() -> (Url, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/rest/v1/conversations", any(conversations_table))
        .with_state(seen.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (Url::parse(&format!("http://{addr}/")).unwrap(), seen)
}

#[tokio::test]
async fn test_rest_store_speaks_row_protocol() {
    let (base, seen) = spawn_row_service().await;
    let store = RestChatStore::new(&BackendConfig {
        url: Some(base.to_string()),
        anon_key: "anon-key".to_string(),
    })
    .unwrap()
    .with_access_token("user-jwt");
    let owner = ProfileId::new();

    let created = store
        .insert_conversation(NewConversation::new(owner, Category::ExamPrep))
        .await
        .unwrap();
    assert_eq!(created.title, "New Conversation");
    assert_eq!(created.category, Category::ExamPrep);

    let listed = store
        .list_conversations(owner, SortOrder::Descending)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].category, Category::General);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen[0],
        "POST  apikey=anon-key auth=Bearer user-jwt prefer=return=representation"
    );
    assert!(seen[1].starts_with(&format!(
        "GET user_id=eq.{owner}&order=updated_at.desc&select=*"
    )));
    assert!(seen[1].ends_with("prefer=-"));
}

#[tokio::test]
async fn test_rest_store_maps_failures_to_persistence() {
    let store = RestChatStore::new(&BackendConfig {
        url: Some(closed_port().await.to_string()),
        anon_key: "anon".to_string(),
    })
    .unwrap();
    let err = store
        .list_conversations(ProfileId::new(), SortOrder::Descending)
        .await
        .unwrap_err();
    assert!(err.is_persistence());
}

const KNOWN_PROFILE: &str = "7b0c2f4e-1d6a-4c51-9a8e-3f2b6d9e0a11";

async fn profiles_table(RawQuery(query): RawQuery) -> Json<Value> {
    let query = query.unwrap_or_default();
    if query.contains(&format!("id=eq.{KNOWN_PROFILE}")) {
        Json(json!([{
            "id": KNOWN_PROFILE,
            "email": "ada@example.com",
            "full_name": null,
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-01T10:00:00+00:00"
        }]))
    } else {
        Json(json!([]))
    }
}

/// Row service whose clock runs an hour ahead of the client.
async fn skewed_conversations(
    State(created_at): State<DateTime<Utc>>,
    method: Method,
    body: Bytes,
) -> Json<Value> {
    let mut row = json!({
        "id": ConversationId::new(),
        "user_id": ProfileId::new(),
        "title": "New Conversation",
        "category": "general",
        "created_at": created_at,
        "updated_at": created_at
    });
    if method == Method::PATCH {
        let sent: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        if let Some(updated_at) = sent.get("updated_at") {
            row["updated_at"] = updated_at.clone();
        }
    }
    Json(json!([row]))
}

async fn spawn_backend(app: Router) -> RestChatStore {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    RestChatStore::new(&BackendConfig {
        url: Some(format!("http://{addr}")),
        anon_key: "anon".to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_rest_update_never_predates_creation() {
    let store = spawn_backend(
        Router::new()
            .route("/rest/v1/conversations", any(skewed_conversations))
            .with_state(Utc::now() + TimeDelta::hours(1)),
    )
    .await;

    let updated = store
        .update_conversation(ConversationId::new(), ConversationPatch::touch())
        .await
        .unwrap();
    assert!(updated.updated_at >= updated.created_at);
}

#[tokio::test]
async fn test_rest_profile_with_null_name_resolves() {
    let store = spawn_backend(Router::new().route("/rest/v1/profiles", any(profiles_table))).await;

    let known: ProfileId = KNOWN_PROFILE.parse().unwrap();
    let profile = resolve_profile(&store, known).await.unwrap();
    assert_eq!(profile.id, known);
    assert_eq!(profile.full_name, "");

    let err = resolve_profile(&store, ProfileId::new()).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidConfig(_)));
}
