//! HTTP API integration tests: every endpoint against a mock model and a fake backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use pilot_config::ServerConfig;
use pilot_core::{Identity, Message, PersistedMessage, Result};
use pilot_llm::MockProvider;
use pilot_memory::{HistoryStore, InMemoryHistoryStore};
use pilot_runtime::{Agent, LlmReasoner, ToolExecutor};
use pilot_tools::{RemoteClient, RemoteRequest, ToolRegistry};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Records the identity of every backend call.
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<(String, i64, String)>>,
}

#[async_trait]
impl RemoteClient for RecordingBackend {
    async fn invoke(&self, request: &RemoteRequest, identity: &Identity) -> Result<Value> {
        self.calls.lock().push((
            request.path.clone(),
            identity.subject_id,
            identity.credential.expose().to_string(),
        ));
        Ok(json!([{ "taskId": 1, "title": "배포 준비" }]))
    }
}

fn build(
    provider: MockProvider,
    backend: Arc<RecordingBackend>,
    store: Arc<InMemoryHistoryStore>,
) -> axum::Router {
    let registry = Arc::new(ToolRegistry::builtin().unwrap());
    let reasoner = LlmReasoner::new(Arc::new(provider), "gpt-4o-mini", "test prompt");
    let executor = ToolExecutor::new(registry, backend, Duration::from_secs(2));
    let agent = Agent::new(Arc::new(reasoner), executor);
    pilot_server::build_router(&ServerConfig::default(), agent, store)
}

fn setup(responses: Vec<&str>) -> (axum::Router, Arc<InMemoryHistoryStore>) {
    let mut mock = MockProvider::new("mock");
    for r in responses {
        mock = mock.with_response(r);
    }
    let store = Arc::new(InMemoryHistoryStore::new());
    let router = build(mock, Arc::new(RecordingBackend::default()), store.clone());
    (router, store)
}

/// Helper to read the full body bytes from a response.
async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

fn chat_request(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/chat").header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// ── Health ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup(vec![]);
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].is_u64());
}

// ── Chat ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_returns_reply_and_outcome() {
    let (app, _) = setup(vec!["안녕하세요! 무엇을 도와드릴까요?"]);
    let resp = app
        .oneshot(chat_request(json!({ "user_input": "안녕" }), None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["response"], "안녕하세요! 무엇을 도와드릴까요?");
    assert_eq!(json["outcome"], "clarification");
}

#[tokio::test]
async fn test_chat_missing_body() {
    let (app, _) = setup(vec![]);
    let resp = app
        .oneshot(chat_request(json!({}), None))
        .await
        .unwrap();

    // Missing required field "user_input"
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_chat_persists_appended_records() {
    let (app, store) = setup(vec!["네, 알겠습니다."]);
    let resp = app
        .oneshot(chat_request(
            json!({ "user_input": "고마워", "user_id": 3 }),
            Some("tok"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = store.fetch(3).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].content, "고마워");
    assert_eq!(stored[1].content, "네, 알겠습니다.");
}

#[tokio::test]
async fn test_chat_loads_stored_history() {
    let mock = MockProvider::new("mock").with_response("이어서 진행하겠습니다.");
    let requests = mock.recorded_requests();
    let store = Arc::new(InMemoryHistoryStore::new());
    store
        .append(
            4,
            &[
                Message::human("프로젝트 만들어줘").to_record(),
                Message::assistant("이름을 알려주세요").to_record(),
            ],
        )
        .await
        .unwrap();
    let app = build(mock, Arc::new(RecordingBackend::default()), store.clone());

    app.oneshot(chat_request(
        json!({ "user_input": "런칭", "user_id": 4 }),
        Some("tok"),
    ))
    .await
    .unwrap();

    assert_eq!(requests.lock()[0].messages.len(), 3);
    assert_eq!(store.fetch(4).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_chat_history_in_body_wins_over_store() {
    let mock = MockProvider::new("mock").with_response("좋아요.");
    let requests = mock.recorded_requests();
    let store = Arc::new(InMemoryHistoryStore::new());
    store
        .append(5, &[Message::human("stored").to_record()])
        .await
        .unwrap();
    let app = build(mock, Arc::new(RecordingBackend::default()), store);

    let history: Vec<PersistedMessage> = vec![];
    app.oneshot(chat_request(
        json!({ "user_input": "hi", "user_id": 5, "chat_history": history }),
        Some("tok"),
    ))
    .await
    .unwrap();

    assert_eq!(requests.lock()[0].messages.len(), 1);
}

#[tokio::test]
async fn test_chat_forwards_bearer_identity_to_tools() {
    let mock = MockProvider::new("mock")
        .with_tool_call("get_all_tasks", json!({}))
        .with_response("태스크 1개가 있습니다.");
    let backend = Arc::new(RecordingBackend::default());
    let app = build(mock, backend.clone(), Arc::new(InMemoryHistoryStore::new()));

    let resp = app
        .oneshot(chat_request(
            json!({ "user_input": "내 태스크 보여줘", "user_id": 9 }),
            Some("jwt-abc"),
        ))
        .await
        .unwrap();

    let json = body_json(resp).await;
    assert_eq!(json["outcome"], "answered");
    let calls = backend.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], ("/tasks/all".to_string(), 9, "jwt-abc".to_string()));
}

#[tokio::test]
async fn test_chat_without_token_is_refused_politely() {
    let mock = MockProvider::new("mock").with_tool_call("get_all_tasks", json!({}));
    let backend = Arc::new(RecordingBackend::default());
    let app = build(mock, backend.clone(), Arc::new(InMemoryHistoryStore::new()));

    let resp = app
        .oneshot(chat_request(
            json!({ "user_input": "내 태스크 보여줘", "user_id": 9 }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["outcome"], "authorization_required");
    assert!(backend.calls.lock().is_empty());
}

#[tokio::test]
async fn test_chat_with_empty_bearer_is_refused() {
    let mock = MockProvider::new("mock").with_tool_call("get_all_tasks", json!({}));
    let backend = Arc::new(RecordingBackend::default());
    let app = build(mock, backend.clone(), Arc::new(InMemoryHistoryStore::new()));

    let resp = app
        .oneshot(chat_request(
            json!({ "user_input": "내 태스크 보여줘", "user_id": 9 }),
            Some(""),
        ))
        .await
        .unwrap();

    let json = body_json(resp).await;
    assert_eq!(json["outcome"], "authorization_required");
    assert!(backend.calls.lock().is_empty());
}

#[tokio::test]
async fn test_invalid_history_is_not_persisted() {
    let (app, store) = setup(vec!["unused"]);
    let stray = json!({
        "role": "tool",
        "content": "{}",
        "tool_call_id": "ghost",
        "tool_name": "delete_task"
    });
    let resp = app
        .oneshot(chat_request(
            json!({ "user_input": "hi", "user_id": 2, "chat_history": [stray] }),
            Some("tok"),
        ))
        .await
        .unwrap();

    let json = body_json(resp).await;
    assert_eq!(json["outcome"], "invalid_history");
    assert!(store.fetch(2).await.unwrap().is_empty());
}

// ── History ────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_endpoint() {
    let (app, store) = setup(vec![]);
    store
        .append(
            1,
            &[
                Message::human("안녕").to_record(),
                Message::assistant("안녕하세요").to_record(),
            ],
        )
        .await
        .unwrap();

    let req = Request::get("/history/1").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["role"], "human");
    assert_eq!(records[1]["role"], "ai");
}

#[tokio::test]
async fn test_history_endpoint_rejects_non_numeric_id() {
    let (app, _) = setup(vec![]);
    let req = Request::get("/history/abc").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = setup(vec![]);
    let req = Request::get("/nope").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
