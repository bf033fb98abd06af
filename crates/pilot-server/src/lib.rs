//! # pilot-server
//!
//! HTTP API for DevPilot. Provides:
//!
//! - `GET /health` for liveness checks
//! - `POST /chat` to run one agent turn
//! - `GET /history/{user_id}` to read a user's stored conversation

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::Json,
    routing::{get, post},
};
use pilot_config::ServerConfig;
use pilot_core::{Credential, PersistedMessage, PilotError, SubjectId};
use pilot_memory::HistoryStore;
use pilot_runtime::{Agent, RunOutcome, TurnInput};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared server state.
pub struct AppState {
    pub agent: Agent,
    pub store: Arc<dyn HistoryStore>,
    pub started: Instant,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

/// Chat request body.
#[derive(Deserialize)]
struct ChatRequest {
    user_input: String,
    /// Prior conversation supplied by the caller. Takes precedence over the store.
    #[serde(default)]
    chat_history: Option<Vec<PersistedMessage>>,
    #[serde(default)]
    user_id: Option<SubjectId>,
}

/// Chat response body.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
    outcome: RunOutcome,
}

/// Build the Axum router.
pub fn build_router(config: &ServerConfig, agent: Agent, store: Arc<dyn HistoryStore>) -> Router {
    let state = Arc::new(AppState {
        agent,
        store,
        started: Instant::now(),
    });

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/history/{user_id}", get(history_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::from_header);

    let prior_history = match (req.chat_history, req.user_id) {
        (Some(history), _) => history,
        (None, Some(user_id)) => match state.store.fetch(user_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(subject = user_id, error = %e, "failed to load chat history");
                Vec::new()
            }
        },
        (None, None) => Vec::new(),
    };

    let output = state
        .agent
        .run(TurnInput {
            user_input: req.user_input,
            prior_history,
            credential,
            subject_id: req.user_id,
        })
        .await;

    if let Some(user_id) = req.user_id
        && !output.appended.is_empty()
    {
        if let Err(e) = state.store.append(user_id, &output.appended).await {
            warn!(subject = user_id, error = %e, "failed to persist chat history");
        }
    }

    info!(subject = ?req.user_id, outcome = ?output.outcome, "chat request handled");
    Json(ChatResponse {
        response: output.reply,
        outcome: output.outcome,
    })
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<SubjectId>,
) -> Result<Json<Vec<PersistedMessage>>, StatusCode> {
    match state.store.fetch(user_id).await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            warn!(subject = user_id, error = %e, "failed to read chat history");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Start the HTTP server.
pub async fn start_server(
    config: ServerConfig,
    agent: Agent,
    store: Arc<dyn HistoryStore>,
) -> pilot_core::Result<()> {
    let listen = config.listen.clone();
    let router = build_router(&config, agent, store);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| PilotError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router).await?;

    Ok(())
}
