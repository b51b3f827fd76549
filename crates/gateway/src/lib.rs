//! HTTP API gateway for uavchat.
//!
//! Exposes the upload/ask boundary over one shared conversation session,
//! plus health, catalog and session introspection endpoints.
//!
//! Built on Axum for high performance async HTTP.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use uavchat_agent::{Session, SessionOptions};
use uavchat_config::GatewayConfig;
use uavchat_core::error::SessionError;
use uavchat_core::flight::{SectionId, TelemetryDocument};
use uavchat_core::provider::Generator;
use uavchat_providers::ProviderGenerator;

/// Shared application state for the gateway.
///
/// The session lock is held for a whole turn, so uploads and asks are
/// serialized: an upload never replaces a session mid-turn.
pub struct GatewayState {
    pub generator: Arc<dyn Generator>,
    pub options: SessionOptions,
    pub session: Mutex<Option<Session>>,
}

impl GatewayState {
    pub fn new(generator: Arc<dyn Generator>, options: SessionOptions) -> Self {
        Self {
            generator,
            options,
            session: Mutex::new(None),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/sections", get(sections_handler))
        .route("/upload_log", post(upload_handler))
        .route("/ask", post(ask_handler))
        .route("/session", get(session_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    let router = if config.cors_allow_any {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: uavchat_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    if !config.has_api_key() {
        warn!("No API key configured; generation calls will fail until one is set");
    }

    let generator = ProviderGenerator::from_config(&config)?;
    info!(
        provider = %config.default_provider,
        model = %generator.model(),
        "Generation service ready"
    );

    let state = Arc::new(GatewayState::new(
        Arc::new(generator),
        SessionOptions::from(&config.session),
    ));
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionListResponse {
    pub sections: Vec<SectionInfo>,
    pub count: usize,
}

async fn sections_handler() -> Json<SectionListResponse> {
    let sections: Vec<SectionInfo> = SectionId::ALL
        .iter()
        .map(|id| SectionInfo {
            name: id.as_str().to_string(),
            description: id.description().to_string(),
        })
        .collect();
    Json(SectionListResponse {
        count: sections.len(),
        sections,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub session_id: String,
    pub keys: Vec<String>,
}

/// `POST /upload_log`: replace the session with one over the uploaded log.
///
/// The body is parsed by hand so malformed JSON gets the same error shape
/// as a non-object document.
async fn upload_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")))?;
    let document = TelemetryDocument::from_value(value)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let keys = document.keys();

    let mut slot = state.session.lock().await;
    if let Some(previous) = slot.as_ref() {
        info!(session_id = %previous.id(), "Discarding previous session");
    }
    let session = Session::new(document, state.generator.clone(), &state.options);
    let session_id = session.id().to_string();
    *slot = Some(session);

    info!(session_id = %session_id, keys = keys.len(), "Flight log uploaded");
    Ok(Json(UploadResponse {
        status: "agent instantiated".into(),
        session_id,
        keys,
    }))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
}

/// Either an answer or the no-upload error, both with status 200.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AskResponse {
    Answered { answer: String },
    NoSession { error: String },
}

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let mut slot = state.session.lock().await;
    let Some(session) = slot.as_mut() else {
        warn!("Question received before any upload");
        return Ok(Json(AskResponse::NoSession {
            error: SessionError::NoDocument.to_string(),
        }));
    };

    info!(question_len = payload.question.len(), "Question received");
    match session.ask(&payload.question).await {
        Ok(answer) => Ok(Json(AskResponse::Answered { answer })),
        Err(e) => {
            error!(error = %e, "Turn failed");
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turns: usize,
    pub selected_sections: Vec<SectionId>,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionResponse {
    Active(SessionSummary),
    NoSession { error: String },
}

async fn session_handler(State(state): State<SharedState>) -> Json<SessionResponse> {
    let slot = state.session.lock().await;
    let Some(session) = slot.as_ref() else {
        return Json(SessionResponse::NoSession {
            error: SessionError::NoDocument.to_string(),
        });
    };

    let conversation = session.state();
    Json(SessionResponse::Active(SessionSummary {
        session_id: conversation.id.to_string(),
        turns: conversation.history.len(),
        selected_sections: conversation.selected_sections.iter().copied().collect(),
        summary: conversation.summary.clone(),
    }))
}
