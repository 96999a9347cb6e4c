// src/api.rs
//! Admin HTTP surface: source management and manual actions.
//!
//! Handlers only wrap core operations (config store edits, fetch + extract,
//! notify). Delivery state is never touched from here.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::{ConfigStore, MonitorConfig, SourceEditError, SourceProfile};
use crate::delivery::StateStore;
use crate::engine::{CycleSettings, Engine};
use crate::error::MonitorError;
use crate::ingest::{selectors, CandidateItem, PageFetcher, ProbeResult};
use crate::notify::{Notifier, NotifyOutcome};

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<ConfigStore>>,
    fetcher: Arc<dyn PageFetcher>,
    /// Fixed notifier; when `None` one is built from the current config per request.
    notifier: Option<Arc<Notifier>>,
}

impl AppState {
    pub fn new(store: ConfigStore, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            fetcher,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<RwLock<ConfigStore>> {
        &self.store
    }

    fn engine(&self, cfg: &MonitorConfig) -> Result<Engine, ApiError> {
        let notifier = match &self.notifier {
            Some(n) => n.clone(),
            None => Arc::new(Notifier::from_config(cfg).map_err(|e| ApiError::Internal(e.to_string()))?),
        };
        Ok(Engine::new(
            self.fetcher.clone(),
            notifier,
            StateStore::new(cfg.state_path()),
            CycleSettings::from_config(cfg),
        ))
    }

    async fn lookup(&self, name: &str) -> Result<(SourceProfile, MonitorConfig), ApiError> {
        let guard = self.store.read().await;
        let cfg = guard.config();
        let profile = cfg
            .source(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("no source named {name:?}")))?;
        Ok((profile, cfg.clone()))
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PreconditionFailed(String),
    Upstream(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::PreconditionFailed(m) => (StatusCode::PRECONDITION_FAILED, m),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

impl From<SourceEditError> for ApiError {
    fn from(e: SourceEditError) -> Self {
        match e {
            SourceEditError::Duplicate(_) => ApiError::Conflict(e.to_string()),
            SourceEditError::NotFound(_) => ApiError::NotFound(e.to_string()),
            SourceEditError::Invalid(_) => ApiError::BadRequest(e.to_string()),
            SourceEditError::Save(err) => ApiError::Internal(format!("{err:#}")),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::Fetch { .. } => ApiError::Upstream(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sources", get(list_sources).post(add_source))
        .route("/sources/{name}", axum::routing::delete(remove_source))
        .route("/sources/{name}/enabled", put(set_enabled))
        .route("/sources/{name}/probe", post(probe_source))
        .route("/sources/{name}/preview", post(preview_source))
        .route("/sources/{name}/send", post(send_source))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceProfile>> {
    Json(state.store.read().await.sources().to_vec())
}

async fn add_source(
    State(state): State<AppState>,
    Json(profile): Json<SourceProfile>,
) -> Result<(StatusCode, Json<SourceProfile>), ApiError> {
    if let Some(spec) = &profile.selectors {
        selectors::validate(spec).map_err(ApiError::BadRequest)?;
    }
    state.store.write().await.add_source(profile.clone())?;
    info!(source = %profile.name, kind = profile.kind.as_str(), "source added");
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
struct EnabledReq {
    enabled: bool,
}

async fn set_enabled(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<EnabledReq>,
) -> Result<Json<SourceProfile>, ApiError> {
    let mut guard = state.store.write().await;
    guard.set_enabled(&name, body.enabled)?;
    info!(source = %name, enabled = body.enabled, "source toggled");
    let profile = guard
        .config()
        .source(&name)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(name.clone()))?;
    Ok(Json(profile))
}

async fn remove_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SourceProfile>, ApiError> {
    let removed = state.store.write().await.remove_source(&name)?;
    info!(source = %name, "source removed");
    Ok(Json(removed))
}

async fn probe_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProbeResult>, ApiError> {
    let (profile, _) = state.lookup(&name).await?;
    Ok(Json(state.fetcher.probe(&profile.url).await))
}

#[derive(Serialize)]
struct PreviewResp {
    source: String,
    items: Vec<CandidateItem>,
    markdown: String,
}

async fn preview_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PreviewResp>, ApiError> {
    let (profile, cfg) = state.lookup(&name).await?;
    let engine = state.engine(&cfg)?;
    let (batch, message) = engine.preview_message(&profile).await?;
    Ok(Json(PreviewResp {
        source: profile.name,
        items: batch.items().to_vec(),
        markdown: message.markdown,
    }))
}

async fn send_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NotifyOutcome>, ApiError> {
    let (profile, cfg) = state.lookup(&name).await?;
    let engine = state.engine(&cfg)?;
    if !engine.notifier().has_transport() {
        return Err(ApiError::PreconditionFailed(
            "no webhook configured".to_string(),
        ));
    }
    let outcome = engine.send_now(&profile).await?;
    info!(source = %profile.name, outcome = outcome.label(), "manual send");
    Ok(Json(outcome))
}
