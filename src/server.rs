//! HTTP adapter over the localizer.

use crate::concepts::list_supported_concept_kinds;
use crate::culture::{list_supported_categories, CulturalCategory};
use crate::error::LocalizeError;
use crate::i18n::{list_supported_languages, Language};
use crate::localizer::{LocalizationRequest, LocalizedResult, Localizer};
use crate::metrics::{LocalizationMetrics, MetricsReport};
use crate::profile::{Profile, ProfileStore};
use crate::security::is_authorized;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub localizer: Arc<Localizer>,
    pub profiles: Arc<dyn ProfileStore>,
    pub metrics: Arc<LocalizationMetrics>,
    pub api_key: Option<String>,
}

/// Profile supplied inline with a request instead of by id.
#[derive(Debug, Deserialize)]
pub struct InlineProfile {
    #[serde(default)]
    pub id: Option<String>,
    pub categories: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl InlineProfile {
    fn into_profile(self) -> Result<Profile, LocalizeError> {
        let categories = self
            .categories
            .iter()
            .map(|c| c.parse::<CulturalCategory>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(LocalizeError::InvalidProfile)?;

        let language = match self.language.as_deref() {
            Some(code) => Language::from_code(code),
            None => Language::canonical(),
        }
        .map_err(|e| LocalizeError::InvalidProfile(e.to_string()))?;

        Profile::new(
            self.id.unwrap_or_else(|| "inline".to_string()),
            categories,
            language,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct LocalizeBody {
    pub text: String,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub profile: Option<InlineProfile>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

/// Error response with status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    retry_after: Option<Duration>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "Missing or invalid API key")
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl From<LocalizeError> for ApiError {
    fn from(err: LocalizeError) -> Self {
        let status = match &err {
            LocalizeError::InputTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            LocalizeError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            LocalizeError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
            retry_after: err.retry_after(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorEnvelope {
            error: ErrorBody {
                kind: self.kind,
                message: self.message,
            },
        });
        let mut response = (self.status, body).into_response();

        if let Some(retry_after) = self.retry_after {
            // Whole seconds, rounded up so clients never retry early
            let seconds = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if is_authorized(state.api_key.as_deref(), provided) {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}

async fn localize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LocalizeBody>,
) -> Result<Json<LocalizedResult>, ApiError> {
    check_api_key(&state, &headers)?;

    let profile = match (body.profile_id, body.profile) {
        (_, Some(inline)) => inline.into_profile()?,
        (Some(id), None) => state
            .profiles
            .get(&id)
            .ok_or_else(|| ApiError::not_found(format!("Unknown profile '{}'", id)))?,
        (None, None) => return Err(ApiError::bad_request("Either profile_id or profile is required")),
    };

    let deadline = body.deadline_ms.map(Duration::from_millis);
    let result = state
        .localizer
        .localize(LocalizationRequest::new(body.text, profile), deadline)
        .await?;
    Ok(Json(result))
}

async fn concept_kinds() -> impl IntoResponse {
    Json(list_supported_concept_kinds())
}

async fn categories() -> impl IntoResponse {
    Json(list_supported_categories())
}

async fn languages() -> impl IntoResponse {
    Json(list_supported_languages())
}

async fn metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MetricsReport>, ApiError> {
    check_api_key(&state, &headers)?;
    Ok(Json(state.metrics.report()))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/localize", post(localize))
        .route("/concept-kinds", get(concept_kinds))
        .route("/categories", get(categories))
        .route("/languages", get(languages))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}
