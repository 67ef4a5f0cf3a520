//! HTTP surface: the generate-plot controller and its error mapping.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::chart::theme;
use crate::extract::extract_code_block;
use crate::llm::{EngineReply, GenerativeEngine};
use crate::prompt;
use crate::render;
use crate::scene::eval;

/// Tag for the fragment language returned in `code`.
pub const CODE_TYPE: &str = "json";

/// Read-only per-process state. The engine handle is `None` when no
/// credential was configured at startup; every request then fails fast.
#[derive(Clone)]
pub struct AppState {
    pub engine: Option<Arc<dyn GenerativeEngine>>,
}

pub fn app(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate-plot", post(generate_plot))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparsable allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct PlotResponse {
    pub html: String,
    pub code: String,
    pub code_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// One linear pass: compose, generate, extract, interpret, validate,
/// normalize, render. Each stage owns its failure class; nothing is
/// retried and nothing is swallowed into an opaque 200.
async fn generate_plot(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<PlotResponse>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }

    let Some(engine) = state.engine.as_ref() else {
        error!("generate-plot called without a configured engine");
        return Err(ApiError::internal(
            "generation engine is not configured (missing GOOGLE_API_KEY)",
        ));
    };

    info!(prompt = %request.prompt, "received prompt");

    let instruction = prompt::compose(&request.prompt);
    let reply = engine.generate(&instruction).await.map_err(|e| {
        error!(error = %e, "engine request failed");
        ApiError::internal(format!("engine request failed: {e}"))
    })?;

    let text = match reply {
        EngineReply::Text(text) => text,
        EngineReply::Blocked { reason } => {
            warn!(reason = %reason, "generation blocked by the engine");
            return Err(ApiError::bad_request(format!(
                "generation blocked by the engine: {reason}"
            )));
        }
    };

    let Some(code) = extract_code_block(&text) else {
        warn!("engine reply contained no fenced code block");
        return Err(ApiError::bad_request(
            "the engine reply contained no valid code block",
        ));
    };
    info!(bytes = code.len(), "extracted scene document");

    let namespace = eval::evaluate(&code).map_err(|e| {
        error!(error = %e, "scene evaluation failed");
        ApiError::internal(format!("scene evaluation failed: {e}"))
    })?;

    let figure = eval::take_figure(namespace).map_err(|e| {
        warn!(error = %e, "generated scene produced no valid chart");
        ApiError::bad_request(format!("generated code did not produce a valid chart: {e}"))
    })?;

    let figure = theme::normalize(figure);

    let document = render::render(&figure)
        .map_err(|e| ApiError::internal(format!("failed to render chart: {e}")))?;

    Ok(Json(PlotResponse {
        html: document.markup,
        code,
        code_type: CODE_TYPE,
    }))
}
