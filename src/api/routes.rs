use axum::{
    routing::{get, post},
    Router,
    extract::{Json, State},
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use std::time::Instant;
use tracing::{info, warn};

use crate::analysis::{analyze_android, analyze_ios};
use crate::api::models::{AnalysisResponse, AndroidAnalysisRequest, HealthResponse, IosAnalysisRequest};
use crate::error::{AppError, Result};
use crate::models::{IosApp, PlayApp};
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/analyze-app", post(analyze_app_handler))
        .route("/analyze-ios-app", post(analyze_ios_app_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn log_outcome<T>(result: &Result<AnalysisResponse<T>>, started: Instant) {
    let elapsed = started.elapsed();
    match result {
        Ok(response) => info!(
            similar_apps = response.similar_apps.len(),
            ?elapsed,
            "Analysis complete"
        ),
        Err(AppError::InvalidUrl(msg)) => warn!(?elapsed, "Rejected request: {}", msg),
        Err(e) => warn!(?elapsed, error = %e, "Analysis failed"),
    }
}

async fn analyze_app_handler(
    State(state): State<AppState>,
    Json(req): Json<AndroidAnalysisRequest>,
) -> Result<Json<AnalysisResponse<PlayApp>>> {
    info!(app_name = %req.android_app_name, url = %req.url, "Analyzing Android app");
    let started = Instant::now();

    let result = analyze_android(state.play.as_ref(), &req.android_app_name, &req.url).await;
    log_outcome(&result, started);

    result.map(Json)
}

async fn analyze_ios_app_handler(
    State(state): State<AppState>,
    Json(req): Json<IosAnalysisRequest>,
) -> Result<Json<AnalysisResponse<IosApp>>> {
    info!(app_name = %req.ios_app_name, url = %req.url, "Analyzing iOS app");
    let started = Instant::now();

    let result = analyze_ios(state.app_store.as_ref(), &req.ios_app_name, &req.url).await;
    log_outcome(&result, started);

    result.map(Json)
}
