use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use fincat_core::{validate_batch, CategorizationRequest, UnvalidatedRequest};
use fincat_engine::{BatchOutcome, CategorizationResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub transactions: Vec<UnvalidatedRequest>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/categorize", post(categorize))
        .route("/categorize/batch", post(categorize_batch))
        // Enforced by the JSON extractor, so oversized bodies get the usual error body.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "model": state.categorizer.model_id(),
        "max_batch_size": state.batch.config().max_size,
        "endpoints": {
            "health": "/health",
            "categorize_single": "/categorize",
            "categorize_batch": "/categorize/batch",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn categorize(
    State(state): State<AppState>,
    payload: Result<Json<UnvalidatedRequest>, JsonRejection>,
) -> ApiResult<Json<CategorizationResult>> {
    let Json(raw) = payload?;
    let request = CategorizationRequest::validate(raw).map_err(ApiError::validation)?;

    let result = state
        .categorizer
        .categorize(&request)
        .map_err(|e| ApiError::from_categorize(e, "Categorization"))?;

    tracing::info!(
        merchant = %request.merchant,
        category = %result.category_id,
        confidence = result.confidence_score,
        inference_ms = result.inference_time,
        "categorized"
    );
    Ok(Json(result))
}

#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), size))]
async fn categorize_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Json<BatchOutcome>> {
    let Json(batch) = payload?;
    tracing::Span::current().record("size", batch.transactions.len());

    let max = state.batch.config().max_size;
    let requests = validate_batch(batch.transactions, max).map_err(ApiError::validation)?;

    let outcome = state
        .batch
        .run(requests)
        .await
        .map_err(|e| ApiError::from_categorize(e, "Batch categorization"))?;
    Ok(Json(outcome))
}
