use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{DetectorStats, HealthStatus, ModelMetadata, PredictionResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Run blocking model work off the async executor
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Worker task failed: {}", e)))?
}

/// Malformed JSON is reported like any other invalid input
fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.detector.health())
}

/// Classify one article
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>> {
    let request = json_body(body)?;
    let text = request
        .text
        .ok_or_else(|| AppError::InvalidInput("No text provided".to_string()))?;

    let detector = state.detector.clone();
    let result = blocking(move || detector.predict(&text)).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Classify up to 100 articles in one call
pub async fn predict_batch(
    State(state): State<AppState>,
    body: std::result::Result<Json<BatchPredictRequest>, JsonRejection>,
) -> Result<Json<BatchPredictResponse>> {
    let request = json_body(body)?;
    request.validate()?;

    let detector = state.detector.clone();
    let texts = request.texts;
    let predictions = blocking(move || detector.predict_batch(&texts)).await?;
    Ok(Json(BatchPredictResponse {
        count: predictions.len(),
        predictions,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchPredictRequest {
    #[validate(length(min = 1, max = 100))]
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<PredictionResult>,
    pub count: usize,
}

/// Metadata of the served model
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelMetadata>> {
    state
        .detector
        .model_info()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No trained model is loaded".to_string()))
}

/// Service counters
pub async fn stats(State(state): State<AppState>) -> Json<DetectorStats> {
    Json(state.detector.stats())
}

/// Retraining over HTTP is not offered
pub async fn retrain() -> Result<Json<()>> {
    Err(AppError::NotImplemented(
        "Retraining is not available over HTTP; run `fnd-cli train` instead".to_string(),
    ))
}
