use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use shield_core::{DecisionResult, RawMetrics, ShieldError};

use super::ApiError;
use crate::state::AppState;

/// `POST /predict`: classify one metrics sample and return the mitigation.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawMetrics>, JsonRejection>,
) -> Result<Json<DecisionResult>, ApiError> {
    let Json(metrics) =
        payload.map_err(|rejection| ShieldError::MalformedRequest(rejection.body_text()))?;
    let decision = state.decisions.decide(&metrics)?;
    Ok(Json(decision.result))
}
