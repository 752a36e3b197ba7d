use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use shield_compute::ArtifactMeta;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scorer: ArtifactMeta,
    pub policy: ArtifactMeta,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        scorer: state.scorer.clone(),
        policy: state.policy.clone(),
    })
}
