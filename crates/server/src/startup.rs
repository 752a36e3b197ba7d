//! Model loading at process start.
//!
//! Both artifacts must load before the listener is bound; any failure here is
//! fatal for the server.

use std::sync::Arc;

use tracing::info;

use shield_compute::{load_artifact, DecisionService, IsolationForest, QPolicy};
use shield_core::config::ModelConfig;
use shield_core::ShieldError;

use crate::state::AppState;

/// Load the scorer and policy artifacts and assemble the app state.
pub fn load_models(models: &ModelConfig) -> Result<AppState, ShieldError> {
    let (scorer, scorer_meta) = load_artifact::<IsolationForest>(&models.scorer_path)?;
    info!(
        path = %models.scorer_path.display(),
        trees = scorer.n_trees(),
        threshold = scorer.threshold(),
        "Anomaly scorer loaded"
    );

    let (policy, policy_meta) = load_artifact::<QPolicy>(&models.policy_path)?;
    info!(path = %models.policy_path.display(), "Defense policy loaded");

    Ok(AppState {
        decisions: DecisionService::new(Arc::new(scorer), Arc::new(policy)),
        scorer: scorer_meta,
        policy: policy_meta,
    })
}
