use std::sync::Arc;

use tracing::info;

use shield_core::{Action, AnomalyVerdict, DecisionResult, Observation, RawMetrics, ShieldError};

use crate::policy::Policy;
use crate::scorer::AnomalyScorer;

/// Outcome of one inference request.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub result: DecisionResult,
    pub action: Action,
    pub observation: Observation,
    pub verdict: AnomalyVerdict,
}

/// Inference pipeline: normalize, score, build observation, pick an action.
///
/// Holds immutable handles to a fitted scorer and a trained policy, so one
/// instance can be shared across request handlers behind an `Arc`.
#[derive(Clone)]
pub struct DecisionService {
    scorer: Arc<dyn AnomalyScorer>,
    policy: Arc<dyn Policy>,
}

impl DecisionService {
    pub fn new(scorer: Arc<dyn AnomalyScorer>, policy: Arc<dyn Policy>) -> Self {
        Self { scorer, policy }
    }

    pub fn decide(&self, metrics: &RawMetrics) -> Result<Decision, ShieldError> {
        let features = metrics.normalize();
        let verdict = self.scorer.score(&features)?;
        let observation = Observation::build(features, verdict);
        let action = Action::try_from(self.policy.predict(&observation))?;

        info!(
            requests = metrics.requests,
            verdict = %verdict,
            action = %action,
            "decision"
        );

        Ok(Decision {
            result: action.result(),
            action,
            observation,
            verdict,
        })
    }
}
