//! Offline training driver.
//!
//! Fits the scorer on synthetic baseline traffic, trains the policy against
//! the simulator, persists both artifacts, and runs a greedy evaluation
//! rollout. Everything is seeded from a single `u64`.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use shield_core::config::{ModelConfig, TrainingConfig};
use shield_core::ShieldError;

use crate::algorithms::isolation_forest::{IsolationForest, IsolationForestParams};
use crate::artifact::{load_artifact, save_artifact, ArtifactMeta};
use crate::env::DefenseEnv;
use crate::policy::{
    evaluate_policy, train_policy, EvaluationReport, Policy, PolicyTrainingConfig, QPolicy,
    TrainingReport,
};
use crate::scorer::{fit_scorer, generate_baseline, AnomalyScorer};

/// Offsets that derive independent streams from the run seed.
const ENV_SEED_OFFSET: u64 = 1;
const EVAL_SEED_OFFSET: u64 = 1_000;

/// Seed of the evaluation rollout for a run seeded with `run_seed`.
///
/// `train` and `evaluate` both use it, so evaluating saved artifacts with the
/// same run seed and step count reproduces the post-training report.
pub fn evaluation_seed(run_seed: u64) -> u64 {
    run_seed.wrapping_add(EVAL_SEED_OFFSET)
}

/// Everything a `train` run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub scorer: ArtifactMeta,
    pub policy: ArtifactMeta,
    pub training: TrainingReport,
    pub evaluation: EvaluationReport,
}

impl From<&TrainingConfig> for IsolationForestParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            contamination: config.contamination,
            ..Default::default()
        }
    }
}

impl From<&TrainingConfig> for PolicyTrainingConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            steps: config.steps,
            learning_rate: config.learning_rate,
            gamma: config.gamma,
            log_interval: config.log_interval,
            ..Default::default()
        }
    }
}

/// Fit a scorer and train a policy in memory.
pub fn fit_models(
    config: &TrainingConfig,
) -> Result<(IsolationForest, QPolicy, TrainingReport), ShieldError> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let baseline = generate_baseline(config.baseline_samples, &mut rng)?;
    let scorer = fit_scorer(&baseline, &IsolationForestParams::from(config), &mut rng)?;

    let (policy, report) = {
        let mut env = DefenseEnv::new(
            &scorer,
            StdRng::seed_from_u64(config.seed.wrapping_add(ENV_SEED_OFFSET)),
        );
        train_policy(&mut env, &PolicyTrainingConfig::from(config), &mut rng)?
    };

    Ok((scorer, policy, report))
}

/// Run a greedy rollout of `policy` against a simulator seeded with `seed`.
pub fn evaluate<S, P>(
    scorer: &S,
    policy: &P,
    steps: usize,
    seed: u64,
) -> Result<EvaluationReport, ShieldError>
where
    S: AnomalyScorer + ?Sized,
    P: Policy + ?Sized,
{
    let mut env = DefenseEnv::new(scorer, StdRng::seed_from_u64(seed));
    let report = evaluate_policy(policy, &mut env, steps)?;
    log_evaluation(&report);
    Ok(report)
}

/// Full `train` pipeline: fit, train, persist, evaluate.
pub fn train_and_save(
    config: &TrainingConfig,
    models: &ModelConfig,
    eval_steps: usize,
) -> Result<TrainingOutcome, ShieldError> {
    info!(seed = config.seed, steps = config.steps, "training run starting");

    let (scorer, policy, training) = fit_models(config)?;
    let scorer_meta = save_artifact(&scorer, &models.scorer_path)?;
    let policy_meta = save_artifact(&policy, &models.policy_path)?;

    let evaluation = evaluate(&scorer, &policy, eval_steps, evaluation_seed(config.seed))?;

    Ok(TrainingOutcome {
        scorer: scorer_meta,
        policy: policy_meta,
        training,
        evaluation,
    })
}

/// Load both artifacts from disk and evaluate them.
pub fn evaluate_saved(
    scorer_path: &Path,
    policy_path: &Path,
    steps: usize,
    seed: u64,
) -> Result<EvaluationReport, ShieldError> {
    let (scorer, _) = load_artifact::<IsolationForest>(scorer_path)?;
    let (policy, _) = load_artifact::<QPolicy>(policy_path)?;
    evaluate(&scorer, &policy, steps, seed)
}

fn log_evaluation(report: &EvaluationReport) {
    info!(
        steps = report.steps,
        mean_reward = report.mean_reward,
        block_rate_under_attack = report.block_rate_under_attack(),
        false_block_rate = report.false_block_rate(),
        attack_actions = ?report.attack_actions,
        calm_actions = ?report.calm_actions,
        "evaluation complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_core::{Action, AnomalyVerdict, NormalizedVector, Observation};

    fn quick_config(seed: u64) -> TrainingConfig {
        TrainingConfig {
            seed,
            steps: 12_000,
            log_interval: 0,
            ..Default::default()
        }
    }

    #[test]
    fn config_maps_onto_algorithm_params() {
        let config = TrainingConfig {
            n_trees: 17,
            contamination: 0.2,
            steps: 500,
            learning_rate: 0.05,
            gamma: 0.5,
            ..Default::default()
        };
        let forest = IsolationForestParams::from(&config);
        assert_eq!(forest.n_trees, 17);
        assert_eq!(forest.max_samples, 256);
        assert_eq!(forest.contamination, 0.2);

        let policy = PolicyTrainingConfig::from(&config);
        assert_eq!(policy.steps, 500);
        assert_eq!(policy.learning_rate, 0.05);
        assert_eq!(policy.gamma, 0.5);
        assert_eq!(policy.epsilon_end, 0.05);
    }

    #[test]
    fn end_to_end_flood_is_escalated() {
        let (scorer, policy, _) = fit_models(&quick_config(42)).unwrap();

        let features = shield_core::normalize(9000.0, 0.01, 50.0);
        assert_eq!(features, NormalizedVector::new(1.0, 0.01, 0.05));

        let verdict = scorer.score(&features).unwrap();
        assert_eq!(verdict, AnomalyVerdict::Anomalous);

        let action = Action::try_from(policy.predict(&Observation::build(features, verdict))).unwrap();
        assert!(matches!(action, Action::RateLimit | Action::Block), "got {:?}", action);
    }

    #[test]
    fn same_seed_same_models() {
        let config = TrainingConfig {
            steps: 2_000,
            n_trees: 20,
            log_interval: 0,
            ..Default::default()
        };
        let (_, a, ra) = fit_models(&config).unwrap();
        let (_, b, rb) = fit_models(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(ra.action_counts, rb.action_counts);
    }

    #[test]
    fn train_and_save_writes_loadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelConfig {
            scorer_path: dir.path().join("models/iso_forest.msgpack"),
            policy_path: dir.path().join("models/q_policy.msgpack"),
        };
        let config = TrainingConfig {
            steps: 3_000,
            n_trees: 25,
            log_interval: 0,
            ..Default::default()
        };

        let outcome = train_and_save(&config, &models, 500).unwrap();
        assert_eq!(outcome.scorer.kind, "scorer");
        assert_eq!(outcome.policy.kind, "policy");
        assert_eq!(outcome.training.steps, 3_000);
        assert_eq!(outcome.evaluation.steps, 500);

        let reloaded = evaluate_saved(
            &models.scorer_path,
            &models.policy_path,
            500,
            evaluation_seed(config.seed),
        )
        .unwrap();
        assert_eq!(reloaded.attack_actions, outcome.evaluation.attack_actions);
        assert_eq!(reloaded.calm_actions, outcome.evaluation.calm_actions);
        assert_eq!(reloaded.mean_reward, outcome.evaluation.mean_reward);
    }

    #[test]
    fn evaluation_seed_is_distinct_from_training_streams() {
        assert_eq!(evaluation_seed(7), 1_007);
        assert_ne!(evaluation_seed(7), 7);
        assert_ne!(evaluation_seed(7), 7 + ENV_SEED_OFFSET);
        assert_eq!(evaluation_seed(u64::MAX), EVAL_SEED_OFFSET - 1);
    }

    #[test]
    fn evaluate_saved_reports_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let err = evaluate_saved(
            &dir.path().join("nope.msgpack"),
            &dir.path().join("nope-either.msgpack"),
            10,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ShieldError::ArtifactMissing { .. }));
    }
}
