//! Defense policy: capability trait, linear Q implementation, and the
//! Q-learning loop that trains it against [`DefenseEnv`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use shield_core::{Action, Observation, ShieldError, ACTION_COUNT, OBSERVATION_DIM};

use crate::algorithms::linear_q::LinearQ;
use crate::env::DefenseEnv;
use crate::scorer::AnomalyScorer;

/// Length of the policy feature vector: a bias term plus the observation.
pub const POLICY_FEATURES: usize = OBSERVATION_DIM + 1;

/// Maps an observation to a raw action code.
///
/// Implementations must be deterministic for fixed parameters and must not
/// mutate themselves during `predict`. Codes outside the action set are
/// rejected by the caller, not silently mapped.
pub trait Policy: Send + Sync {
    fn predict(&self, observation: &Observation) -> usize;
}

/// Greedy policy over a linear action-value function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QPolicy {
    q: LinearQ,
}

impl Default for QPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl QPolicy {
    pub fn new() -> Self {
        Self {
            q: LinearQ::new(ACTION_COUNT, POLICY_FEATURES),
        }
    }

    pub fn from_q(q: LinearQ) -> Self {
        Self { q }
    }

    pub fn q(&self) -> &LinearQ {
        &self.q
    }

    /// `[1, traffic, error, latency, verdict]`.
    pub fn features(observation: &Observation) -> [f64; POLICY_FEATURES] {
        let [t, e, l, v] = observation.as_array();
        [1.0, t, e, l, v]
    }

    /// Greedy action as a typed [`Action`].
    pub fn act(&self, observation: &Observation) -> Result<Action, ShieldError> {
        Action::try_from(self.predict(observation))
    }
}

impl Policy for QPolicy {
    fn predict(&self, observation: &Observation) -> usize {
        self.q.argmax(&Self::features(observation))
    }
}

/// Hyper-parameters of the Q-learning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTrainingConfig {
    pub steps: usize,
    pub learning_rate: f64,
    pub gamma: f64,
    pub epsilon_start: f64,
    pub epsilon_end: f64,
    /// Share of `steps` over which epsilon decays linearly.
    pub exploration_fraction: f64,
    /// Steps between progress log lines (0 disables them).
    pub log_interval: usize,
}

impl Default for PolicyTrainingConfig {
    fn default() -> Self {
        Self {
            steps: 15_000,
            learning_rate: 0.01,
            gamma: 0.9,
            epsilon_start: 1.0,
            epsilon_end: 0.05,
            exploration_fraction: 0.5,
            log_interval: 1000,
        }
    }
}

impl PolicyTrainingConfig {
    fn validate(&self) -> Result<(), ShieldError> {
        if self.steps == 0 {
            return Err(ShieldError::InvalidParameter("steps must be > 0".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ShieldError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.gamma) {
            return Err(ShieldError::InvalidParameter(format!(
                "gamma must be in [0, 1), got {}",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon_start) || !(0.0..=1.0).contains(&self.epsilon_end) {
            return Err(ShieldError::InvalidParameter("epsilon must be in [0, 1]".to_string()));
        }
        Ok(())
    }

    /// Exploration rate at `step`.
    pub fn epsilon_at(&self, step: usize) -> f64 {
        let decay_steps = (self.steps as f64 * self.exploration_fraction).max(1.0);
        let progress = (step as f64 / decay_steps).min(1.0);
        self.epsilon_start + (self.epsilon_end - self.epsilon_start) * progress
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub steps: usize,
    pub total_reward: f64,
    pub mean_reward: f64,
    pub attack_steps: usize,
    /// Times each action was taken, indexed by action code.
    pub action_counts: [usize; ACTION_COUNT],
}

/// Train a [`QPolicy`] with epsilon-greedy semi-gradient Q-learning.
///
/// Runs one continuous episode: the environment is reset once and stepped
/// `config.steps` times.
pub fn train_policy<S, R, X>(
    env: &mut DefenseEnv<'_, S, R>,
    config: &PolicyTrainingConfig,
    explore_rng: &mut X,
) -> Result<(QPolicy, TrainingReport), ShieldError>
where
    S: AnomalyScorer + ?Sized,
    R: Rng,
    X: Rng + ?Sized,
{
    config.validate()?;

    let mut policy = QPolicy::new();
    let mut observation = env.reset();

    let mut total_reward = 0.0;
    let mut window_reward = 0.0;
    let mut attack_steps = 0;
    let mut action_counts = [0usize; ACTION_COUNT];

    for step in 0..config.steps {
        let epsilon = config.epsilon_at(step);
        let action = if explore_rng.gen::<f64>() < epsilon {
            Action::ALL[explore_rng.gen_range(0..ACTION_COUNT)]
        } else {
            policy.act(&observation)?
        };

        let outcome = env.step(action)?;
        let phi = QPolicy::features(&observation);
        let next_phi = QPolicy::features(&outcome.observation);
        // Episodes never terminate, so every transition bootstraps.
        let target = outcome.reward + config.gamma * policy.q.max_q(&next_phi);
        let td_error = policy.q.update(&phi, action.index(), target, config.learning_rate);

        total_reward += outcome.reward;
        window_reward += outcome.reward;
        action_counts[action.index()] += 1;
        if env.state().attack_active {
            attack_steps += 1;
        }
        observation = outcome.observation;

        if config.log_interval > 0 && (step + 1) % config.log_interval == 0 {
            info!(
                step = step + 1,
                epsilon,
                mean_reward = window_reward / config.log_interval as f64,
                "policy training progress"
            );
            debug!(td_error, weights = ?policy.q.weights(), "policy weights");
            window_reward = 0.0;
        }
    }

    let report = TrainingReport {
        steps: config.steps,
        total_reward,
        mean_reward: total_reward / config.steps as f64,
        attack_steps,
        action_counts,
    };
    info!(
        steps = report.steps,
        mean_reward = report.mean_reward,
        attack_steps = report.attack_steps,
        "policy training complete"
    );

    Ok((policy, report))
}

/// Greedy rollout statistics for a trained policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub steps: usize,
    pub mean_reward: f64,
    /// Action counts while an attack was active, indexed by action code.
    pub attack_actions: [usize; ACTION_COUNT],
    /// Action counts while traffic was calm, indexed by action code.
    pub calm_actions: [usize; ACTION_COUNT],
}

impl EvaluationReport {
    /// Share of attack steps on which the policy blocked.
    pub fn block_rate_under_attack(&self) -> f64 {
        ratio(self.attack_actions[Action::Block.index()], self.attack_actions.iter().sum())
    }

    /// Share of calm steps on which the policy blocked.
    pub fn false_block_rate(&self) -> f64 {
        ratio(self.calm_actions[Action::Block.index()], self.calm_actions.iter().sum())
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Run `steps` greedy steps of `policy` and tally its behavior per regime.
///
/// The regime used for tallying is the one in force when the action was
/// chosen, i.e. before the environment transitions.
pub fn evaluate_policy<P, S, R>(
    policy: &P,
    env: &mut DefenseEnv<'_, S, R>,
    steps: usize,
) -> Result<EvaluationReport, ShieldError>
where
    P: Policy + ?Sized,
    S: AnomalyScorer + ?Sized,
    R: Rng,
{
    let mut observation = env.reset();
    let mut total_reward = 0.0;
    let mut attack_actions = [0usize; ACTION_COUNT];
    let mut calm_actions = [0usize; ACTION_COUNT];

    for _ in 0..steps {
        let action = Action::try_from(policy.predict(&observation))?;
        if env.state().attack_active {
            attack_actions[action.index()] += 1;
        } else {
            calm_actions[action.index()] += 1;
        }
        let outcome = env.step(action)?;
        total_reward += outcome.reward;
        observation = outcome.observation;
    }

    Ok(EvaluationReport {
        steps,
        mean_reward: ratio_f64(total_reward, steps),
        attack_actions,
        calm_actions,
    })
}

fn ratio_f64(total: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}
