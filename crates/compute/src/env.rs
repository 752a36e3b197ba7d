//! Simulated traffic environment used to train the defense policy.
//!
//! Each step the environment applies the agent's mitigation, possibly flips
//! between calm and attack regimes, asks the anomaly scorer for a verdict on
//! the new traffic and pays a reward for the (attack state, action) pair.
//! Episodes never terminate; the training driver decides how many steps to run.

use rand::Rng;
use serde::{Deserialize, Serialize};

use shield_core::{Action, AnomalyVerdict, NormalizedVector, Observation, ShieldError};

use crate::scorer::AnomalyScorer;

/// Reward for blocking while an attack is active.
pub const REWARD_BLOCK_ATTACK: f64 = 20.0;
/// Penalty for only monitoring while an attack is active.
pub const PENALTY_IGNORE_ATTACK: f64 = -20.0;
/// Penalty for blocking calm traffic.
pub const PENALTY_FALSE_BLOCK: f64 = -10.0;
/// Reward for monitoring calm traffic.
pub const REWARD_CALM: f64 = 5.0;
/// Bonus for blocking when the scorer agrees the traffic is anomalous.
pub const BONUS_SCORER_AGREEMENT: f64 = 5.0;

/// Regime-switching dynamics of the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Per-step probability that an attack starts.
    pub attack_start_prob: f64,
    /// Per-step probability that an attack ends (checked only when none started).
    pub attack_end_prob: f64,
    /// Factor applied to traffic and error when an active attack is blocked.
    pub block_damping: f64,
    pub attack_traffic: (f64, f64),
    pub attack_error: (f64, f64),
    pub calm_traffic: (f64, f64),
    /// State after `reset`: (traffic, error, latency).
    pub initial: (f64, f64, f64),
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            attack_start_prob: 0.05,
            attack_end_prob: 0.20,
            block_damping: 0.1,
            attack_traffic: (0.8, 1.0),
            attack_error: (0.2, 0.8),
            calm_traffic: (0.05, 0.2),
            initial: (0.1, 0.0, 0.1),
        }
    }
}

/// Hidden simulator state. Only the traffic features and verdict are observable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub traffic: f64,
    pub error: f64,
    pub latency: f64,
    pub verdict: AnomalyVerdict,
    pub attack_active: bool,
}

impl EpisodeState {
    pub fn observation(&self) -> Observation {
        Observation::build(
            NormalizedVector::new(self.traffic, self.error, self.latency),
            self.verdict,
        )
    }
}

/// Result of one `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    /// Always false: there is no terminal state.
    pub terminated: bool,
    /// Always false: step budgets are enforced by the caller.
    pub truncated: bool,
}

/// Shaped reward for one step. All terms are additive.
pub fn reward(attack_active: bool, action: Action, verdict: AnomalyVerdict) -> f64 {
    let mut total = 0.0;

    if attack_active {
        match action {
            Action::Block => total += REWARD_BLOCK_ATTACK,
            Action::Monitor => total += PENALTY_IGNORE_ATTACK,
            Action::RateLimit => {}
        }
    } else {
        match action {
            Action::Block => total += PENALTY_FALSE_BLOCK,
            Action::Monitor => total += REWARD_CALM,
            Action::RateLimit => {}
        }
    }

    if verdict.is_anomalous() && action == Action::Block {
        total += BONUS_SCORER_AGREEMENT;
    }

    total
}

/// The training environment. Owns its episode state and random source.
pub struct DefenseEnv<'a, S: AnomalyScorer + ?Sized, R: Rng> {
    scorer: &'a S,
    rng: R,
    config: EnvConfig,
    state: EpisodeState,
}

impl<'a, S: AnomalyScorer + ?Sized, R: Rng> DefenseEnv<'a, S, R> {
    pub fn new(scorer: &'a S, rng: R) -> Self {
        Self::with_config(scorer, rng, EnvConfig::default())
    }

    pub fn with_config(scorer: &'a S, rng: R, config: EnvConfig) -> Self {
        let state = Self::calm_state(&config);
        Self {
            scorer,
            rng,
            config,
            state,
        }
    }

    fn calm_state(config: &EnvConfig) -> EpisodeState {
        let (traffic, error, latency) = config.initial;
        EpisodeState {
            traffic,
            error,
            latency,
            verdict: AnomalyVerdict::Normal,
            attack_active: false,
        }
    }

    /// Return to the calm baseline with no attack in progress.
    pub fn reset(&mut self) -> Observation {
        self.state = Self::calm_state(&self.config);
        self.state.observation()
    }

    /// Advance one tick. Fails only when the scorer rejects the features.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, ShieldError> {
        let cfg = &self.config;
        let mut traffic = self.state.traffic;
        let mut error = self.state.error;
        let latency = self.state.latency;

        if self.state.attack_active && action == Action::Block {
            traffic *= cfg.block_damping;
            error *= cfg.block_damping;
        }

        // Two independent draws: the end check only runs when no attack started.
        if self.rng.gen::<f64>() < cfg.attack_start_prob {
            self.state.attack_active = true;
            traffic = self.rng.gen_range(cfg.attack_traffic.0..=cfg.attack_traffic.1);
            error = self.rng.gen_range(cfg.attack_error.0..=cfg.attack_error.1);
        } else if self.rng.gen::<f64>() < cfg.attack_end_prob {
            self.state.attack_active = false;
            traffic = self.rng.gen_range(cfg.calm_traffic.0..=cfg.calm_traffic.1);
            error = 0.0;
        }

        let verdict = self
            .scorer
            .score(&NormalizedVector::new(traffic, error, latency))?;

        self.state.traffic = traffic;
        self.state.error = error;
        self.state.verdict = verdict;

        Ok(StepOutcome {
            observation: self.state.observation(),
            reward: reward(self.state.attack_active, action, verdict),
            terminated: false,
            truncated: false,
        })
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn set_state(&mut self, state: EpisodeState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FixedScorer(AnomalyVerdict);

    impl AnomalyScorer for FixedScorer {
        fn score(&self, _features: &NormalizedVector) -> Result<AnomalyVerdict, ShieldError> {
            Ok(self.0)
        }
    }

    /// Flags anything above calm traffic levels.
    struct TrafficScorer;

    impl AnomalyScorer for TrafficScorer {
        fn score(&self, features: &NormalizedVector) -> Result<AnomalyVerdict, ShieldError> {
            Ok(if features.traffic > 0.5 || features.error > 0.1 {
                AnomalyVerdict::Anomalous
            } else {
                AnomalyVerdict::Normal
            })
        }
    }

    #[test]
    fn reward_table() {
        use AnomalyVerdict::*;
        assert_eq!(reward(true, Action::Block, Normal), 20.0);
        assert_eq!(reward(true, Action::Block, Anomalous), 25.0);
        assert_eq!(reward(true, Action::Monitor, Normal), -20.0);
        assert_eq!(reward(true, Action::RateLimit, Anomalous), 0.0);
        assert_eq!(reward(false, Action::Block, Normal), -10.0);
        assert_eq!(reward(false, Action::Block, Anomalous), -5.0);
        assert_eq!(reward(false, Action::Monitor, Normal), 5.0);
        assert_eq!(reward(false, Action::Monitor, Anomalous), 5.0);
        assert_eq!(reward(false, Action::RateLimit, Normal), 0.0);
    }

    #[test]
    fn blocking_an_attack_is_never_below_twenty() {
        for verdict in [AnomalyVerdict::Normal, AnomalyVerdict::Anomalous] {
            assert!(reward(true, Action::Block, verdict) >= 20.0);
        }
    }

    #[test]
    fn reset_returns_calm_baseline() {
        let scorer = FixedScorer(AnomalyVerdict::Anomalous);
        let mut env = DefenseEnv::new(&scorer, StdRng::seed_from_u64(1));
        for _ in 0..50 {
            env.step(Action::Monitor).unwrap();
        }
        let obs = env.reset();
        assert_eq!(obs.as_array(), [0.1, 0.0, 0.1, 1.0]);
        assert!(!env.state().attack_active);
    }

    #[test]
    fn episodes_never_terminate() {
        let scorer = TrafficScorer;
        let mut env = DefenseEnv::new(&scorer, StdRng::seed_from_u64(2));
        env.reset();
        for i in 0..1000 {
            let out = env.step(Action::ALL[i % 3]).unwrap();
            assert!(!out.terminated && !out.truncated);
        }
    }

    #[test]
    fn latency_is_never_altered() {
        let scorer = TrafficScorer;
        let mut env = DefenseEnv::new(&scorer, StdRng::seed_from_u64(3));
        env.reset();
        for i in 0..500 {
            let out = env.step(Action::ALL[i % 3]).unwrap();
            assert_eq!(out.observation.features.latency, 0.1);
        }
    }

    #[test]
    fn observation_stays_in_bounds() {
        let scorer = TrafficScorer;
        let mut env = DefenseEnv::new(&scorer, StdRng::seed_from_u64(4));
        env.reset();
        for i in 0..2000 {
            let obs = env.step(Action::ALL[(i / 7) % 3]).unwrap().observation.as_array();
            for x in &obs[..3] {
                assert!((0.0..=1.0).contains(x));
            }
            assert!(obs[3] == 1.0 || obs[3] == -1.0);
        }
    }

    #[test]
    fn attack_regime_ranges() {
        let scorer = TrafficScorer;
        let mut env = DefenseEnv::new(&scorer, StdRng::seed_from_u64(5));
        env.reset();
        let mut saw_attack = false;
        let mut prev_active = false;
        for _ in 0..5000 {
            env.step(Action::Monitor).unwrap();
            let s = *env.state();
            if s.attack_active && !prev_active {
                saw_attack = true;
                assert!((0.8..=1.0).contains(&s.traffic), "traffic {}", s.traffic);
                assert!((0.2..=0.8).contains(&s.error), "error {}", s.error);
            }
            if !s.attack_active {
                // Calm traffic never carries errors once it has been resampled.
                assert_eq!(s.error, 0.0);
            }
            prev_active = s.attack_active;
        }
        assert!(saw_attack);
    }

    #[test]
    fn block_dampens_active_attack() {
        let scorer = FixedScorer(AnomalyVerdict::Normal);
        // Probabilities of zero freeze the regime so only mitigation acts.
        let config = EnvConfig {
            attack_start_prob: 0.0,
            attack_end_prob: 0.0,
            ..Default::default()
        };
        let mut env = DefenseEnv::with_config(&scorer, StdRng::seed_from_u64(6), config);
        env.set_state(EpisodeState {
            traffic: 0.9,
            error: 0.5,
            latency: 0.1,
            verdict: AnomalyVerdict::Anomalous,
            attack_active: true,
        });

        let out = env.step(Action::Block).unwrap();
        assert!((out.observation.features.traffic - 0.09).abs() < 1e-12);
        assert!((out.observation.features.error - 0.05).abs() < 1e-12);
        assert_eq!(out.reward, 20.0);

        // Monitoring leaves the flood untouched.
        let out = env.step(Action::Monitor).unwrap();
        assert!((out.observation.features.traffic - 0.09).abs() < 1e-12);
        assert_eq!(out.reward, -20.0);
    }

    #[test]
    fn calm_monitor_with_normal_verdict_pays_five() {
        let scorer = FixedScorer(AnomalyVerdict::Normal);
        let config = EnvConfig {
            attack_start_prob: 0.0,
            ..Default::default()
        };
        let mut env = DefenseEnv::with_config(&scorer, StdRng::seed_from_u64(7), config);
        env.reset();
        for _ in 0..100 {
            assert_eq!(env.step(Action::Monitor).unwrap().reward, 5.0);
        }
    }

    #[test]
    fn blocking_calm_traffic_does_not_dampen() {
        let scorer = FixedScorer(AnomalyVerdict::Normal);
        let config = EnvConfig {
            attack_start_prob: 0.0,
            attack_end_prob: 0.0,
            ..Default::default()
        };
        let mut env = DefenseEnv::with_config(&scorer, StdRng::seed_from_u64(8), config);
        env.reset();
        let out = env.step(Action::Block).unwrap();
        assert_eq!(out.observation.features.traffic, 0.1);
        assert_eq!(out.reward, -10.0);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let scorer = TrafficScorer;
        let run = |seed| {
            let mut env = DefenseEnv::new(&scorer, StdRng::seed_from_u64(seed));
            env.reset();
            (0..300)
                .map(|i| env.step(Action::ALL[i % 3]).unwrap().reward)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(10), run(10));
    }
}
