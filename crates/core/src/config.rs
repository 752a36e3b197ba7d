use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub training: TrainingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SHIELD_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SHIELD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            models: ModelConfig::from_env_profiled(p),
            training: TrainingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  models:   scorer={}, policy={}",
            self.models.scorer_path.display(),
            self.models.policy_path.display()
        );
        tracing::info!(
            "  training: seed={}, steps={}, trees={}, contamination={}",
            self.training.seed,
            self.training.steps,
            self.training.n_trees,
            self.training.contamination
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 5000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Model artifacts ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub scorer_path: PathBuf,
    pub policy_path: PathBuf,
}

impl ModelConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            scorer_path: PathBuf::from(profiled_env_or(p, "SCORER_PATH", "models/iso_forest.msgpack")),
            policy_path: PathBuf::from(profiled_env_or(p, "POLICY_PATH", "models/q_policy.msgpack")),
        }
    }
}

// ── Training ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub seed: u64,
    /// Environment steps used to train the policy.
    pub steps: usize,
    /// Synthetic "normal" samples the scorer is fitted on.
    pub baseline_samples: usize,
    pub n_trees: usize,
    pub contamination: f64,
    pub learning_rate: f64,
    pub gamma: f64,
    pub log_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps: 15_000,
            baseline_samples: 1000,
            n_trees: 100,
            contamination: 0.1,
            learning_rate: 0.01,
            gamma: 0.9,
            log_interval: 1000,
        }
    }
}

impl TrainingConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            seed: profiled_env_parse(p, "TRAIN_SEED", d.seed),
            steps: profiled_env_parse(p, "TRAIN_STEPS", d.steps),
            baseline_samples: profiled_env_parse(p, "BASELINE_SAMPLES", d.baseline_samples),
            n_trees: profiled_env_parse(p, "FOREST_TREES", d.n_trees),
            contamination: profiled_env_parse(p, "FOREST_CONTAMINATION", d.contamination),
            learning_rate: profiled_env_parse(p, "POLICY_LEARNING_RATE", d.learning_rate),
            gamma: profiled_env_parse(p, "POLICY_GAMMA", d.gamma),
            log_interval: profiled_env_parse(p, "TRAIN_LOG_INTERVAL", d.log_interval),
        }
    }
}
