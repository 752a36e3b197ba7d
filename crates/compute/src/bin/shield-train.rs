//! shield-train: offline training and evaluation for the traffic shield.
//!
//! `train` fits the anomaly scorer on synthetic calm traffic, trains the
//! defense policy in the simulator, writes both artifacts and evaluates the
//! result. `evaluate` reloads saved artifacts and runs a fresh rollout.
//!
//! Unset flags fall back to the environment (`TRAIN_SEED`, `TRAIN_STEPS`,
//! `SCORER_PATH`, `POLICY_PATH`, honoring `SHIELD_PROFILE`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use shield_compute::trainer;
use shield_core::{config, Config};

// ── CLI ─────────────────────────────────────────────────────────────

/// Train and evaluate the traffic shield models.
#[derive(Parser, Debug)]
#[command(name = "shield-train", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Seed for every random stream in the run.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Training budget in environment steps.
    #[arg(long, global = true)]
    steps: Option<usize>,

    /// Where the scorer artifact is written or read.
    #[arg(long, global = true)]
    scorer_path: Option<PathBuf>,

    /// Where the policy artifact is written or read.
    #[arg(long, global = true)]
    policy_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the scorer, train the policy, save both and evaluate.
    Train {
        /// Length of the evaluation rollout that follows training.
        #[arg(long, default_value_t = 2_000)]
        eval_steps: usize,
    },
    /// Load saved artifacts and run a greedy evaluation rollout.
    ///
    /// Uses the same rollout seed as `train`, so matching `--seed` and
    /// `--eval-steps` reproduce the report printed after training.
    Evaluate {
        /// Length of the evaluation rollout.
        #[arg(long, default_value_t = 2_000)]
        eval_steps: usize,
    },
}

impl CommonArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
        if let Some(steps) = self.steps {
            config.training.steps = steps;
        }
        if let Some(path) = &self.scorer_path {
            config.models.scorer_path = path.clone();
        }
        if let Some(path) = &self.policy_path {
            config.models.policy_path = path.clone();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    config::load_dotenv();
    let mut config = Config::from_env();
    cli.common.apply(&mut config);
    config.log_summary();

    let result = match cli.command {
        Command::Train { eval_steps } => run_train(&config, eval_steps),
        Command::Evaluate { eval_steps } => run_evaluate(&config, eval_steps),
    };
    if let Err(e) = &result {
        error!(error = %e, "shield-train failed");
    }
    result
}

fn run_train(config: &Config, eval_steps: usize) -> Result<()> {
    let outcome = trainer::train_and_save(&config.training, &config.models, eval_steps)
        .context("training run failed")?;

    info!(
        scorer = %config.models.scorer_path.display(),
        policy = %config.models.policy_path.display(),
        mean_reward = outcome.training.mean_reward,
        attack_steps = outcome.training.attack_steps,
        action_counts = ?outcome.training.action_counts,
        "models trained and saved"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn run_evaluate(config: &Config, eval_steps: usize) -> Result<()> {
    let report = trainer::evaluate_saved(
        &config.models.scorer_path,
        &config.models.policy_path,
        eval_steps,
        trainer::evaluation_seed(config.training.seed),
    )
    .with_context(|| {
        format!(
            "evaluation of {} + {} failed",
            config.models.scorer_path.display(),
            config.models.policy_path.display()
        )
    })?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
