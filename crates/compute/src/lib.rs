pub mod algorithms;
pub mod artifact;
pub mod env;
pub mod policy;
pub mod scorer;
pub mod service;
pub mod trainer;

pub use algorithms::isolation_forest::{IsolationForest, IsolationForestParams};
pub use algorithms::linear_q::LinearQ;
pub use artifact::{load_artifact, save_artifact, Artifact, ArtifactMeta};
pub use env::{DefenseEnv, EnvConfig, EpisodeState, StepOutcome};
pub use policy::{EvaluationReport, Policy, PolicyTrainingConfig, QPolicy, TrainingReport};
pub use scorer::AnomalyScorer;
pub use service::{Decision, DecisionService};
pub use trainer::TrainingOutcome;
