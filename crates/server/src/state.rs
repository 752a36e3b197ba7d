use shield_compute::{ArtifactMeta, DecisionService};

/// Shared, read-only server state. Built once at startup.
pub struct AppState {
    pub decisions: DecisionService,
    pub scorer: ArtifactMeta,
    pub policy: ArtifactMeta,
}
