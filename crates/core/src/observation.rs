use serde::{Deserialize, Serialize};

use crate::features::NormalizedVector;

/// Dimensionality of the policy input.
pub const OBSERVATION_DIM: usize = 4;

/// Binary verdict of the anomaly scorer. Encoded as +1 / -1 in observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyVerdict {
    Normal,
    Anomalous,
}

impl AnomalyVerdict {
    pub fn as_f64(self) -> f64 {
        match self {
            AnomalyVerdict::Normal => 1.0,
            AnomalyVerdict::Anomalous => -1.0,
        }
    }

    pub fn is_anomalous(self) -> bool {
        self == AnomalyVerdict::Anomalous
    }
}

impl std::fmt::Display for AnomalyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyVerdict::Normal => write!(f, "Normal"),
            AnomalyVerdict::Anomalous => write!(f, "Anomaly!"),
        }
    }
}

/// Normalized features fused with the scorer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub features: NormalizedVector,
    pub verdict: AnomalyVerdict,
}

impl Observation {
    pub fn build(features: NormalizedVector, verdict: AnomalyVerdict) -> Self {
        Self { features, verdict }
    }

    /// `[traffic, error, latency, verdict]`, verdict as +1.0 / -1.0.
    pub fn as_array(&self) -> [f64; OBSERVATION_DIM] {
        [
            self.features.traffic,
            self.features.error,
            self.features.latency,
            self.verdict.as_f64(),
        ]
    }
}
