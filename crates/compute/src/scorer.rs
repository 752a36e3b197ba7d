//! Anomaly scorer capability and the synthetic baseline it is fitted on.
//!
//! The scorer is fitted once, offline, on "normal" traffic drawn around a
//! calm operating point, and afterwards only answers normal / anomalous.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use shield_core::{AnomalyVerdict, NormalizedVector, ShieldError, FEATURE_COUNT};

use crate::algorithms::isolation_forest::{IsolationForest, IsolationForestParams};

/// Centre of the synthetic calm-traffic distribution: (traffic, error, latency).
pub const BASELINE_MEAN: [f64; FEATURE_COUNT] = [0.1, 0.0, 0.1];

/// Per-feature spread of the synthetic calm-traffic distribution.
pub const BASELINE_STD: [f64; FEATURE_COUNT] = [0.05, 0.01, 0.05];

/// Binary classifier over normalized feature vectors.
///
/// Implemented by [`IsolationForest`] and test doubles. `score` must be a pure
/// function of the fitted state so one scorer can serve concurrent requests.
/// Failures are reported as [`ShieldError::Scoring`].
pub trait AnomalyScorer: Send + Sync {
    fn score(&self, features: &NormalizedVector) -> Result<AnomalyVerdict, ShieldError>;
}

impl AnomalyScorer for IsolationForest {
    fn score(&self, features: &NormalizedVector) -> Result<AnomalyVerdict, ShieldError> {
        self.predict(&features.as_array())
    }
}

/// Draw `n` calm-traffic vectors, each component clipped into [0, 1].
pub fn generate_baseline<R: Rng + ?Sized>(
    n: usize,
    rng: &mut R,
) -> Result<Vec<NormalizedVector>, ShieldError> {
    let dists = BASELINE_MEAN
        .iter()
        .zip(BASELINE_STD.iter())
        .map(|(&mean, &std)| {
            Normal::new(mean, std).map_err(|e| ShieldError::InvalidParameter(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((0..n)
        .map(|_| {
            NormalizedVector::new(
                dists[0].sample(rng).clamp(0.0, 1.0),
                dists[1].sample(rng).clamp(0.0, 1.0),
                dists[2].sample(rng).clamp(0.0, 1.0),
            )
        })
        .collect())
}

/// Fit an isolation forest scorer on a set of normalized vectors.
pub fn fit_scorer<R: Rng + ?Sized>(
    samples: &[NormalizedVector],
    params: &IsolationForestParams,
    rng: &mut R,
) -> Result<IsolationForest, ShieldError> {
    let points: Vec<Vec<f64>> = samples.iter().map(|v| v.as_array().to_vec()).collect();
    let forest = IsolationForest::fit(&points, params, rng)?;
    info!(
        samples = samples.len(),
        trees = forest.n_trees(),
        threshold = forest.threshold(),
        "isolation forest fitted on baseline traffic"
    );
    Ok(forest)
}
