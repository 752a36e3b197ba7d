use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use shield_core::{AnomalyVerdict, ShieldError};

/// Euler–Mascheroni constant, used in the harmonic number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation Forest hyper-parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestParams {
    /// Number of isolation trees.
    pub n_trees: usize,
    /// Subsample size per tree (capped at the number of training points).
    pub max_samples: usize,
    /// Expected fraction of outliers in the training set, in (0, 0.5].
    pub contamination: f64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// One isolation tree, stored as a flat node arena rooted at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow<R: Rng + ?Sized>(
        points: &[Vec<f64>],
        sample: Vec<usize>,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(points, sample, 0, max_depth, rng);
        tree
    }

    /// Append the subtree for `indices` and return its node index.
    fn grow_node<R: Rng + ?Sized>(
        &mut self,
        points: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: indices.len() });

        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can isolate anything.
        let dim = points[indices[0]].len();
        let mut candidates = Vec::with_capacity(dim);
        for f in 0..dim {
            let (lo, hi) = feature_range(points, &indices, f);
            if hi > lo {
                candidates.push((f, lo, hi));
            }
        }
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let value = rng.gen_range(lo..hi);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| points[i][feature] < value);

        let left = self.grow_node(points, left_idx, depth + 1, max_depth, rng);
        let right = self.grow_node(points, right_idx, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            value,
            left,
            right,
        };
        id
    }

    /// Path length of `x`, with the expected remaining depth added at the leaf.
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if x[*feature] < *value { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// A fitted Isolation Forest.
///
/// Points that are isolated in fewer random splits than typical training
/// points get a higher anomaly score. The decision threshold is the
/// `1 - contamination` quantile of the training scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    dim: usize,
    threshold: f64,
}

impl IsolationForest {
    /// Fit a forest on `points`.
    ///
    /// Fails if fewer than two points are given, the points have inconsistent
    /// dimensions, or the parameters are out of range.
    pub fn fit<R: Rng + ?Sized>(
        points: &[Vec<f64>],
        params: &IsolationForestParams,
        rng: &mut R,
    ) -> Result<Self, ShieldError> {
        if points.len() < 2 {
            return Err(ShieldError::InvalidParameter(format!(
                "isolation forest needs at least 2 points, got {}",
                points.len()
            )));
        }
        if params.n_trees == 0 || params.max_samples < 2 {
            return Err(ShieldError::InvalidParameter(
                "n_trees must be >= 1 and max_samples >= 2".to_string(),
            ));
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(ShieldError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                params.contamination
            )));
        }
        let dim = points[0].len();
        if dim == 0 || points.iter().any(|p| p.len() != dim) {
            return Err(ShieldError::InvalidParameter(
                "all points must share the same non-zero dimension".to_string(),
            ));
        }

        let sample_size = params.max_samples.min(points.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..params.n_trees)
            .map(|_| {
                let sample = index::sample(rng, points.len(), sample_size).into_vec();
                IsolationTree::grow(points, sample, max_depth, rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            dim,
            threshold: 0.0,
        };

        let mut scores = points
            .iter()
            .map(|p| forest.score_sample(p))
            .collect::<Result<Vec<f64>, _>>()?;
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        forest.threshold = quantile(&scores, 1.0 - params.contamination);

        Ok(forest)
    }

    /// Anomaly score in (0, 1]. Higher is more anomalous.
    ///
    /// Fails with [`ShieldError::Scoring`] if `x` does not have the fitted dimension.
    pub fn score_sample(&self, x: &[f64]) -> Result<f64, ShieldError> {
        if x.len() != self.dim {
            return Err(ShieldError::Scoring(format!(
                "expected a {}-dimensional feature vector, got {}",
                self.dim,
                x.len()
            )));
        }
        let mean_path: f64 =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        Ok(2f64.powf(-mean_path / average_path_length(self.sample_size)))
    }

    pub fn predict(&self, x: &[f64]) -> Result<AnomalyVerdict, ShieldError> {
        Ok(if self.score_sample(x)? > self.threshold {
            AnomalyVerdict::Anomalous
        } else {
            AnomalyVerdict::Normal
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

// ── Internal helpers ─────────────────────────────────────────

/// Average path length of an unsuccessful BST search over `n` points, c(n).
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + EULER_GAMMA;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}

fn feature_range(points: &[Vec<f64>], indices: &[usize], feature: usize) -> (f64, f64) {
    indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
        let v = points[i][feature];
        (lo.min(v), hi.max(v))
    })
}

/// Linearly interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
