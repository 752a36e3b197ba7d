use serde::{Deserialize, Serialize};

/// Action-value function that is linear in a fixed feature vector.
///
/// Q(s, a) = w_a · φ(s). The feature map is supplied by the caller, so the
/// first component is usually a constant 1.0 bias term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearQ {
    /// One weight row per action.
    weights: Vec<Vec<f64>>,
}

impl LinearQ {
    /// Zero-initialized weights for `n_actions` actions over `n_features` features.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(n_actions: usize, n_features: usize) -> Self {
        assert!(n_actions >= 1, "n_actions must be at least 1");
        assert!(n_features >= 1, "n_features must be at least 1");
        Self {
            weights: vec![vec![0.0; n_features]; n_actions],
        }
    }

    pub fn from_weights(weights: Vec<Vec<f64>>) -> Self {
        assert!(!weights.is_empty(), "weights must not be empty");
        Self { weights }
    }

    pub fn n_actions(&self) -> usize {
        self.weights.len()
    }

    pub fn n_features(&self) -> usize {
        self.weights[0].len()
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn q_value(&self, features: &[f64], action: usize) -> f64 {
        dot(&self.weights[action], features)
    }

    pub fn q_values(&self, features: &[f64]) -> Vec<f64> {
        self.weights.iter().map(|w| dot(w, features)).collect()
    }

    /// Greedy action. Ties resolve to the lowest index.
    pub fn argmax(&self, features: &[f64]) -> usize {
        let mut best = 0;
        let mut best_q = f64::NEG_INFINITY;
        for (a, w) in self.weights.iter().enumerate() {
            let q = dot(w, features);
            if q > best_q {
                best_q = q;
                best = a;
            }
        }
        best
    }

    pub fn max_q(&self, features: &[f64]) -> f64 {
        self.weights
            .iter()
            .map(|w| dot(w, features))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Semi-gradient TD update of one action's weights toward `target`.
    ///
    /// Returns the TD error before the update.
    pub fn update(&mut self, features: &[f64], action: usize, target: f64, learning_rate: f64) -> f64 {
        let td_error = target - self.q_value(features, action);
        for (w, x) in self.weights[action].iter_mut().zip(features) {
            *w += learning_rate * td_error * x;
        }
        td_error
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
