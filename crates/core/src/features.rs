//! Raw traffic metrics and their bounded feature representation.

use serde::{Deserialize, Serialize};

/// Request count that maps to a fully saturated traffic feature.
pub const REQUESTS_SCALE: f64 = 8000.0;

/// Latency (milliseconds) that maps to a fully saturated latency feature.
pub const LATENCY_SCALE_MS: f64 = 1000.0;

/// Number of features in a [`NormalizedVector`].
pub const FEATURE_COUNT: usize = 3;

/// One telemetry reading as reported by a monitored site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetrics {
    pub requests: f64,
    pub error_rate: f64,
    #[serde(rename = "latency")]
    pub latency_ms: f64,
}

impl RawMetrics {
    pub fn new(requests: f64, error_rate: f64, latency_ms: f64) -> Self {
        Self {
            requests,
            error_rate,
            latency_ms,
        }
    }

    pub fn normalize(&self) -> NormalizedVector {
        normalize(self.requests, self.error_rate, self.latency_ms)
    }
}

/// Traffic, error and latency features, each capped at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVector {
    pub traffic: f64,
    pub error: f64,
    pub latency: f64,
}

impl NormalizedVector {
    pub fn new(traffic: f64, error: f64, latency: f64) -> Self {
        Self {
            traffic,
            error,
            latency,
        }
    }

    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [self.traffic, self.error, self.latency]
    }
}

impl From<[f64; FEATURE_COUNT]> for NormalizedVector {
    fn from(v: [f64; FEATURE_COUNT]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Scale raw metrics into the bounded feature space.
///
/// Negative inputs are not validated; callers supply non-negative metrics.
pub fn normalize(requests: f64, error_rate: f64, latency_ms: f64) -> NormalizedVector {
    NormalizedVector {
        traffic: (requests / REQUESTS_SCALE).min(1.0),
        error: error_rate.min(1.0),
        latency: (latency_ms / LATENCY_SCALE_MS).min(1.0),
    }
}
