//! On-disk model artifacts.
//!
//! A trained scorer or policy is written as a MessagePack envelope that
//! records what kind of model it holds, the format version, and when it was
//! produced. Loading checks both the kind and the version before decoding the
//! payload, so a policy file can never be loaded as a scorer. A decoded model
//! must also match the feature and action layout the service is built for.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use shield_core::{ShieldError, ACTION_COUNT, FEATURE_COUNT};

use crate::algorithms::isolation_forest::IsolationForest;
use crate::policy::{QPolicy, POLICY_FEATURES};

/// Current envelope layout. Bump when payload encodings change.
pub const FORMAT_VERSION: u16 = 1;

/// A model type that can be persisted as an artifact.
pub trait Artifact: Serialize + DeserializeOwned {
    /// Stable tag stored in the envelope.
    const KIND: &'static str;

    /// Shape check run on every decoded model before it is handed out.
    fn validate(&self) -> Result<(), ShieldError> {
        Ok(())
    }
}

impl Artifact for IsolationForest {
    const KIND: &'static str = "scorer";

    fn validate(&self) -> Result<(), ShieldError> {
        if self.dim() != FEATURE_COUNT {
            return Err(ShieldError::ArtifactMismatch {
                expected: format!("scorer over {} features", FEATURE_COUNT),
                found: format!("scorer over {} features", self.dim()),
            });
        }
        Ok(())
    }
}

impl Artifact for QPolicy {
    const KIND: &'static str = "policy";

    fn validate(&self) -> Result<(), ShieldError> {
        let q = self.q();
        if q.n_actions() != ACTION_COUNT {
            return Err(ShieldError::ArtifactMismatch {
                expected: format!("policy over {} actions", ACTION_COUNT),
                found: format!("policy over {} actions", q.n_actions()),
            });
        }
        let ragged = q.weights().iter().any(|row| row.len() != q.n_features());
        if ragged || q.n_features() != POLICY_FEATURES {
            let lengths: Vec<usize> = q.weights().iter().map(Vec::len).collect();
            return Err(ShieldError::ArtifactMismatch {
                expected: format!("weight rows of length {}", POLICY_FEATURES),
                found: format!("weight rows of lengths {:?}", lengths),
            });
        }
        Ok(())
    }
}

/// Envelope metadata, available without decoding the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub kind: String,
    pub format_version: u16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kind: String,
    format_version: u16,
    created_at: DateTime<Utc>,
    #[serde(with = "raw_bytes")]
    payload: Vec<u8>,
}

impl Envelope {
    fn meta(&self) -> ArtifactMeta {
        ArtifactMeta {
            kind: self.kind.clone(),
            format_version: self.format_version,
            created_at: self.created_at,
        }
    }
}

/// Serialize `model` and write it to `path`, creating parent directories.
pub fn save_artifact<T: Artifact>(model: &T, path: &Path) -> Result<ArtifactMeta, ShieldError> {
    let payload = rmp_serde::to_vec(model).map_err(|e| ShieldError::Serialize(e.to_string()))?;
    let envelope = Envelope {
        kind: T::KIND.to_string(),
        format_version: FORMAT_VERSION,
        created_at: Utc::now(),
        payload,
    };
    let bytes =
        rmp_serde::to_vec_named(&envelope).map_err(|e| ShieldError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, &bytes)?;

    info!(kind = T::KIND, path = %path.display(), bytes = bytes.len(), "artifact saved");
    Ok(envelope.meta())
}

/// Read and validate an artifact, returning the decoded model and its metadata.
pub fn load_artifact<T: Artifact>(path: &Path) -> Result<(T, ArtifactMeta), ShieldError> {
    if !path.exists() {
        return Err(ShieldError::ArtifactMissing {
            kind: T::KIND.to_string(),
            path: path.display().to_string(),
        });
    }

    let bytes = fs::read(path)?;
    let envelope: Envelope =
        rmp_serde::from_slice(&bytes).map_err(|e| ShieldError::Serialize(e.to_string()))?;

    if envelope.kind != T::KIND {
        return Err(ShieldError::ArtifactMismatch {
            expected: T::KIND.to_string(),
            found: envelope.kind,
        });
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(ShieldError::ArtifactMismatch {
            expected: format!("{} v{}", T::KIND, FORMAT_VERSION),
            found: format!("{} v{}", envelope.kind, envelope.format_version),
        });
    }

    let model: T = rmp_serde::from_slice(&envelope.payload)
        .map_err(|e| ShieldError::Serialize(e.to_string()))?;
    model.validate()?;

    info!(
        kind = T::KIND,
        path = %path.display(),
        created_at = %envelope.created_at,
        "artifact loaded"
    );
    Ok((model, envelope.meta()))
}

/// Encode `Vec<u8>` as a MessagePack bin rather than an array of integers.
mod raw_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shield_core::{AnomalyVerdict, NormalizedVector, Observation};

    use crate::algorithms::isolation_forest::IsolationForestParams;
    use crate::algorithms::linear_q::LinearQ;
    use crate::policy::Policy;
    use crate::scorer::{fit_scorer, generate_baseline, AnomalyScorer};

    fn small_forest() -> IsolationForest {
        let mut rng = StdRng::seed_from_u64(42);
        let baseline = generate_baseline(300, &mut rng).unwrap();
        let params = IsolationForestParams {
            n_trees: 20,
            ..Default::default()
        };
        fit_scorer(&baseline, &params, &mut rng).unwrap()
    }

    #[test]
    fn scorer_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/models/scorer.msgpack");
        let forest = small_forest();

        let saved = save_artifact(&forest, &path).unwrap();
        assert_eq!(saved.kind, "scorer");
        assert_eq!(saved.format_version, FORMAT_VERSION);

        let (loaded, meta): (IsolationForest, _) = load_artifact(&path).unwrap();
        assert_eq!(meta, saved);
        for v in [
            NormalizedVector::new(0.1, 0.0, 0.1),
            NormalizedVector::new(1.0, 0.01, 0.05),
            NormalizedVector::new(0.5, 0.3, 0.2),
        ] {
            assert_eq!(loaded.score(&v).unwrap(), forest.score(&v).unwrap());
        }
    }

    #[test]
    fn policy_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.msgpack");
        let policy = QPolicy::from_q(LinearQ::from_weights(vec![
            vec![5.0, -2.0, -4.0, 0.0, 1.0],
            vec![0.0; 5],
            vec![-8.0, 10.0, 12.0, 0.0, -3.0],
        ]));
        save_artifact(&policy, &path).unwrap();

        let (loaded, _): (QPolicy, _) = load_artifact(&path).unwrap();
        assert_eq!(loaded, policy);
        let o = Observation::build(NormalizedVector::new(1.0, 0.5, 0.1), AnomalyVerdict::Anomalous);
        assert_eq!(loaded.predict(&o), policy.predict(&o));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.msgpack");
        let err = load_artifact::<QPolicy>(&path).unwrap_err();
        assert!(matches!(err, ShieldError::ArtifactMissing { ref kind, .. } if kind == "policy"));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.msgpack");
        save_artifact(&QPolicy::new(), &path).unwrap();

        let err = load_artifact::<IsolationForest>(&path).unwrap_err();
        match err {
            ShieldError::ArtifactMismatch { expected, found } => {
                assert_eq!(expected, "scorer");
                assert_eq!(found, "policy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn future_format_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.msgpack");
        let envelope = Envelope {
            kind: "policy".to_string(),
            format_version: FORMAT_VERSION + 1,
            created_at: Utc::now(),
            payload: rmp_serde::to_vec(&QPolicy::new()).unwrap(),
        };
        fs::write(&path, rmp_serde::to_vec_named(&envelope).unwrap()).unwrap();

        let err = load_artifact::<QPolicy>(&path).unwrap_err();
        assert!(matches!(err, ShieldError::ArtifactMismatch { .. }));
    }

    #[test]
    fn scorer_with_wrong_dimension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scorer.msgpack");
        let mut rng = StdRng::seed_from_u64(3);
        let points: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64 / 64.0; 5]).collect();
        let params = IsolationForestParams {
            n_trees: 10,
            ..Default::default()
        };
        let forest = IsolationForest::fit(&points, &params, &mut rng).unwrap();
        save_artifact(&forest, &path).unwrap();

        let err = load_artifact::<IsolationForest>(&path).unwrap_err();
        match err {
            ShieldError::ArtifactMismatch { expected, found } => {
                assert_eq!(expected, "scorer over 3 features");
                assert_eq!(found, "scorer over 5 features");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn policy_with_wrong_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.msgpack");

        let two_actions = QPolicy::from_q(LinearQ::from_weights(vec![vec![0.0; 5]; 2]));
        save_artifact(&two_actions, &path).unwrap();
        let err = load_artifact::<QPolicy>(&path).unwrap_err();
        assert!(matches!(err, ShieldError::ArtifactMismatch { ref found, .. } if found.contains("2 actions")));

        let short_rows = QPolicy::from_q(LinearQ::from_weights(vec![vec![0.0; 4]; 3]));
        save_artifact(&short_rows, &path).unwrap();
        let err = load_artifact::<QPolicy>(&path).unwrap_err();
        assert!(matches!(err, ShieldError::ArtifactMismatch { .. }));

        let ragged = QPolicy::from_q(LinearQ::from_weights(vec![
            vec![0.0; 5],
            vec![0.0; 5],
            vec![0.0; 6],
        ]));
        save_artifact(&ragged, &path).unwrap();
        let err = load_artifact::<QPolicy>(&path).unwrap_err();
        assert!(matches!(err, ShieldError::ArtifactMismatch { .. }));
    }

    #[test]
    fn garbage_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.msgpack");
        fs::write(&path, b"not messagepack at all").unwrap();
        let err = load_artifact::<QPolicy>(&path).unwrap_err();
        assert!(matches!(err, ShieldError::Serialize(_)));
    }
}
