use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShieldError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("{kind} artifact not found at {path}")]
    ArtifactMissing { kind: String, path: String },

    #[error("Artifact mismatch: expected {expected}, found {found}")]
    ArtifactMismatch { expected: String, found: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Policy returned invalid action code {0}")]
    InvalidActionCode(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ShieldError {
    /// True for errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ShieldError::MalformedRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, ShieldError>;
