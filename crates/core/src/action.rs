use serde::{Deserialize, Serialize};

use crate::error::ShieldError;

/// Number of discrete actions the policy chooses between.
pub const ACTION_COUNT: usize = 3;

/// Defensive action, ordered by increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Monitor = 0,
    RateLimit = 1,
    Block = 2,
}

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [Action::Monitor, Action::RateLimit, Action::Block];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn result(self) -> DecisionResult {
        match self {
            Action::Block => DecisionResult {
                threat_level: ThreatLevel::High,
                status: Status::Critical,
                action: "IP Blocked".to_string(),
            },
            Action::RateLimit => DecisionResult {
                threat_level: ThreatLevel::Medium,
                status: Status::Warning,
                action: "Rate Limit".to_string(),
            },
            Action::Monitor => DecisionResult {
                threat_level: ThreatLevel::Low,
                status: Status::Active,
                action: "Monitor".to_string(),
            },
        }
    }
}

impl TryFrom<usize> for Action {
    type Error = ShieldError;

    fn try_from(code: usize) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Action::Monitor),
            1 => Ok(Action::RateLimit),
            2 => Ok(Action::Block),
            other => Err(ShieldError::InvalidActionCode(other)),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Monitor => write!(f, "Monitor"),
            Action::RateLimit => write!(f, "RateLimit"),
            Action::Block => write!(f, "Block"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Warning,
    Critical,
}

/// Response body returned to the caller for one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    pub threat_level: ThreatLevel,
    pub status: Status,
    pub action: String,
}
