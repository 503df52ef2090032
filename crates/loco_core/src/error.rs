use thiserror::Error;

use crate::engine::body::{ObstacleId, UnitId};

/// Errors raised at the API boundary of the locomotion core.
///
/// Movement failures (no path, stuck, clogged goal) are not errors: they are
/// progress states reported through [`crate::MoveEvent`]s.
#[derive(Error, Debug)]
pub enum LocoError {
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    #[error("Unknown obstacle: {0}")]
    UnknownObstacle(ObstacleId),

    #[error("Invalid move profile '{profile}': {reason}")]
    InvalidProfile { profile: String, reason: String },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Snapshot encode error: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    #[error("Snapshot decode error: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),

    #[error("Snapshot version mismatch: found {found}, expected {expected}")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("Scenario parse error: {0}")]
    ScenarioYaml(#[from] serde_yaml::Error),

    #[error("Scenario parse error: {0}")]
    ScenarioJson(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LocoError {
    /// Whether the caller can keep simulating after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            LocoError::UnknownUnit(_) => true,
            LocoError::UnknownObstacle(_) => true,
            LocoError::InvalidProfile { .. } => true,
            LocoError::InvalidScenario(_) => false,
            LocoError::SnapshotVersion { .. } => false,
            LocoError::SnapshotDecode(_) => false,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LocoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_unit_is_recoverable() {
        let err = LocoError::UnknownUnit(UnitId(4));
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Unknown unit: unit#4");
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let err = LocoError::SnapshotVersion { found: 9, expected: 1 };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("found 9"));
    }
}
