use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// How a rejected remote write failed. Uniqueness violations get their own
/// case so callers can tell "duplicate number" apart from a generic rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteFailureKind {
    UniqueViolation,
    Rejected,
}

impl std::fmt::Display for WriteFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UniqueViolation => write!(f, "unique violation"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Error taxonomy for the core engine.
///
/// Remote failures funnel through the collection syncer, which reloads the
/// authoritative snapshot before surfacing the error. Guard violations are
/// raised before any write is attempted. Nothing here is retried
/// automatically; the caller re-triggers the action.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Remote store unreachable or misconfigured. Fatal for the current
    /// operation; no further writes are attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No tenant id could be resolved for the caller. The write path is
    /// aborted; read-only reloads remain possible.
    #[error("Tenant resolution error: {0}")]
    TenantResolution(String),

    /// The remote store rejected an insert, update, or delete.
    #[error("Remote write failed ({kind}): {detail}")]
    RemoteWrite {
        kind: WriteFailureKind,
        detail: String,
    },

    /// A lifecycle transition's precondition does not hold. Rejected before
    /// any write, so no partial mutation exists.
    #[error("Guard violation: {0}")]
    GuardViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn not_found(entity: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{} {} not found", entity, id))
    }

    /// True when the failure was a uniqueness violation on the remote store.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::RemoteWrite {
                kind: WriteFailureKind::UniqueViolation,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_distinguishable() {
        let err = CoreError::RemoteWrite {
            kind: WriteFailureKind::UniqueViolation,
            detail: "order_number WO-0001 already exists".into(),
        };
        assert!(err.is_unique_violation());

        let err = CoreError::RemoteWrite {
            kind: WriteFailureKind::Rejected,
            detail: "row too large".into(),
        };
        assert!(!err.is_unique_violation());
    }
}
