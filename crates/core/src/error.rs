use crate::types::DbId;

/// Domain error shared by every SyncBridge crate.
///
/// The variants follow the failure taxonomy of the data-movement core:
/// caller-fixable validation problems, malformed source data, transient
/// connectivity failures, secondary failures during compensation, and
/// tenant/ownership mismatches.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Bad shape or missing required field. Never retried automatically.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed source data. The message names the offending identifier.
    #[error("Transform failed: {0}")]
    Transform(String),

    /// Transient failure talking to a connector or the queue substrate.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Secondary failure while compensating. Logged, never surfaced in place
    /// of the primary error.
    #[error("Rollback failed: {0}")]
    Rollback(String),

    /// Tenant or ownership mismatch. Fails closed.
    #[error("Forbidden: {0}")]
    Authorization(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the failure is worth retrying by the queue substrate.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

/// Convenience alias for results carrying a [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_is_transient() {
        assert!(CoreError::Connectivity("timeout".into()).is_transient());
        assert!(!CoreError::Validation("bad".into()).is_transient());
        assert!(!CoreError::Rollback("delete failed".into()).is_transient());
    }

    #[test]
    fn display_includes_context() {
        let err = CoreError::NotFound {
            entity: "SyncJob",
            id: 7,
        };
        assert_eq!(err.to_string(), "Entity not found: SyncJob with id 7");
    }
}
