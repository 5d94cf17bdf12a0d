//! Error types for the dossier workflow

use crate::{DossierId, DossierStatus, UserId};

/// Errors that can occur in workflow operations
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    /// Unknown dossier, category or check item
    #[error("Invalid reference: {entity} '{id}'")]
    InvalidReference { entity: &'static str, id: String },

    /// The caller's role or identity does not allow the operation
    #[error("Forbidden for {user}: {reason}")]
    Forbidden { user: UserId, reason: String },

    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition {
        from: DossierStatus,
        to: DossierStatus,
    },

    /// The checklist gate is closed; `missing` lists what to complete
    #[error("Validation gate not met: {}", missing.join(", "))]
    ValidationGateNotMet { missing: Vec<String> },

    /// Another caller changed the dossier first; re-fetch and retry
    #[error("Concurrent modification of dossier {0}")]
    ConcurrentModification(DossierId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dossier {id} is not ready for reconciliation (status {status})")]
    NotReadyForReconciliation { id: DossierId, status: DossierStatus },

    /// Comptabilization submission failed; the local transition stands
    #[error("External submission failed for dossier {id}: {reason}")]
    ExternalSubmissionFailed { id: DossierId, reason: String },

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for DossierError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { id, .. } => Self::ConcurrentModification(id),
            other => Self::Storage(other),
        }
    }
}

impl DossierError {
    pub fn invalid_reference(entity: &'static str, id: impl ToString) -> Self {
        Self::InvalidReference {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(user: &UserId, reason: impl Into<String>) -> Self {
        Self::Forbidden {
            user: user.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry with fresh state
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// Result type alias for workflow operations
pub type DossierResult<T> = Result<T, DossierError>;

/// Storage-layer errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Optimistic-concurrency check failed
    #[error("version conflict on dossier {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: DossierId,
        expected: u64,
        found: u64,
    },

    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised while building or loading the checklist catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Duplicate category id: {0}")]
    DuplicateCategory(String),

    #[error("Duplicate check item id: {0}")]
    DuplicateItem(String),

    #[error("Category '{0}' has no check items")]
    EmptyCategory(String),

    #[error("Category '{category}' mirrors unknown or non-CB category '{target}'")]
    InvalidMirror { category: String, target: String },

    #[error("Phase {0} has no categories")]
    MissingPhase(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_maps_to_concurrent_modification() {
        let err: DossierError = StorageError::VersionConflict {
            id: DossierId::new("d-1"),
            expected: 2,
            found: 3,
        }
        .into();
        assert!(matches!(err, DossierError::ConcurrentModification(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_gate_error_lists_missing_items() {
        let err = DossierError::ValidationGateNotMet {
            missing: vec!["Nature de la dépense".into(), "Montant (rejeté)".into()],
        };
        assert_eq!(
            err.to_string(),
            "Validation gate not met: Nature de la dépense, Montant (rejeté)"
        );
    }

    #[test]
    fn test_illegal_transition_reports_both_ends() {
        let err = DossierError::IllegalTransition {
            from: DossierStatus::Brouillon,
            to: DossierStatus::ValideCb,
        };
        assert_eq!(err.to_string(), "Illegal transition: BROUILLON -> VALIDÉ_CB");
    }
}
