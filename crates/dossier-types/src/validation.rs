//! Validation ledger records and the derived validation status.

use crate::{CategoryId, CheckItemId, DossierId, ReviewStage, UserId, ValidationRecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reviewer's verdict on one check item, as submitted by the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItemVerdict {
    pub category_id: CategoryId,
    pub check_item_id: CheckItemId,
    pub valide: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentaire: Option<String>,
}

impl CheckItemVerdict {
    pub fn new(category: impl Into<String>, item: impl Into<String>, valide: bool) -> Self {
        Self {
            category_id: CategoryId::new(category),
            check_item_id: CheckItemId::new(item),
            valide,
            commentaire: None,
        }
    }

    pub fn passed(category: impl Into<String>, item: impl Into<String>) -> Self {
        Self::new(category, item, true)
    }

    pub fn failed(category: impl Into<String>, item: impl Into<String>) -> Self {
        Self::new(category, item, false)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.commentaire = Some(comment.into());
        self
    }
}

/// Input for appending to the validation ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewValidation {
    pub dossier_id: DossierId,
    pub category_id: CategoryId,
    pub check_item_id: CheckItemId,
    pub valide: bool,
    pub valide_le: DateTime<Utc>,
    pub valide_par_user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentaire: Option<String>,
}

/// One immutable entry of the validation ledger.
///
/// Re-validating an item appends a new record; the most recent record
/// (greatest `valide_le`, then greatest `sequence`) is the effective value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: ValidationRecordId,
    /// Store-assigned, strictly increasing insertion order
    pub sequence: u64,
    pub dossier_id: DossierId,
    pub category_id: CategoryId,
    pub check_item_id: CheckItemId,
    pub valide: bool,
    pub valide_le: DateTime<Utc>,
    pub valide_par_user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentaire: Option<String>,
}

impl ValidationRecord {
    /// Materialise an append; used by storage backends
    pub fn from_new(new: NewValidation, sequence: u64) -> Self {
        Self {
            id: ValidationRecordId::generate(),
            sequence,
            dossier_id: new.dossier_id,
            category_id: new.category_id,
            check_item_id: new.check_item_id,
            valide: new.valide,
            valide_le: new.valide_le,
            valide_par_user_id: new.valide_par_user_id,
            commentaire: new.commentaire,
        }
    }

    /// Whether this record supersedes `other` for the same check item
    pub fn supersedes(&self, other: &ValidationRecord) -> bool {
        (self.valide_le, self.sequence) > (other.valide_le, other.sequence)
    }
}

/// CB-specific gate flags
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CbGate {
    /// Every operation-type item has a record
    pub has_operation_type_validation: bool,
    /// Every substantive-control item has a record
    pub has_controles_fond_validation: bool,
    /// Both phases recorded and every effective value passing
    pub can_validate: bool,
}

/// Snapshot of a stage's checklist. Derived, never persisted or cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub stage: ReviewStage,
    /// Every required item has at least one record
    pub completed: bool,
    /// Completed and every effective value is `true`
    pub all_valid: bool,
    /// Unrecorded items in catalog order, then failing items tagged " (rejeté)"
    pub missing_validations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cb: Option<CbGate>,
}

impl ValidationStatus {
    /// Gate for the CB approval. Always false outside the CB stage.
    pub fn can_validate(&self) -> bool {
        self.cb.as_ref().map(|g| g.can_validate).unwrap_or(false)
    }

    /// Gate for the ordering decision
    pub fn can_ordonnance(&self) -> bool {
        self.stage == ReviewStage::Ordonnateur && self.completed && self.all_valid
    }
}
