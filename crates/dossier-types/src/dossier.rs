//! Dossiers: expenditure case files tracked through approval
//!
//! A [`Dossier`] is created by a Secretary in [`DossierStatus::Brouillon`]
//! and is afterwards mutated only by the workflow engine's state machine.

use crate::{DossierId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Status ───────────────────────────────────────────────────────────

/// Lifecycle status of a dossier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DossierStatus {
    /// Draft, still editable by its author
    #[serde(rename = "BROUILLON")]
    Brouillon,
    /// Submitted, awaiting the Budget Controller
    #[serde(rename = "EN_ATTENTE")]
    EnAttente,
    /// Approved by the Budget Controller
    #[serde(rename = "VALIDÉ_CB")]
    ValideCb,
    /// Rejected by the Budget Controller; may be resubmitted
    #[serde(rename = "REJETÉ_CB")]
    RejeteCb,
    /// Payment ordered
    #[serde(rename = "VALIDÉ_ORDONNATEUR")]
    ValideOrdonnateur,
    /// Paid by the Accountant
    #[serde(rename = "PAYÉ")]
    Paye,
    /// Closed
    #[serde(rename = "TERMINÉ")]
    Termine,
}

impl DossierStatus {
    pub const ALL: [DossierStatus; 7] = [
        Self::Brouillon,
        Self::EnAttente,
        Self::ValideCb,
        Self::RejeteCb,
        Self::ValideOrdonnateur,
        Self::Paye,
        Self::Termine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brouillon => "BROUILLON",
            Self::EnAttente => "EN_ATTENTE",
            Self::ValideCb => "VALIDÉ_CB",
            Self::RejeteCb => "REJETÉ_CB",
            Self::ValideOrdonnateur => "VALIDÉ_ORDONNATEUR",
            Self::Paye => "PAYÉ",
            Self::Termine => "TERMINÉ",
        }
    }

    /// Statuses reachable in one legal step
    pub fn successors(&self) -> &'static [DossierStatus] {
        match self {
            Self::Brouillon => &[Self::EnAttente],
            Self::EnAttente => &[Self::ValideCb, Self::RejeteCb],
            Self::RejeteCb => &[Self::EnAttente],
            Self::ValideCb => &[Self::ValideOrdonnateur],
            Self::ValideOrdonnateur => &[Self::Paye],
            Self::Paye => &[Self::Termine],
            Self::Termine => &[],
        }
    }

    pub fn can_transition_to(&self, target: DossierStatus) -> bool {
        self.successors().contains(&target)
    }

    /// Whether the dossier has been ordered for payment (or gone further)
    pub fn is_ordonnanced(&self) -> bool {
        matches!(
            self,
            Self::ValideOrdonnateur | Self::Paye | Self::Termine
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Termine)
    }
}

impl std::fmt::Display for DossierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Rejection ────────────────────────────────────────────────────────

/// Metadata recorded when the Budget Controller rejects a dossier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Why the dossier was rejected (never empty)
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub rejected_at: DateTime<Utc>,
    pub rejected_by: UserId,
}

// ── Creation Input ───────────────────────────────────────────────────

/// Fields supplied by the Secretary when creating a dossier
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewDossier {
    /// Human-readable number; generated when absent
    #[serde(default)]
    pub numero_dossier: Option<String>,
    pub objet_operation: String,
    pub beneficiaire: String,
    #[serde(default)]
    pub poste_comptable_id: Option<String>,
    #[serde(default)]
    pub nature_document_id: Option<String>,
    /// Deposit date; stamped at submission when absent
    #[serde(default)]
    pub date_depot: Option<DateTime<Utc>>,
    /// Attachment folder owned by the file-storage collaborator
    #[serde(default)]
    pub folder_id: Option<String>,
}

impl NewDossier {
    pub fn new(objet_operation: impl Into<String>, beneficiaire: impl Into<String>) -> Self {
        Self {
            objet_operation: objet_operation.into(),
            beneficiaire: beneficiaire.into(),
            ..Default::default()
        }
    }

    pub fn with_numero(mut self, numero: impl Into<String>) -> Self {
        self.numero_dossier = Some(numero.into());
        self
    }

    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_poste_comptable(mut self, poste: impl Into<String>) -> Self {
        self.poste_comptable_id = Some(poste.into());
        self
    }

    pub fn with_nature_document(mut self, nature: impl Into<String>) -> Self {
        self.nature_document_id = Some(nature.into());
        self
    }

    pub fn with_date_depot(mut self, date: DateTime<Utc>) -> Self {
        self.date_depot = Some(date);
        self
    }
}

// ── Dossier ──────────────────────────────────────────────────────────

/// An expenditure case file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dossier {
    pub id: DossierId,
    pub numero_dossier: String,
    pub objet_operation: String,
    pub beneficiaire: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poste_comptable_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nature_document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_depot: Option<DateTime<Utc>>,
    /// Author; the only user allowed to submit, resubmit or purge
    pub secretaire_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub statut: DossierStatus,
    /// Present iff `statut` is [`DossierStatus::RejeteCb`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordonnance_comment: Option<String>,
    /// Justification given when settled despite reconciliation incoherences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_override: Option<String>,
    /// Optimistic-concurrency token, bumped by the store on every write
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dossier {
    /// Build a fresh draft from creation input
    pub fn new(secretaire_id: UserId, numero_dossier: impl Into<String>, fields: NewDossier) -> Self {
        let now = Utc::now();
        Self {
            id: DossierId::generate(),
            numero_dossier: numero_dossier.into(),
            objet_operation: fields.objet_operation,
            beneficiaire: fields.beneficiaire,
            poste_comptable_id: fields.poste_comptable_id,
            nature_document_id: fields.nature_document_id,
            date_depot: fields.date_depot,
            secretaire_id,
            folder_id: fields.folder_id,
            statut: DossierStatus::Brouillon,
            rejection: None,
            ordonnance_comment: None,
            settlement_override: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.statut == DossierStatus::RejeteCb
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection.as_ref().map(|r| r.reason.as_str())
    }

    /// Rejection metadata is present exactly when the dossier is rejected
    pub fn rejection_consistent(&self) -> bool {
        self.rejection.is_some() == self.is_rejected()
    }
}
