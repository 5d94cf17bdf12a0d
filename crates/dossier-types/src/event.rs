//! Dossier events: the append-only audit of committed transitions

use crate::{DossierId, DossierStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a dossier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierEventKind {
    Created,
    Submitted,
    CbValidated,
    CbRejected,
    Resubmitted,
    Ordonnanced,
    AcSubmissionAccepted,
    AcSubmissionFailed,
    Settled,
    Closed,
    Purged,
}

impl std::fmt::Display for DossierEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::CbValidated => "cb_validated",
            Self::CbRejected => "cb_rejected",
            Self::Resubmitted => "resubmitted",
            Self::Ordonnanced => "ordonnanced",
            Self::AcSubmissionAccepted => "ac_submission_accepted",
            Self::AcSubmissionFailed => "ac_submission_failed",
            Self::Settled => "settled",
            Self::Closed => "closed",
            Self::Purged => "purged",
        };
        f.write_str(s)
    }
}

/// Event to append
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDossierEvent {
    pub dossier_id: DossierId,
    pub kind: DossierEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DossierStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DossierStatus>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl NewDossierEvent {
    pub fn new(dossier_id: DossierId, kind: DossierEventKind, message: impl Into<String>) -> Self {
        Self {
            dossier_id,
            kind,
            actor: None,
            from: None,
            to: None,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_transition(mut self, from: DossierStatus, to: DossierStatus) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// A stored event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DossierEvent {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: NewDossierEvent,
}
