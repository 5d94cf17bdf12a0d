//! Cross-role reconciliation report types.

use crate::DossierId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall verdict of one stage's effective records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageVerdict {
    #[serde(rename = "VALIDÉ")]
    Valide,
    #[serde(rename = "REJETÉ")]
    Rejete,
    #[serde(rename = "EN_COURS")]
    EnCours,
}

/// Aggregated counts for one stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatistics {
    /// Check items required by the catalog
    pub total: usize,
    /// Items whose effective record passes
    pub validated: usize,
    /// Items whose effective record fails
    pub rejected: usize,
    pub statut: StageVerdict,
}

impl StageStatistics {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.validated + self.rejected)
    }
}

/// Kind of detected inconsistency
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncoherenceType {
    /// Mirrored categories were not reviewed to the same extent
    CountMismatch,
    /// CB approved while the Ordonnateur rejected a mirrored item
    StatusConflict,
    /// A CB validation predates the deposit of the dossier
    StaleValidation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Faible,
    Moyenne,
    Haute,
}

/// A single inconsistency between the CB and Ordonnateur ledgers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incoherence {
    #[serde(rename = "type")]
    pub kind: IncoherenceType,
    pub severite: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl Incoherence {
    pub fn new(kind: IncoherenceType, severite: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severite,
            description: description.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Audit the Accountant inspects before settlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub dossier_id: DossierId,
    pub numero_dossier: String,
    pub cb: StageStatistics,
    pub ordonnateur: StageStatistics,
    pub incoherences: Vec<Incoherence>,
    /// Dossier version the report was computed from
    pub dossier_version: u64,
    /// Ledger length the report was computed from
    pub ledger_length: usize,
}

impl ReconciliationReport {
    pub fn incoherence_count(&self) -> usize {
        self.incoherences.len()
    }

    /// Zero incoherences: settlement needs no human override
    pub fn eligible_for_settlement(&self) -> bool {
        self.incoherences.is_empty()
    }

    pub fn count_of(&self, kind: IncoherenceType) -> usize {
        self.incoherences.iter().filter(|i| i.kind == kind).count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.incoherences.iter().map(|i| i.severite).max()
    }
}
