//! Validation status evaluator: folds the ledger into a gate summary
//!
//! The evaluator is a pure function of the catalog and the ledger records.
//! It performs no I/O and caches nothing, so callers must re-evaluate after
//! every append.

use crate::catalog::ValidationCatalog;
use crate::ledger::effective_records;
use dossier_types::{CbGate, Phase, ReviewStage, ValidationRecord, ValidationStatus};
use std::sync::Arc;

/// Evaluates checklist completeness and validity
#[derive(Clone, Debug)]
pub struct StatusEvaluator {
    catalog: Arc<ValidationCatalog>,
}

impl StatusEvaluator {
    pub fn new(catalog: Arc<ValidationCatalog>) -> Self {
        Self { catalog }
    }

    /// Evaluate a stage against a dossier's full ledger.
    pub fn evaluate(&self, stage: ReviewStage, records: &[ValidationRecord]) -> ValidationStatus {
        let summary = self.summarize(stage.phases(), records);

        let cb = match stage {
            ReviewStage::Cb => {
                let has_operation_type_validation = self
                    .summarize(&[Phase::CbTypeOperation], records)
                    .completed;
                let has_controles_fond_validation = self
                    .summarize(&[Phase::CbControlesFond], records)
                    .completed;
                Some(CbGate {
                    has_operation_type_validation,
                    has_controles_fond_validation,
                    can_validate: has_operation_type_validation
                        && has_controles_fond_validation
                        && summary.all_valid,
                })
            }
            ReviewStage::Ordonnateur => None,
        };

        ValidationStatus {
            stage,
            completed: summary.completed,
            all_valid: summary.all_valid,
            missing_validations: summary.missing,
            cb,
        }
    }

    fn summarize(&self, phases: &[Phase], records: &[ValidationRecord]) -> PhaseSummary {
        let effective = effective_records(&self.catalog, records, phases);

        let mut unrecorded = Vec::new();
        let mut rejected = Vec::new();

        let categories = self
            .catalog
            .categories()
            .iter()
            .filter(|c| phases.contains(&c.phase));
        for category in categories {
            for item in &category.items {
                match effective.get(&item.id) {
                    None => unrecorded.push(item.nom.clone()),
                    Some(record) if !record.valide => {
                        rejected.push(format!("{} (rejeté)", item.nom))
                    }
                    Some(_) => {}
                }
            }
        }

        let completed = unrecorded.is_empty();
        let all_valid = completed && rejected.is_empty();
        unrecorded.extend(rejected);

        PhaseSummary {
            completed,
            all_valid,
            missing: unrecorded,
        }
    }
}

struct PhaseSummary {
    completed: bool,
    all_valid: bool,
    missing: Vec<String>,
}
