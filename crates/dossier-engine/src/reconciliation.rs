//! Cross-role reconciliation of the CB and Ordonnateur ledgers
//!
//! Before paying, the Accountant inspects a report comparing what the Budget
//! Controller and the Ordonnateur each recorded. The engine is read-only and
//! deterministic: mirror pairs are visited in catalog order, then stale CB
//! records in ledger order.

use crate::catalog::ValidationCatalog;
use crate::ledger::effective_records;
use dossier_types::{
    CheckItemId, Dossier, DossierError, DossierResult, Incoherence, IncoherenceType, Phase,
    ReconciliationReport, ReviewStage, Severity, StageStatistics, StageVerdict,
    ValidationCategory, ValidationRecord,
};
use std::collections::BTreeMap;
use std::sync::Arc;

type Effective = BTreeMap<CheckItemId, ValidationRecord>;

/// Builds reconciliation reports
#[derive(Clone, Debug)]
pub struct ReconciliationEngine {
    catalog: Arc<ValidationCatalog>,
}

impl ReconciliationEngine {
    pub fn new(catalog: Arc<ValidationCatalog>) -> Self {
        Self { catalog }
    }

    /// Reconcile a dossier against its full ledger.
    ///
    /// Fails with `NotReadyForReconciliation` before the payment order.
    pub fn reconcile(
        &self,
        dossier: &Dossier,
        records: &[ValidationRecord],
    ) -> DossierResult<ReconciliationReport> {
        if !dossier.statut.is_ordonnanced() {
            return Err(DossierError::NotReadyForReconciliation {
                id: dossier.id.clone(),
                status: dossier.statut,
            });
        }

        let cb_effective = effective_records(&self.catalog, records, ReviewStage::Cb.phases());
        let ordo_effective = effective_records(&self.catalog, records, &[Phase::Ordonnateur]);

        let cb = self.statistics(ReviewStage::Cb, &cb_effective);
        let ordonnateur = self.statistics(ReviewStage::Ordonnateur, &ordo_effective);

        let mut incoherences = Vec::new();

        for (cb_category, ordo_category) in self.catalog.mirror_pairs() {
            let cb_count = recorded_in(cb_category, &cb_effective).count();
            let ordo_count = recorded_in(ordo_category, &ordo_effective).count();

            if cb_count != ordo_count {
                incoherences.push(
                    Incoherence::new(
                        IncoherenceType::CountMismatch,
                        Severity::Moyenne,
                        format!(
                            "{} : {} contrôle(s) CB contre {} contrôle(s) ordonnateur",
                            ordo_category.nom, cb_count, ordo_count
                        ),
                    )
                    .with_detail("cb_category", &cb_category.id)
                    .with_detail("ordonnateur_category", &ordo_category.id)
                    .with_detail("cb_count", cb_count)
                    .with_detail("ordonnateur_count", ordo_count),
                );
            }

            let ordo_rejected = recorded_in(ordo_category, &ordo_effective)
                .filter(|r| !r.valide)
                .count();
            if cb.statut == StageVerdict::Valide && ordo_rejected > 0 {
                incoherences.push(
                    Incoherence::new(
                        IncoherenceType::StatusConflict,
                        Severity::Haute,
                        format!(
                            "{} : validé par le CB mais {} contrôle(s) rejeté(s) par l'ordonnateur",
                            ordo_category.nom, ordo_rejected
                        ),
                    )
                    .with_detail("cb_category", &cb_category.id)
                    .with_detail("ordonnateur_category", &ordo_category.id)
                    .with_detail("ordonnateur_rejected", ordo_rejected),
                );
            }
        }

        if let Some(depot) = dossier.date_depot {
            let mut stale: Vec<&ValidationRecord> = cb_effective
                .values()
                .filter(|r| r.valide_le < depot)
                .collect();
            stale.sort_by_key(|r| r.sequence);

            for record in stale {
                incoherences.push(
                    Incoherence::new(
                        IncoherenceType::StaleValidation,
                        Severity::Faible,
                        format!(
                            "Contrôle {} enregistré avant le dépôt du dossier",
                            record.check_item_id
                        ),
                    )
                    .with_detail("check_item", &record.check_item_id)
                    .with_detail("valide_le", record.valide_le.to_rfc3339())
                    .with_detail("date_depot", depot.to_rfc3339()),
                );
            }
        }

        Ok(ReconciliationReport {
            dossier_id: dossier.id.clone(),
            numero_dossier: dossier.numero_dossier.clone(),
            cb,
            ordonnateur,
            incoherences,
            dossier_version: dossier.version,
            ledger_length: records.len(),
        })
    }

    fn statistics(&self, stage: ReviewStage, effective: &Effective) -> StageStatistics {
        let total = self.catalog.item_count(stage);
        let validated = effective.values().filter(|r| r.valide).count();
        let rejected = effective.values().filter(|r| !r.valide).count();

        let statut = if rejected > 0 {
            StageVerdict::Rejete
        } else if validated == total {
            StageVerdict::Valide
        } else {
            StageVerdict::EnCours
        };

        StageStatistics {
            total,
            validated,
            rejected,
            statut,
        }
    }
}

fn recorded_in<'a>(
    category: &'a ValidationCategory,
    effective: &'a Effective,
) -> impl Iterator<Item = &'a ValidationRecord> + 'a {
    category.items.iter().filter_map(|i| effective.get(&i.id))
}
