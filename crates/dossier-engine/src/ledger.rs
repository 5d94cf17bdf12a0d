//! Validation ledger: append-only checklist verdicts per dossier
//!
//! Every verdict becomes an immutable [`ValidationRecord`]. Nothing is ever
//! updated or deleted; the effective value of a check item is its most
//! recent record (greatest `valide_le`, ties broken by store sequence).

use crate::catalog::ValidationCatalog;
use crate::storage::{DossierStore, ValidationStore};
use chrono::Utc;
use dossier_types::{
    Actor, CheckItemId, CheckItemVerdict, DossierError, DossierId, DossierResult, NewValidation,
    Phase, ValidationRecord,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Effective record per check item, restricted to the given phases.
///
/// Records whose category is unknown to the catalog, or whose item does not
/// belong to its category, are ignored.
pub fn effective_records(
    catalog: &ValidationCatalog,
    records: &[ValidationRecord],
    phases: &[Phase],
) -> BTreeMap<CheckItemId, ValidationRecord> {
    let mut effective: BTreeMap<CheckItemId, ValidationRecord> = BTreeMap::new();

    for record in records {
        let in_scope = catalog
            .category(&record.category_id)
            .filter(|c| phases.contains(&c.phase))
            .and_then(|c| c.item(&record.check_item_id))
            .is_some();
        if !in_scope {
            continue;
        }

        match effective.get(&record.check_item_id) {
            Some(current) if !record.supersedes(current) => {}
            _ => {
                effective.insert(record.check_item_id.clone(), record.clone());
            }
        }
    }

    effective
}

/// Ledger operations over a validation store
pub struct ValidationLedger<S: ?Sized> {
    catalog: Arc<ValidationCatalog>,
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ValidationLedger<S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> ValidationLedger<S>
where
    S: DossierStore + ValidationStore + ?Sized,
{
    pub fn new(catalog: Arc<ValidationCatalog>, store: Arc<S>) -> Self {
        Self { catalog, store }
    }

    /// Append a verdict for one check item.
    ///
    /// Fails with `InvalidReference` for an unknown dossier, category or
    /// item, and with `Forbidden` when the actor's role does not own the
    /// category's phase.
    pub async fn record(
        &self,
        dossier_id: &DossierId,
        verdict: CheckItemVerdict,
        actor: &Actor,
    ) -> DossierResult<ValidationRecord> {
        if self.store.get_dossier(dossier_id).await?.is_none() {
            return Err(DossierError::invalid_reference("dossier", dossier_id));
        }

        let category = self
            .catalog
            .category(&verdict.category_id)
            .ok_or_else(|| DossierError::invalid_reference("category", &verdict.category_id))?;
        if category.item(&verdict.check_item_id).is_none() {
            return Err(DossierError::invalid_reference(
                "check item",
                &verdict.check_item_id,
            ));
        }

        let owner = category.phase.owner();
        if !actor.has_role(owner) {
            return Err(DossierError::forbidden(
                &actor.user_id,
                format!(
                    "category '{}' ({}) is reserved to role {}",
                    category.id, category.phase, owner
                ),
            ));
        }

        let record = self
            .store
            .append_validation(NewValidation {
                dossier_id: dossier_id.clone(),
                category_id: verdict.category_id,
                check_item_id: verdict.check_item_id,
                valide: verdict.valide,
                valide_le: Utc::now(),
                valide_par_user_id: actor.user_id.clone(),
                commentaire: verdict.commentaire,
            })
            .await?;

        tracing::debug!(
            dossier = %dossier_id,
            item = %record.check_item_id,
            valide = record.valide,
            sequence = record.sequence,
            "Validation recorded"
        );

        Ok(record)
    }

    /// Latest record per check item of a phase
    pub async fn effective_records(
        &self,
        dossier_id: &DossierId,
        phase: Phase,
    ) -> DossierResult<BTreeMap<CheckItemId, ValidationRecord>> {
        let records = self.store.list_validations(dossier_id).await?;
        Ok(effective_records(&self.catalog, &records, &[phase]))
    }

    /// Full audit trail in append order
    pub async fn history(&self, dossier_id: &DossierId) -> DossierResult<Vec<ValidationRecord>> {
        Ok(self.store.list_validations(dossier_id).await?)
    }
}
