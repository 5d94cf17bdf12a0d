//! In-memory reference implementation of the workflow storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! use a transactional backend for source-of-truth data.

use crate::storage::{DossierEventStore, DossierStore, ValidationStore};
use async_trait::async_trait;
use dossier_types::{
    Dossier, DossierEvent, DossierId, NewDossierEvent, NewValidation, StorageError,
    StorageResult, ValidationRecord,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory workflow storage adapter.
#[derive(Default)]
pub struct InMemoryWorkflowStorage {
    dossiers: RwLock<HashMap<DossierId, Dossier>>,
    validations: RwLock<Vec<ValidationRecord>>,
    events: RwLock<Vec<DossierEvent>>,
    sequences: RwLock<HashMap<i32, u64>>,
}

impl InMemoryWorkflowStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{} lock poisoned", what))
}

#[async_trait]
impl DossierStore for InMemoryWorkflowStorage {
    async fn insert_dossier(&self, dossier: Dossier) -> StorageResult<Dossier> {
        let mut guard = self.dossiers.write().map_err(|_| poisoned("dossiers"))?;

        if guard.contains_key(&dossier.id) {
            return Err(StorageError::Conflict(format!(
                "dossier {} already exists",
                dossier.id
            )));
        }
        if guard
            .values()
            .any(|d| d.numero_dossier == dossier.numero_dossier)
        {
            return Err(StorageError::Conflict(format!(
                "dossier number {} already in use",
                dossier.numero_dossier
            )));
        }

        guard.insert(dossier.id.clone(), dossier.clone());
        Ok(dossier)
    }

    async fn get_dossier(&self, id: &DossierId) -> StorageResult<Option<Dossier>> {
        let guard = self.dossiers.read().map_err(|_| poisoned("dossiers"))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_dossier(
        &self,
        mut dossier: Dossier,
        expected_version: u64,
    ) -> StorageResult<Dossier> {
        let mut guard = self.dossiers.write().map_err(|_| poisoned("dossiers"))?;
        let stored = guard
            .get_mut(&dossier.id)
            .ok_or_else(|| StorageError::NotFound(format!("dossier {} not found", dossier.id)))?;

        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: dossier.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }

        dossier.version = expected_version + 1;
        *stored = dossier.clone();
        Ok(dossier)
    }

    async fn delete_dossier(&self, id: &DossierId, expected_version: u64) -> StorageResult<()> {
        let mut guard = self.dossiers.write().map_err(|_| poisoned("dossiers"))?;
        let stored = guard
            .get(id)
            .ok_or_else(|| StorageError::NotFound(format!("dossier {} not found", id)))?;

        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }

        guard.remove(id);
        Ok(())
    }

    async fn next_dossier_sequence(&self, year: i32) -> StorageResult<u64> {
        let mut guard = self.sequences.write().map_err(|_| poisoned("sequences"))?;
        let counter = guard.entry(year).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl ValidationStore for InMemoryWorkflowStorage {
    async fn append_validation(
        &self,
        validation: NewValidation,
    ) -> StorageResult<ValidationRecord> {
        let mut guard = self
            .validations
            .write()
            .map_err(|_| poisoned("validations"))?;
        let sequence = guard.len() as u64 + 1;
        let record = ValidationRecord::from_new(validation, sequence);
        guard.push(record.clone());
        Ok(record)
    }

    async fn list_validations(
        &self,
        dossier_id: &DossierId,
    ) -> StorageResult<Vec<ValidationRecord>> {
        let guard = self
            .validations
            .read()
            .map_err(|_| poisoned("validations"))?;
        Ok(guard
            .iter()
            .filter(|r| &r.dossier_id == dossier_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DossierEventStore for InMemoryWorkflowStorage {
    async fn append_event(&self, event: NewDossierEvent) -> StorageResult<DossierEvent> {
        let mut guard = self.events.write().map_err(|_| poisoned("events"))?;
        let stored = DossierEvent {
            sequence: guard.len() as u64 + 1,
            event,
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    async fn list_events(&self, dossier_id: &DossierId) -> StorageResult<Vec<DossierEvent>> {
        let guard = self.events.read().map_err(|_| poisoned("events"))?;
        Ok(guard
            .iter()
            .filter(|e| &e.event.dossier_id == dossier_id)
            .cloned()
            .collect())
    }
}
