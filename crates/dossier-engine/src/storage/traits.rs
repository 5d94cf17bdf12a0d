use async_trait::async_trait;
use dossier_types::{
    Dossier, DossierEvent, DossierId, NewDossierEvent, NewValidation, StorageResult,
    ValidationRecord,
};

/// Storage interface for dossier rows.
#[async_trait]
pub trait DossierStore: Send + Sync {
    /// Insert a new dossier. Fails with `Conflict` on a duplicate id or
    /// dossier number.
    async fn insert_dossier(&self, dossier: Dossier) -> StorageResult<Dossier>;

    /// Get one dossier by primary key.
    async fn get_dossier(&self, id: &DossierId) -> StorageResult<Option<Dossier>>;

    /// Write a dossier if the stored version still equals `expected_version`.
    /// The stored copy gets `expected_version + 1`, which is returned.
    async fn update_dossier(&self, dossier: Dossier, expected_version: u64)
        -> StorageResult<Dossier>;

    /// Hard-delete a dossier, with the same optimistic check as updates.
    async fn delete_dossier(&self, id: &DossierId, expected_version: u64) -> StorageResult<()>;

    /// Allocate the next dossier number sequence for a year (starting at 1).
    async fn next_dossier_sequence(&self, year: i32) -> StorageResult<u64>;
}

/// Storage interface for the append-only validation ledger.
#[async_trait]
pub trait ValidationStore: Send + Sync {
    /// Append a record; the store assigns id and sequence.
    async fn append_validation(&self, validation: NewValidation)
        -> StorageResult<ValidationRecord>;

    /// All records of a dossier in append order.
    async fn list_validations(&self, dossier_id: &DossierId)
        -> StorageResult<Vec<ValidationRecord>>;
}

/// Storage interface for append-only dossier events.
#[async_trait]
pub trait DossierEventStore: Send + Sync {
    async fn append_event(&self, event: NewDossierEvent) -> StorageResult<DossierEvent>;

    /// Events of a dossier in append order.
    async fn list_events(&self, dossier_id: &DossierId) -> StorageResult<Vec<DossierEvent>>;
}

/// Unified storage bundle used by the workflow service.
pub trait WorkflowStorage: DossierStore + ValidationStore + DossierEventStore + Send + Sync {}

impl<T> WorkflowStorage for T where T: DossierStore + ValidationStore + DossierEventStore + Send + Sync
{}
