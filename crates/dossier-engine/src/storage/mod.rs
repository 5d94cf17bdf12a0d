//! Storage contract for dossiers, the validation ledger and dossier events.
//!
//! The relational store behind these traits is an external collaborator; the
//! crate ships only the contract and a deterministic in-memory adapter.
//! Dossier writes carry an optimistic-concurrency check, ledger and event
//! writes are append-only.

pub mod memory;
mod traits;

pub use memory::InMemoryWorkflowStorage;
pub use traits::{DossierEventStore, DossierStore, ValidationStore, WorkflowStorage};
