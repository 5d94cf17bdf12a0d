//! Dossier Workflow Engine
//!
//! The engine moves expenditure dossiers from draft to payment. It gates
//! every status change on the reviewing role's checklist, keeps an
//! append-only ledger of checklist verdicts and audits the CB and
//! Ordonnateur ledgers against each other before the Accountant pays.
//!
//! # Key Principle
//!
//! **A transition is one atomic decision.** The state machine is pure; the
//! service applies it to a freshly read dossier and writes the result back
//! under an optimistic version check. Side effects (notifications, the
//! comptabilization submission) run after the commit and never undo it.
//!
//! # Architecture
//!
//! The [`DossierWorkflow`] service composes specialized components:
//!
//! - [`ValidationCatalog`] - Read-only checklist reference data
//! - [`ValidationLedger`] - Append-only checklist verdicts
//! - [`StatusEvaluator`] - Folds the ledger into a gate summary
//! - [`DossierStateMachine`] - The only place a status changes
//! - [`ReconciliationEngine`] - Cross-role audit before settlement
//!
//! # Example
//!
//! ```rust
//! use dossier_engine::*;
//! use dossier_types::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = DossierWorkflow::new(
//!         Arc::new(InMemoryWorkflowStorage::new()),
//!         WorkflowConfig::default(),
//!         Arc::new(RecordingAcSubmitter::accepting()),
//!         Arc::new(NoopNotificationSink),
//!     )?;
//!
//!     let secretary = Actor::secretaire("sec-1");
//!     let dossier = workflow
//!         .create_dossier(
//!             &secretary,
//!             NewDossier::new("Achat de fournitures", "Papeterie SA").with_folder("f-1"),
//!         )
//!         .await?;
//!     let dossier = workflow.submit(&dossier.id, &secretary).await?;
//!     assert_eq!(dossier.statut, DossierStatus::EnAttente);
//!
//!     let status = workflow.evaluate(&dossier.id, ReviewStage::Cb).await?;
//!     assert!(!status.can_validate());
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod evaluator;
pub mod ledger;
pub mod reconciliation;
pub mod service;
pub mod state_machine;
pub mod storage;

pub use catalog::{default_categories, ValidationCatalog};
pub use collaborators::{
    AcResponse, AcSubmission, AcSubmitter, CollaboratorError, NoopNotificationSink,
    Notification, NotificationSink, RecordingAcSubmitter, RecordingNotificationSink,
};
pub use config::{
    AcSubmissionConfig, ConfigError, NotificationConfig, NumberingConfig, WorkflowConfig,
};
pub use evaluator::StatusEvaluator;
pub use ledger::{effective_records, ValidationLedger};
pub use reconciliation::ReconciliationEngine;
pub use service::{DossierWorkflow, OrdonnanceOutcome, SubmissionOutcome};
pub use state_machine::{DossierStateMachine, Transition};
pub use storage::{
    DossierEventStore, DossierStore, InMemoryWorkflowStorage, ValidationStore, WorkflowStorage,
};
