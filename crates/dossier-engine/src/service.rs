//! Workflow service: the operation surface of the dossier workflow
//!
//! [`DossierWorkflow`] wires the catalog, the ledger, the evaluator, the
//! state machine and the reconciliation engine to a storage backend and the
//! external collaborators. Every status change is a read, a pure state
//! machine step and a version-checked write; the loser of a race gets
//! [`DossierError::ConcurrentModification`].

use crate::catalog::ValidationCatalog;
use crate::collaborators::{AcResponse, AcSubmitter, Notification, NotificationSink};
use crate::config::{ConfigError, WorkflowConfig};
use crate::evaluator::StatusEvaluator;
use crate::ledger::ValidationLedger;
use crate::reconciliation::ReconciliationEngine;
use crate::state_machine::{DossierStateMachine, Transition};
use crate::storage::WorkflowStorage;
use chrono::{DateTime, Datelike, Utc};
use dossier_types::{
    Actor, CheckItemVerdict, Dossier, DossierError, DossierEvent, DossierEventKind, DossierId,
    DossierResult, DossierStatus, NewDossier, NewDossierEvent, ReconciliationReport,
    ReviewStage, Role, StorageError, ValidationRecord, ValidationStatus,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Generated numbers tried before giving up on a crowded year
const MAX_NUMBER_ATTEMPTS: usize = 32;

/// Result of one comptabilization submission attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted,
    /// The accounting system answered with a refusal
    Rejected { reason: String },
    /// Transport or collaborator error
    Failed { error: String },
    TimedOut { after_ms: u64 },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// The error to surface to the caller, if the attempt did not succeed
    pub fn warning(&self, dossier_id: &DossierId) -> Option<DossierError> {
        let reason = match self {
            Self::Accepted => return None,
            Self::Rejected { reason } => format!("rejected: {}", reason),
            Self::Failed { error } => error.clone(),
            Self::TimedOut { after_ms } => format!("timed out after {} ms", after_ms),
        };
        Some(DossierError::ExternalSubmissionFailed {
            id: dossier_id.clone(),
            reason,
        })
    }
}

/// A committed payment order and what the accounting system made of it
#[derive(Clone, Debug)]
pub struct OrdonnanceOutcome {
    pub dossier: Dossier,
    pub submission: SubmissionOutcome,
}

impl OrdonnanceOutcome {
    pub fn warning(&self) -> Option<DossierError> {
        self.submission.warning(&self.dossier.id)
    }
}

/// The dossier workflow service
pub struct DossierWorkflow<S: WorkflowStorage + ?Sized> {
    storage: Arc<S>,
    config: WorkflowConfig,
    catalog: Arc<ValidationCatalog>,
    ledger: ValidationLedger<S>,
    evaluator: StatusEvaluator,
    state_machine: DossierStateMachine,
    reconciler: ReconciliationEngine,
    submitter: Arc<dyn AcSubmitter>,
    notifier: Arc<dyn NotificationSink>,
}

impl<S: WorkflowStorage + ?Sized> DossierWorkflow<S> {
    /// Build the service. Fails when the configuration or its catalog
    /// override is invalid.
    pub fn new(
        storage: Arc<S>,
        config: WorkflowConfig,
        submitter: Arc<dyn AcSubmitter>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let catalog = Arc::new(config.build_catalog()?);

        Ok(Self {
            ledger: ValidationLedger::new(Arc::clone(&catalog), Arc::clone(&storage)),
            evaluator: StatusEvaluator::new(Arc::clone(&catalog)),
            reconciler: ReconciliationEngine::new(Arc::clone(&catalog)),
            state_machine: DossierStateMachine::new(),
            storage,
            config,
            catalog,
            submitter,
            notifier,
        })
    }

    pub fn catalog(&self) -> &ValidationCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ── Authoring ────────────────────────────────────────────────────

    /// Create a draft owned by the calling Secretary.
    ///
    /// A dossier number is generated from the store's yearly sequence when
    /// the caller does not supply one.
    pub async fn create_dossier(&self, actor: &Actor, input: NewDossier) -> DossierResult<Dossier> {
        if !actor.has_role(Role::Secretaire) {
            return Err(DossierError::forbidden(
                &actor.user_id,
                "only a secretary can create dossiers",
            ));
        }
        if input.objet_operation.trim().is_empty() {
            return Err(DossierError::InvalidInput(
                "objet_operation must not be empty".into(),
            ));
        }
        if input.beneficiaire.trim().is_empty() {
            return Err(DossierError::InvalidInput(
                "beneficiaire must not be empty".into(),
            ));
        }

        let supplied = input
            .numero_dossier
            .as_deref()
            .map(|n| n.trim().to_string());
        let dossier = match supplied {
            Some(numero) if numero.is_empty() => {
                return Err(DossierError::InvalidInput(
                    "numero_dossier must not be blank".into(),
                ))
            }
            Some(numero) => {
                self.storage
                    .insert_dossier(Dossier::new(actor.user_id.clone(), numero, input))
                    .await?
            }
            None => self.insert_with_generated_number(actor, input).await?,
        };

        info!(
            dossier = %dossier.id,
            numero = %dossier.numero_dossier,
            actor = %actor,
            "Dossier created"
        );
        self.append_event(
            NewDossierEvent::new(
                dossier.id.clone(),
                DossierEventKind::Created,
                format!("Dossier {} créé", dossier.numero_dossier),
            )
            .with_actor(actor.user_id.clone()),
        )
        .await;

        Ok(dossier)
    }

    /// Numbers supplied by callers may already occupy sequence slots, so a
    /// taken number moves on to the next sequence value.
    async fn insert_with_generated_number(
        &self,
        actor: &Actor,
        input: NewDossier,
    ) -> DossierResult<Dossier> {
        let year = Utc::now().year();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let sequence = self.storage.next_dossier_sequence(year).await?;
            let numero = self.config.dossier_number(year, sequence);
            let candidate = Dossier::new(actor.user_id.clone(), numero.clone(), input.clone());
            match self.storage.insert_dossier(candidate).await {
                Err(StorageError::Conflict(reason)) if attempts < MAX_NUMBER_ATTEMPTS => {
                    debug!(numero = %numero, %reason, "Generated dossier number taken, retrying");
                }
                result => return Ok(result?),
            }
        }
    }

    pub async fn get_dossier(&self, id: &DossierId) -> DossierResult<Dossier> {
        self.storage
            .get_dossier(id)
            .await?
            .ok_or_else(|| DossierError::invalid_reference("dossier", id))
    }

    pub async fn submit(&self, id: &DossierId, actor: &Actor) -> DossierResult<Dossier> {
        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::Submitted, |d, now| {
                self.state_machine.submit(d, actor, now)
            })
            .await?;
        Ok(dossier)
    }

    // ── Checklists ───────────────────────────────────────────────────

    /// Append a checklist verdict to the ledger. Takes no dossier lock.
    pub async fn record_validation(
        &self,
        id: &DossierId,
        verdict: CheckItemVerdict,
        actor: &Actor,
    ) -> DossierResult<ValidationRecord> {
        self.ledger.record(id, verdict, actor).await
    }

    /// Current checklist summary of a stage, computed fresh from the ledger
    pub async fn evaluate(
        &self,
        id: &DossierId,
        stage: ReviewStage,
    ) -> DossierResult<ValidationStatus> {
        self.get_dossier(id).await?;
        let records = self.ledger.history(id).await?;
        Ok(self.evaluator.evaluate(stage, &records))
    }

    // ── Budget Controller ────────────────────────────────────────────

    pub async fn cb_validate(&self, id: &DossierId, actor: &Actor) -> DossierResult<Dossier> {
        let records = self.ledger.history(id).await?;
        let status = self.evaluator.evaluate(ReviewStage::Cb, &records);

        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::CbValidated, |d, now| {
                self.state_machine.cb_validate(d, actor, &status, now)
            })
            .await?;

        self.notify_author(
            &dossier,
            "Dossier validé",
            format!(
                "Le dossier {} a été validé par le contrôleur budgétaire",
                dossier.numero_dossier
            ),
        )
        .await;
        Ok(dossier)
    }

    pub async fn cb_reject(
        &self,
        id: &DossierId,
        actor: &Actor,
        reason: &str,
        details: Option<&str>,
    ) -> DossierResult<Dossier> {
        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::CbRejected, |d, now| {
                self.state_machine.cb_reject(d, actor, reason, details, now)
            })
            .await?;

        let reason = dossier.rejection_reason().unwrap_or_default().to_string();
        self.notify_author(
            &dossier,
            "Dossier rejeté",
            format!("Le dossier {} a été rejeté : {}", dossier.numero_dossier, reason),
        )
        .await;
        Ok(dossier)
    }

    pub async fn resubmit(&self, id: &DossierId, actor: &Actor) -> DossierResult<Dossier> {
        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::Resubmitted, |d, now| {
                self.state_machine.resubmit(d, actor, now)
            })
            .await?;
        Ok(dossier)
    }

    // ── Ordonnateur ──────────────────────────────────────────────────

    /// Order the payment, then push the dossier to the accounting system.
    ///
    /// The submission is attempted once, after the commit, and bounded by
    /// the configured timeout. Its failure never undoes the payment order;
    /// inspect [`OrdonnanceOutcome::warning`] and use
    /// [`retry_ac_submission`](Self::retry_ac_submission) to try again.
    pub async fn ordonnance(
        &self,
        id: &DossierId,
        actor: &Actor,
        comment: Option<&str>,
    ) -> DossierResult<OrdonnanceOutcome> {
        let records = self.ledger.history(id).await?;
        let status = self.evaluator.evaluate(ReviewStage::Ordonnateur, &records);

        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::Ordonnanced, |d, now| {
                self.state_machine.ordonnance(d, actor, &status, comment, now)
            })
            .await?;

        self.notify_author(
            &dossier,
            "Dossier ordonnancé",
            format!("Le paiement du dossier {} a été ordonnancé", dossier.numero_dossier),
        )
        .await;

        let submission = self
            .submit_to_accounting(&dossier, actor, dossier.ordonnance_comment.as_deref())
            .await;
        Ok(OrdonnanceOutcome {
            dossier,
            submission,
        })
    }

    /// Retry the comptabilization submission of an ordered dossier.
    ///
    /// Records the attempt as an event; never changes the status.
    pub async fn retry_ac_submission(
        &self,
        id: &DossierId,
        actor: &Actor,
        comment: Option<&str>,
    ) -> DossierResult<SubmissionOutcome> {
        if !(actor.has_role(Role::Ordonnateur) || actor.has_role(Role::AgentComptable)) {
            return Err(DossierError::forbidden(
                &actor.user_id,
                format!("role {} cannot resubmit to the accounting system", actor.role),
            ));
        }

        let dossier = self.get_dossier(id).await?;
        if dossier.statut != DossierStatus::ValideOrdonnateur {
            return Err(DossierError::IllegalTransition {
                from: dossier.statut,
                to: dossier.statut,
            });
        }

        let comment = comment.or(dossier.ordonnance_comment.as_deref());
        Ok(self.submit_to_accounting(&dossier, actor, comment).await)
    }

    // ── Accountant ───────────────────────────────────────────────────

    /// Cross-role audit of an ordered dossier
    pub async fn reconcile(&self, id: &DossierId) -> DossierResult<ReconciliationReport> {
        let dossier = self.get_dossier(id).await?;
        let records = self.ledger.history(id).await?;
        self.reconciler.reconcile(&dossier, &records)
    }

    /// Pay the dossier. Incoherences in the reconciliation report block the
    /// payment unless an override justification is given.
    pub async fn settle(
        &self,
        id: &DossierId,
        actor: &Actor,
        override_justification: Option<&str>,
    ) -> DossierResult<Dossier> {
        let records = self.ledger.history(id).await?;

        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::Settled, |d, now| {
                let report = match self.reconciler.reconcile(d, &records) {
                    Ok(report) => report,
                    Err(DossierError::NotReadyForReconciliation { status, .. }) => {
                        return Err(DossierError::IllegalTransition {
                            from: status,
                            to: DossierStatus::Paye,
                        })
                    }
                    Err(other) => return Err(other),
                };
                if !report.eligible_for_settlement() {
                    debug!(
                        dossier = %d.id,
                        incoherences = report.incoherence_count(),
                        "Settlement requires an override"
                    );
                }
                self.state_machine
                    .settle(d, actor, &report, override_justification, now)
            })
            .await?;

        if let Some(justification) = &dossier.settlement_override {
            warn!(
                dossier = %dossier.id,
                actor = %actor,
                justification = %justification,
                "Dossier settled despite reconciliation incoherences"
            );
        }

        self.notify_author(
            &dossier,
            "Dossier payé",
            format!("Le dossier {} a été payé", dossier.numero_dossier),
        )
        .await;
        Ok(dossier)
    }

    pub async fn close(&self, id: &DossierId, actor: &Actor) -> DossierResult<Dossier> {
        let (dossier, _) = self
            .transition(id, actor, DossierEventKind::Closed, |d, now| {
                self.state_machine.close(d, actor, now)
            })
            .await?;

        self.notify_author(
            &dossier,
            "Dossier clôturé",
            format!("Le dossier {} est clôturé", dossier.numero_dossier),
        )
        .await;
        Ok(dossier)
    }

    // ── Housekeeping ─────────────────────────────────────────────────

    /// Hard-delete a rejected dossier. Its ledger and events are kept.
    pub async fn purge_rejected(&self, id: &DossierId, actor: &Actor) -> DossierResult<()> {
        let dossier = self.get_dossier(id).await?;
        self.state_machine.check_purge(&dossier, actor)?;
        self.storage.delete_dossier(id, dossier.version).await?;

        info!(dossier = %id, actor = %actor, "Rejected dossier purged");
        self.append_event(
            NewDossierEvent::new(
                id.clone(),
                DossierEventKind::Purged,
                format!("Dossier {} supprimé", dossier.numero_dossier),
            )
            .with_actor(actor.user_id.clone()),
        )
        .await;
        Ok(())
    }

    /// Validation ledger of a dossier in append order
    pub async fn history(&self, id: &DossierId) -> DossierResult<Vec<ValidationRecord>> {
        self.ledger.history(id).await
    }

    pub async fn events(&self, id: &DossierId) -> DossierResult<Vec<DossierEvent>> {
        Ok(self.storage.list_events(id).await?)
    }

    // ── Internal helpers ─────────────────────────────────────────────

    /// Read, apply one state machine step and write back under the version
    /// read. Nothing is written when the step fails.
    async fn transition<F>(
        &self,
        id: &DossierId,
        actor: &Actor,
        kind: DossierEventKind,
        step: F,
    ) -> DossierResult<(Dossier, Transition)>
    where
        F: FnOnce(&mut Dossier, DateTime<Utc>) -> DossierResult<Transition>,
    {
        let mut dossier = self.get_dossier(id).await?;
        let expected_version = dossier.version;

        let transition = step(&mut dossier, Utc::now())?;
        let saved = self.storage.update_dossier(dossier, expected_version).await?;

        info!(
            dossier = %saved.id,
            from = %transition.from,
            to = %transition.to,
            actor = %actor,
            version = saved.version,
            "Dossier transition committed"
        );
        self.append_event(
            NewDossierEvent::new(
                saved.id.clone(),
                kind,
                format!("{} -> {}", transition.from, transition.to),
            )
            .with_actor(actor.user_id.clone())
            .with_transition(transition.from, transition.to),
        )
        .await;

        Ok((saved, transition))
    }

    async fn submit_to_accounting(
        &self,
        dossier: &Dossier,
        actor: &Actor,
        comment: Option<&str>,
    ) -> SubmissionOutcome {
        let timeout = self.config.ac_submission.timeout();
        let attempt = tokio::time::timeout(timeout, self.submitter.submit(&dossier.id, comment));

        let outcome = match attempt.await {
            Ok(Ok(AcResponse::Accepted)) => SubmissionOutcome::Accepted,
            Ok(Ok(AcResponse::Rejected { reason })) => SubmissionOutcome::Rejected { reason },
            Ok(Err(e)) => SubmissionOutcome::Failed {
                error: e.to_string(),
            },
            Err(_) => SubmissionOutcome::TimedOut {
                after_ms: self.config.ac_submission.timeout_ms,
            },
        };

        let (kind, message) = match &outcome {
            SubmissionOutcome::Accepted => {
                info!(dossier = %dossier.id, "Accounting submission accepted");
                (
                    DossierEventKind::AcSubmissionAccepted,
                    "Soumission comptable acceptée".to_string(),
                )
            }
            other => {
                let reason = other
                    .warning(&dossier.id)
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!(dossier = %dossier.id, reason = %reason, "Accounting submission failed");
                (DossierEventKind::AcSubmissionFailed, reason)
            }
        };

        self.append_event(
            NewDossierEvent::new(dossier.id.clone(), kind, message)
                .with_actor(actor.user_id.clone()),
        )
        .await;

        outcome
    }

    /// Event appends follow an already committed change; a failure is
    /// logged and does not fail the operation.
    async fn append_event(&self, event: NewDossierEvent) {
        let dossier = event.dossier_id.clone();
        let kind = event.kind;
        if let Err(e) = self.storage.append_event(event).await {
            warn!(dossier = %dossier, kind = %kind, error = %e, "Failed to append dossier event");
        }
    }

    async fn notify_author(&self, dossier: &Dossier, title: &str, message: String) {
        if !self.config.notifications.enabled {
            return;
        }

        let notification = Notification::new(dossier.secretaire_id.clone(), title, message)
            .with_metadata("dossier_id", &dossier.id)
            .with_metadata("numero_dossier", &dossier.numero_dossier)
            .with_metadata("statut", dossier.statut);

        if let Err(e) = self.notifier.notify(notification).await {
            warn!(
                dossier = %dossier.id,
                user = %dossier.secretaire_id,
                error = %e,
                "Failed to notify dossier author"
            );
        }
    }
}
