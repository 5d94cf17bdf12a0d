//! End-to-end tests: a dossier's journey from draft to closure.
//!
//! Verifies that:
//! - the CB and Ordonnateur gates follow the ledger
//! - rejection and resubmission round-trip the rejection metadata
//! - the comptabilization submission never rolls back a payment order
//! - reconciliation flags cross-role conflicts before settlement
//! - concurrent transitions on one dossier produce a single winner

use async_trait::async_trait;
use dossier_engine::*;
use dossier_types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CB_ITEMS: [(&str, &str); 5] = [
    ("type-operation", "nature-depense"),
    ("type-operation", "imputation-budgetaire"),
    ("controles-fond", "disponibilite-credits"),
    ("controles-fond", "exactitude-montant"),
    ("controles-fond", "pieces-justificatives"),
];

const ORDO_ITEMS: [(&str, &str); 4] = [
    ("controles-ordonnateur", "ordo-disponibilite-credits"),
    ("controles-ordonnateur", "ordo-exactitude-montant"),
    ("controles-ordonnateur", "ordo-pieces-justificatives"),
    ("service-fait", "attestation-service-fait"),
];

struct Harness<S: WorkflowStorage + ?Sized = InMemoryWorkflowStorage> {
    workflow: DossierWorkflow<S>,
    submitter: Arc<RecordingAcSubmitter>,
    notifier: Arc<RecordingNotificationSink>,
    secretary: Actor,
    cb: Actor,
    ordonnateur: Actor,
    ac: Actor,
}

fn harness() -> Harness {
    harness_with(
        Arc::new(InMemoryWorkflowStorage::new()),
        RecordingAcSubmitter::accepting(),
        WorkflowConfig::default(),
    )
}

fn harness_with<S: WorkflowStorage + ?Sized>(
    storage: Arc<S>,
    submitter: RecordingAcSubmitter,
    config: WorkflowConfig,
) -> Harness<S> {
    let submitter = Arc::new(submitter);
    let notifier = Arc::new(RecordingNotificationSink::new());
    let workflow = DossierWorkflow::new(storage, config, submitter.clone(), notifier.clone())
        .expect("valid configuration");
    Harness {
        workflow,
        submitter,
        notifier,
        secretary: Actor::secretaire("sec-1"),
        cb: Actor::cb("cb-1"),
        ordonnateur: Actor::ordonnateur("ordo-1"),
        ac: Actor::agent_comptable("ac-1"),
    }
}

impl<S: WorkflowStorage + ?Sized> Harness<S> {
    async fn submitted(&self, numero: &str) -> Dossier {
        let dossier = self
            .workflow
            .create_dossier(
                &self.secretary,
                NewDossier::new("Achat de matériel informatique", "Informatique SARL")
                    .with_numero(numero)
                    .with_folder("folder-1"),
            )
            .await
            .unwrap();
        self.workflow
            .submit(&dossier.id, &self.secretary)
            .await
            .unwrap()
    }

    async fn record(&self, id: &DossierId, actor: &Actor, items: &[(&str, &str)], valide: bool) {
        for (category, item) in items {
            self.workflow
                .record_validation(id, CheckItemVerdict::new(*category, *item, valide), actor)
                .await
                .unwrap();
        }
    }

    async fn ordonnanced(&self, numero: &str) -> Dossier {
        let dossier = self.submitted(numero).await;
        self.record(&dossier.id, &self.cb, &CB_ITEMS, true).await;
        self.workflow.cb_validate(&dossier.id, &self.cb).await.unwrap();
        self.record(&dossier.id, &self.ordonnateur, &ORDO_ITEMS, true)
            .await;
        self.workflow
            .ordonnance(&dossier.id, &self.ordonnateur, Some("Bon pour paiement"))
            .await
            .unwrap()
            .dossier
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unrecorded_checklist_blocks_cb_validation() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    assert_eq!(dossier.statut, DossierStatus::EnAttente);
    assert!(dossier.date_depot.is_some());

    let status = h.workflow.evaluate(&dossier.id, ReviewStage::Cb).await.unwrap();
    assert!(!status.can_validate());
    assert_eq!(status.missing_validations.len(), 5);

    let err = h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap_err();
    match err {
        DossierError::ValidationGateNotMet { missing } => {
            assert_eq!(missing, status.missing_validations)
        }
        other => panic!("unexpected error: {other}"),
    }
    let stored = h.workflow.get_dossier(&dossier.id).await.unwrap();
    assert_eq!(stored.statut, DossierStatus::EnAttente);
}

#[tokio::test]
async fn complete_checklist_opens_cb_gate() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS, true).await;

    let status = h.workflow.evaluate(&dossier.id, ReviewStage::Cb).await.unwrap();
    assert!(status.can_validate());

    let validated = h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap();
    assert_eq!(validated.statut, DossierStatus::ValideCb);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, h.secretary.user_id);
    assert_eq!(sent[0].metadata["statut"], "VALIDÉ_CB");
}

#[tokio::test]
async fn rejection_and_resubmission() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;

    let rejected = h
        .workflow
        .cb_reject(&dossier.id, &h.cb, "Pièces manquantes", None)
        .await
        .unwrap();
    assert_eq!(rejected.statut, DossierStatus::RejeteCb);
    assert_eq!(rejected.rejection_reason(), Some("Pièces manquantes"));
    assert!(rejected.rejection.as_ref().is_some());

    let err = h
        .workflow
        .resubmit(&dossier.id, &Actor::secretaire("sec-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, DossierError::Forbidden { .. }));

    let resubmitted = h
        .workflow
        .resubmit(&dossier.id, &h.secretary)
        .await
        .unwrap();
    assert_eq!(resubmitted.statut, DossierStatus::EnAttente);
    assert!(resubmitted.rejection.is_none());
}

#[tokio::test]
async fn failing_record_survives_resubmission() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS, true).await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS[3..4], false).await;

    h.workflow
        .cb_reject(&dossier.id, &h.cb, "Montant erroné", Some("Écart de 120 000"))
        .await
        .unwrap();
    h.workflow.resubmit(&dossier.id, &h.secretary).await.unwrap();

    let status = h.workflow.evaluate(&dossier.id, ReviewStage::Cb).await.unwrap();
    assert!(!status.can_validate());
    assert_eq!(
        status.missing_validations,
        vec!["Exactitude du montant (rejeté)".to_string()]
    );

    h.record(&dossier.id, &h.cb, &CB_ITEMS[3..4], true).await;
    let validated = h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap();
    assert_eq!(validated.statut, DossierStatus::ValideCb);
}

#[tokio::test]
async fn ordonnance_submits_to_accounting_once() {
    let h = harness();
    let dossier = h.ordonnanced("DOSS-ACGE-2025001").await;
    assert_eq!(dossier.statut, DossierStatus::ValideOrdonnateur);

    let calls = h.submitter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].dossier_id, dossier.id);
    assert_eq!(calls[0].comment.as_deref(), Some("Bon pour paiement"));

    let kinds: Vec<_> = h
        .workflow
        .events(&dossier.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            DossierEventKind::Created,
            DossierEventKind::Submitted,
            DossierEventKind::CbValidated,
            DossierEventKind::Ordonnanced,
            DossierEventKind::AcSubmissionAccepted,
        ]
    );
}

#[tokio::test]
async fn rejected_mirror_is_a_status_conflict() {
    let h = harness();
    let dossier = h.ordonnanced("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.ordonnateur, &ORDO_ITEMS[1..2], false)
        .await;

    let report = h.workflow.reconcile(&dossier.id).await.unwrap();
    assert_eq!(report.incoherence_count(), 1);
    assert_eq!(report.incoherences[0].kind, IncoherenceType::StatusConflict);
    assert_eq!(report.incoherences[0].severite, Severity::Haute);
    assert!(!report.eligible_for_settlement());
}

// ---------------------------------------------------------------------------
// Comptabilization failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_failure_keeps_payment_order() {
    let h = harness_with(
        Arc::new(InMemoryWorkflowStorage::new()),
        RecordingAcSubmitter::failing("service indisponible"),
        WorkflowConfig::default(),
    );
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS, true).await;
    h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap();
    h.record(&dossier.id, &h.ordonnateur, &ORDO_ITEMS, true)
        .await;

    let outcome = h
        .workflow
        .ordonnance(&dossier.id, &h.ordonnateur, None)
        .await
        .unwrap();
    assert_eq!(outcome.dossier.statut, DossierStatus::ValideOrdonnateur);
    assert!(matches!(outcome.submission, SubmissionOutcome::Failed { .. }));
    assert!(matches!(
        outcome.warning(),
        Some(DossierError::ExternalSubmissionFailed { .. })
    ));

    h.submitter.recover();
    let retried = h
        .workflow
        .retry_ac_submission(&dossier.id, &h.ac, None)
        .await
        .unwrap();
    assert!(retried.is_accepted());
    assert_eq!(h.submitter.calls().len(), 2);

    let stored = h.workflow.get_dossier(&dossier.id).await.unwrap();
    assert_eq!(stored.statut, DossierStatus::ValideOrdonnateur);
    assert_eq!(stored.version, outcome.dossier.version);

    let kinds: Vec<_> = h
        .workflow
        .events(&dossier.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event.kind)
        .collect();
    assert!(kinds.contains(&DossierEventKind::AcSubmissionFailed));
    assert_eq!(kinds.last(), Some(&DossierEventKind::AcSubmissionAccepted));
}

#[tokio::test]
async fn submission_timeout_is_reported() {
    let mut config = WorkflowConfig::default();
    config.ac_submission.timeout_ms = 20;
    let h = harness_with(
        Arc::new(InMemoryWorkflowStorage::new()),
        RecordingAcSubmitter::accepting().with_delay(Duration::from_millis(500)),
        config,
    );
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS, true).await;
    h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap();
    h.record(&dossier.id, &h.ordonnateur, &ORDO_ITEMS, true)
        .await;

    let outcome = h
        .workflow
        .ordonnance(&dossier.id, &h.ordonnateur, None)
        .await
        .unwrap();
    assert_eq!(
        outcome.submission,
        SubmissionOutcome::TimedOut { after_ms: 20 }
    );
    assert_eq!(outcome.dossier.statut, DossierStatus::ValideOrdonnateur);
}

#[tokio::test]
async fn retry_requires_ordered_dossier_and_role() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;

    let err = h
        .workflow
        .retry_ac_submission(&dossier.id, &h.cb, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DossierError::Forbidden { .. }));

    let err = h
        .workflow
        .retry_ac_submission(&dossier.id, &h.ordonnateur, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DossierError::IllegalTransition { .. }));
    assert!(h.submitter.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Settlement and closure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_dossier_settles_and_closes() {
    let h = harness();
    let dossier = h.ordonnanced("DOSS-ACGE-2025001").await;

    let err = h
        .workflow
        .settle(&dossier.id, &h.ordonnateur, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DossierError::Forbidden { .. }));

    let paid = h.workflow.settle(&dossier.id, &h.ac, None).await.unwrap();
    assert_eq!(paid.statut, DossierStatus::Paye);
    assert!(paid.settlement_override.is_none());

    let closed = h.workflow.close(&dossier.id, &h.ac).await.unwrap();
    assert_eq!(closed.statut, DossierStatus::Termine);

    let titles: Vec<_> = h.notifier.sent().into_iter().map(|n| n.title).collect();
    assert_eq!(
        titles,
        vec![
            "Dossier validé",
            "Dossier ordonnancé",
            "Dossier payé",
            "Dossier clôturé",
        ]
    );
}

#[tokio::test]
async fn incoherences_require_override() {
    let h = harness();
    let dossier = h.ordonnanced("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.ordonnateur, &ORDO_ITEMS[0..1], false)
        .await;

    let err = h.workflow.settle(&dossier.id, &h.ac, None).await.unwrap_err();
    assert!(matches!(err, DossierError::ValidationGateNotMet { .. }));

    let paid = h
        .workflow
        .settle(&dossier.id, &h.ac, Some("Crédits confirmés par téléphone"))
        .await
        .unwrap();
    assert_eq!(paid.statut, DossierStatus::Paye);
    assert_eq!(
        paid.settlement_override.as_deref(),
        Some("Crédits confirmés par téléphone")
    );
}

#[tokio::test]
async fn early_settlement_and_reconciliation_fail() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;

    let err = h.workflow.reconcile(&dossier.id).await.unwrap_err();
    assert!(matches!(err, DossierError::NotReadyForReconciliation { .. }));

    let err = h.workflow.settle(&dossier.id, &h.ac, None).await.unwrap_err();
    assert!(matches!(
        err,
        DossierError::IllegalTransition {
            from: DossierStatus::EnAttente,
            to: DossierStatus::Paye
        }
    ));
}

#[tokio::test]
async fn notification_failures_do_not_fail_transitions() {
    let storage = Arc::new(InMemoryWorkflowStorage::new());
    let workflow = DossierWorkflow::new(
        storage,
        WorkflowConfig::default(),
        Arc::new(RecordingAcSubmitter::accepting()),
        Arc::new(RecordingNotificationSink::failing()),
    )
    .unwrap();
    let sec = Actor::secretaire("sec-1");
    let dossier = workflow
        .create_dossier(&sec, NewDossier::new("Achat", "Fournisseur").with_folder("f"))
        .await
        .unwrap();
    workflow.submit(&dossier.id, &sec).await.unwrap();

    let rejected = workflow
        .cb_reject(&dossier.id, &Actor::cb("cb-1"), "Pièces manquantes", None)
        .await
        .unwrap();
    assert_eq!(rejected.statut, DossierStatus::RejeteCb);
}

#[tokio::test]
async fn disabled_notifications_are_not_sent() {
    let mut config = WorkflowConfig::default();
    config.notifications.enabled = false;
    let h = harness_with(
        Arc::new(InMemoryWorkflowStorage::new()),
        RecordingAcSubmitter::accepting(),
        config,
    );
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.workflow
        .cb_reject(&dossier.id, &h.cb, "Pièces manquantes", None)
        .await
        .unwrap();
    assert!(h.notifier.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Purge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_rejected_dossiers_are_purged() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS[0..1], false).await;

    let err = h
        .workflow
        .purge_rejected(&dossier.id, &h.secretary)
        .await
        .unwrap_err();
    assert!(matches!(err, DossierError::IllegalTransition { .. }));

    h.workflow
        .cb_reject(&dossier.id, &h.cb, "Hors budget", None)
        .await
        .unwrap();
    h.workflow
        .purge_rejected(&dossier.id, &h.secretary)
        .await
        .unwrap();

    let err = h.workflow.get_dossier(&dossier.id).await.unwrap_err();
    assert!(matches!(err, DossierError::InvalidReference { .. }));
    // The audit trail outlives the dossier
    assert_eq!(h.workflow.history(&dossier.id).await.unwrap().len(), 1);
    let events = h.workflow.events(&dossier.id).await.unwrap();
    assert_eq!(
        events.last().map(|e| e.event.kind),
        Some(DossierEventKind::Purged)
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// Delegating store that lets another writer slip in before the next update
#[derive(Default)]
struct RacingStorage {
    inner: InMemoryWorkflowStorage,
    race_next_update: AtomicBool,
}

#[async_trait]
impl DossierStore for RacingStorage {
    async fn insert_dossier(&self, dossier: Dossier) -> StorageResult<Dossier> {
        self.inner.insert_dossier(dossier).await
    }

    async fn get_dossier(&self, id: &DossierId) -> StorageResult<Option<Dossier>> {
        self.inner.get_dossier(id).await
    }

    async fn update_dossier(
        &self,
        dossier: Dossier,
        expected_version: u64,
    ) -> StorageResult<Dossier> {
        if self.race_next_update.swap(false, Ordering::SeqCst) {
            if let Some(current) = self.inner.get_dossier(&dossier.id).await? {
                let version = current.version;
                self.inner.update_dossier(current, version).await?;
            }
        }
        self.inner.update_dossier(dossier, expected_version).await
    }

    async fn delete_dossier(&self, id: &DossierId, expected_version: u64) -> StorageResult<()> {
        self.inner.delete_dossier(id, expected_version).await
    }

    async fn next_dossier_sequence(&self, year: i32) -> StorageResult<u64> {
        self.inner.next_dossier_sequence(year).await
    }
}

#[async_trait]
impl ValidationStore for RacingStorage {
    async fn append_validation(
        &self,
        validation: NewValidation,
    ) -> StorageResult<ValidationRecord> {
        self.inner.append_validation(validation).await
    }

    async fn list_validations(
        &self,
        dossier_id: &DossierId,
    ) -> StorageResult<Vec<ValidationRecord>> {
        self.inner.list_validations(dossier_id).await
    }
}

#[async_trait]
impl DossierEventStore for RacingStorage {
    async fn append_event(&self, event: NewDossierEvent) -> StorageResult<DossierEvent> {
        self.inner.append_event(event).await
    }

    async fn list_events(&self, dossier_id: &DossierId) -> StorageResult<Vec<DossierEvent>> {
        self.inner.list_events(dossier_id).await
    }
}

#[tokio::test]
async fn losing_writer_gets_concurrent_modification() {
    let storage = Arc::new(RacingStorage::default());
    let h = harness_with(
        storage.clone(),
        RecordingAcSubmitter::accepting(),
        WorkflowConfig::default(),
    );
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS, true).await;

    storage.race_next_update.store(true, Ordering::SeqCst);
    let err = h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap_err();
    assert!(matches!(err, DossierError::ConcurrentModification(_)));
    assert!(err.is_retryable());

    let stored = h.workflow.get_dossier(&dossier.id).await.unwrap();
    assert_eq!(stored.statut, DossierStatus::EnAttente);

    // A retry on fresh state succeeds
    let validated = h.workflow.cb_validate(&dossier.id, &h.cb).await.unwrap();
    assert_eq!(validated.statut, DossierStatus::ValideCb);
}

#[tokio::test]
async fn simultaneous_decisions_have_one_winner() {
    let h = harness();
    let dossier = h.submitted("DOSS-ACGE-2025001").await;
    h.record(&dossier.id, &h.cb, &CB_ITEMS, true).await;

    let other_cb = Actor::cb("cb-2");
    let (a, b) = tokio::join!(
        h.workflow.cb_validate(&dossier.id, &h.cb),
        h.workflow
            .cb_reject(&dossier.id, &other_cb, "Doublon", None),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
    for result in [a.err(), b.err()].into_iter().flatten() {
        assert!(matches!(
            result,
            DossierError::ConcurrentModification(_) | DossierError::IllegalTransition { .. }
        ));
    }

    let stored = h.workflow.get_dossier(&dossier.id).await.unwrap();
    assert_eq!(stored.version, dossier.version + 1);
    assert!(stored.rejection_consistent());
}
