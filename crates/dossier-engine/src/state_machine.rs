//! State machine: the authoritative dossier transition function
//!
//! Every status change goes through here. The state machine checks, in this
//! order, the caller's input, the legality of the edge, the caller's role and
//! finally the validation gate, then mutates the dossier in place. It never
//! touches storage; the workflow service persists the result under an
//! optimistic-concurrency check.

use chrono::{DateTime, Utc};
use dossier_types::{
    Actor, Dossier, DossierError, DossierResult, DossierStatus, ReconciliationReport, Rejection,
    Role, ValidationStatus,
};

/// A committed status change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: DossierStatus,
    pub to: DossierStatus,
}

/// Applies legal transitions to dossiers
#[derive(Clone, Debug, Default)]
pub struct DossierStateMachine;

impl DossierStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// BROUILLON → EN_ATTENTE, by the owning secretary.
    ///
    /// Requires an attachment folder and a dossier number. Stamps
    /// `date_depot` when the creator left it empty.
    pub fn submit(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        self.check_edge(dossier, DossierStatus::EnAttente, &[DossierStatus::Brouillon])?;
        self.require_author(dossier, actor)?;

        if dossier.numero_dossier.trim().is_empty() {
            return Err(DossierError::InvalidInput(
                "dossier number must not be empty".into(),
            ));
        }
        if dossier.folder_id.as_deref().map_or(true, |f| f.trim().is_empty()) {
            return Err(DossierError::InvalidInput(
                "a dossier cannot be submitted without attached files".into(),
            ));
        }

        if dossier.date_depot.is_none() {
            dossier.date_depot = Some(now);
        }
        Ok(self.apply(dossier, DossierStatus::EnAttente, now))
    }

    /// EN_ATTENTE → VALIDÉ_CB, gated on the CB checklist.
    pub fn cb_validate(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        cb_status: &ValidationStatus,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        self.check_edge(dossier, DossierStatus::ValideCb, &[DossierStatus::EnAttente])?;
        self.require_role(actor, Role::ControleurBudgetaire, "validate a dossier")?;

        if !cb_status.can_validate() {
            return Err(DossierError::ValidationGateNotMet {
                missing: cb_status.missing_validations.clone(),
            });
        }
        Ok(self.apply(dossier, DossierStatus::ValideCb, now))
    }

    /// EN_ATTENTE → REJETÉ_CB with a mandatory reason.
    pub fn cb_reject(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        reason: &str,
        details: Option<&str>,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DossierError::InvalidInput(
                "a rejection reason is required".into(),
            ));
        }
        self.check_edge(dossier, DossierStatus::RejeteCb, &[DossierStatus::EnAttente])?;
        self.require_role(actor, Role::ControleurBudgetaire, "reject a dossier")?;

        dossier.rejection = Some(Rejection {
            reason: reason.to_string(),
            details: details
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            rejected_at: now,
            rejected_by: actor.user_id.clone(),
        });
        Ok(self.apply(dossier, DossierStatus::RejeteCb, now))
    }

    /// REJETÉ_CB → EN_ATTENTE by the original author; clears the rejection.
    ///
    /// Ledger records are left untouched: a failing effective record keeps
    /// blocking the CB gate until a passing record is appended.
    pub fn resubmit(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        self.check_edge(dossier, DossierStatus::EnAttente, &[DossierStatus::RejeteCb])?;
        self.require_author(dossier, actor)?;

        dossier.rejection = None;
        Ok(self.apply(dossier, DossierStatus::EnAttente, now))
    }

    /// VALIDÉ_CB → VALIDÉ_ORDONNATEUR, gated on the Ordonnateur checklist.
    pub fn ordonnance(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        ordo_status: &ValidationStatus,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        self.check_edge(
            dossier,
            DossierStatus::ValideOrdonnateur,
            &[DossierStatus::ValideCb],
        )?;
        self.require_role(actor, Role::Ordonnateur, "order a payment")?;

        if !ordo_status.can_ordonnance() {
            return Err(DossierError::ValidationGateNotMet {
                missing: ordo_status.missing_validations.clone(),
            });
        }

        dossier.ordonnance_comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Ok(self.apply(dossier, DossierStatus::ValideOrdonnateur, now))
    }

    /// VALIDÉ_ORDONNATEUR → PAYÉ. Incoherences need an explicit override.
    pub fn settle(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        report: &ReconciliationReport,
        override_justification: Option<&str>,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        let justification = match override_justification.map(str::trim) {
            Some("") => {
                return Err(DossierError::InvalidInput(
                    "a settlement override needs a justification".into(),
                ))
            }
            other => other,
        };
        self.check_edge(dossier, DossierStatus::Paye, &[DossierStatus::ValideOrdonnateur])?;
        self.require_role(actor, Role::AgentComptable, "settle a dossier")?;

        if !report.eligible_for_settlement() {
            let Some(justification) = justification else {
                return Err(DossierError::ValidationGateNotMet {
                    missing: report
                        .incoherences
                        .iter()
                        .map(|i| i.description.clone())
                        .collect(),
                });
            };
            dossier.settlement_override = Some(justification.to_string());
        }
        Ok(self.apply(dossier, DossierStatus::Paye, now))
    }

    /// PAYÉ → TERMINÉ.
    pub fn close(
        &self,
        dossier: &mut Dossier,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> DossierResult<Transition> {
        self.check_edge(dossier, DossierStatus::Termine, &[DossierStatus::Paye])?;
        self.require_role(actor, Role::AgentComptable, "close a dossier")?;
        Ok(self.apply(dossier, DossierStatus::Termine, now))
    }

    /// Check that the hard-delete of a dossier is allowed
    pub fn check_purge(&self, dossier: &Dossier, actor: &Actor) -> DossierResult<()> {
        if dossier.statut != DossierStatus::RejeteCb {
            return Err(DossierError::IllegalTransition {
                from: dossier.statut,
                to: dossier.statut,
            });
        }
        self.require_author(dossier, actor)
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn check_edge(
        &self,
        dossier: &Dossier,
        to: DossierStatus,
        sources: &[DossierStatus],
    ) -> DossierResult<()> {
        let from = dossier.statut;
        if sources.contains(&from) && from.can_transition_to(to) {
            Ok(())
        } else {
            Err(DossierError::IllegalTransition { from, to })
        }
    }

    fn require_role(&self, actor: &Actor, role: Role, action: &str) -> DossierResult<()> {
        if actor.has_role(role) {
            Ok(())
        } else {
            Err(DossierError::forbidden(
                &actor.user_id,
                format!("role {} cannot {}; {} required", actor.role, action, role),
            ))
        }
    }

    fn require_author(&self, dossier: &Dossier, actor: &Actor) -> DossierResult<()> {
        self.require_role(actor, Role::Secretaire, "act on behalf of the author")?;
        if actor.user_id != dossier.secretaire_id {
            return Err(DossierError::forbidden(
                &actor.user_id,
                format!("dossier {} belongs to {}", dossier.numero_dossier, dossier.secretaire_id),
            ));
        }
        Ok(())
    }

    fn apply(&self, dossier: &mut Dossier, to: DossierStatus, now: DateTime<Utc>) -> Transition {
        let from = dossier.statut;
        dossier.statut = to;
        dossier.updated_at = now;
        Transition { from, to }
    }
}
