//! Scenario commands: replay a dossier's journey against an in-memory engine
//!
//! A scenario file (YAML or JSON) lists the operations to apply, in order,
//! to a single dossier. Each step names its actor; a step may declare the
//! error it is expected to raise.

use crate::error::{CliError, CliResult};
use crate::output::{self, print_error, print_info, print_success, print_warning, OutputFormat};
use async_trait::async_trait;
use clap::Subcommand;
use colored::*;
use dossier_engine::{
    CollaboratorError, DossierWorkflow, InMemoryWorkflowStorage, Notification, NotificationSink,
    RecordingAcSubmitter, WorkflowConfig,
};
use dossier_types::{
    Actor, CheckItemVerdict, Dossier, DossierError, DossierEvent, DossierId, NewDossier,
    ReconciliationReport, ReviewStage, ValidationStatus,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

/// Scenario subcommands
#[derive(Subcommand)]
pub enum ScenarioCommands {
    /// Run a scenario file
    Run {
        /// Path to scenario file (YAML or JSON)
        file: String,
    },

    /// Parse a scenario file without running it
    Check {
        /// Path to scenario file (YAML or JSON)
        file: String,
    },
}

// ── Scenario file ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    /// How the simulated accounting system answers
    #[serde(default)]
    pub accounting: AccountingBehavior,

    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountingBehavior {
    #[default]
    Accept,
    Reject(String),
    Fail(String),
}

#[derive(Debug, Deserialize)]
pub struct ScenarioStep {
    #[serde(flatten)]
    pub op: Step,

    /// The step must fail with an error whose message contains this text
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Create {
        actor: Actor,
        dossier: NewDossier,
    },
    Submit {
        actor: Actor,
    },
    Record {
        actor: Actor,
        category: String,
        item: String,
        valide: bool,
        #[serde(default)]
        comment: Option<String>,
    },
    Evaluate {
        stage: ReviewStage,
    },
    CbValidate {
        actor: Actor,
    },
    CbReject {
        actor: Actor,
        reason: String,
        #[serde(default)]
        details: Option<String>,
    },
    Resubmit {
        actor: Actor,
    },
    Ordonnance {
        actor: Actor,
        #[serde(default)]
        comment: Option<String>,
    },
    RetryAcSubmission {
        actor: Actor,
        #[serde(default)]
        comment: Option<String>,
    },
    Reconcile,
    Settle {
        actor: Actor,
        #[serde(default, rename = "override")]
        override_justification: Option<String>,
    },
    Close {
        actor: Actor,
    },
    Purge {
        actor: Actor,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Submit { .. } => "submit",
            Self::Record { .. } => "record",
            Self::Evaluate { .. } => "evaluate",
            Self::CbValidate { .. } => "cb_validate",
            Self::CbReject { .. } => "cb_reject",
            Self::Resubmit { .. } => "resubmit",
            Self::Ordonnance { .. } => "ordonnance",
            Self::RetryAcSubmission { .. } => "retry_ac_submission",
            Self::Reconcile => "reconcile",
            Self::Settle { .. } => "settle",
            Self::Close { .. } => "close",
            Self::Purge { .. } => "purge",
        }
    }

    fn actor(&self) -> Option<&Actor> {
        match self {
            Self::Create { actor, .. }
            | Self::Submit { actor }
            | Self::Record { actor, .. }
            | Self::CbValidate { actor }
            | Self::CbReject { actor, .. }
            | Self::Resubmit { actor }
            | Self::Ordonnance { actor, .. }
            | Self::RetryAcSubmission { actor, .. }
            | Self::Settle { actor, .. }
            | Self::Close { actor }
            | Self::Purge { actor } => Some(actor),
            Self::Evaluate { .. } | Self::Reconcile => None,
        }
    }
}

/// Read a scenario from a YAML or JSON file
pub fn load(file: &str) -> CliResult<Scenario> {
    let contents = std::fs::read_to_string(file)?;
    let is_json = Path::new(file)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let scenario: Scenario = if is_json {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    match scenario.steps.first().map(|s| &s.op) {
        Some(Step::Create { .. }) => Ok(scenario),
        Some(_) => Err(CliError::InvalidInput(
            "the first step of a scenario must be 'create'".into(),
        )),
        None => Err(CliError::InvalidInput("scenario has no steps".into())),
    }
}

// ── Notifications ────────────────────────────────────────────────────

/// Sink that turns notifications into log lines
struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        tracing::info!(
            user = %notification.user_id,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

// ── Runner ───────────────────────────────────────────────────────────

/// Table row for one executed step
#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    step: usize,
    op: String,
    actor: String,
    result: String,
    statut: String,
}

/// Table row for one dossier event
#[derive(Debug, Serialize, Tabled)]
struct EventRow {
    #[tabled(rename = "#")]
    sequence: u64,
    kind: String,
    actor: String,
    message: String,
    at: String,
}

impl From<DossierEvent> for EventRow {
    fn from(event: DossierEvent) -> Self {
        Self {
            sequence: event.sequence,
            kind: event.event.kind.to_string(),
            actor: event
                .event
                .actor
                .map(|a| a.to_string())
                .unwrap_or_default(),
            message: event.event.message,
            at: event.event.at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ScenarioReport {
    name: Option<String>,
    steps: Vec<StepRow>,
    dossier: Option<Dossier>,
    events: Vec<EventRow>,
}

struct Runner {
    workflow: DossierWorkflow<InMemoryWorkflowStorage>,
    current: Option<DossierId>,
}

impl Runner {
    fn new(config: &WorkflowConfig, accounting: &AccountingBehavior) -> CliResult<Self> {
        let submitter = match accounting {
            AccountingBehavior::Accept => RecordingAcSubmitter::accepting(),
            AccountingBehavior::Reject(reason) => RecordingAcSubmitter::rejecting(reason),
            AccountingBehavior::Fail(message) => RecordingAcSubmitter::failing(message),
        };
        let workflow = DossierWorkflow::new(
            Arc::new(InMemoryWorkflowStorage::new()),
            config.clone(),
            Arc::new(submitter),
            Arc::new(TracingNotificationSink),
        )?;
        Ok(Self {
            workflow,
            current: None,
        })
    }

    fn current(&self) -> Result<DossierId, DossierError> {
        self.current
            .clone()
            .ok_or_else(|| DossierError::InvalidInput("no dossier created yet".into()))
    }

    /// Apply one step; returns a one-line summary
    async fn apply(&mut self, step: Step) -> Result<String, DossierError> {
        let wf = &self.workflow;
        match step {
            Step::Create { actor, dossier } => {
                let created = wf.create_dossier(&actor, dossier).await?;
                let summary = format!("{} ({})", created.numero_dossier, created.id.short());
                self.current = Some(created.id);
                Ok(summary)
            }
            Step::Submit { actor } => {
                let d = wf.submit(&self.current()?, &actor).await?;
                Ok(format!("deposited {}", fmt_date(&d)))
            }
            Step::Record {
                actor,
                category,
                item,
                valide,
                comment,
            } => {
                let mut verdict = CheckItemVerdict::new(category, item, valide);
                if let Some(comment) = comment {
                    verdict = verdict.with_comment(comment);
                }
                let record = wf.record_validation(&self.current()?, verdict, &actor).await?;
                Ok(format!(
                    "{} = {} (#{})",
                    record.check_item_id,
                    if record.valide { "ok" } else { "rejeté" },
                    record.sequence
                ))
            }
            Step::Evaluate { stage } => {
                let status = wf.evaluate(&self.current()?, stage).await?;
                Ok(summarize_status(&status))
            }
            Step::CbValidate { actor } => {
                wf.cb_validate(&self.current()?, &actor).await?;
                Ok("validated".into())
            }
            Step::CbReject {
                actor,
                reason,
                details,
            } => {
                let d = wf
                    .cb_reject(&self.current()?, &actor, &reason, details.as_deref())
                    .await?;
                Ok(format!("rejected: {}", d.rejection_reason().unwrap_or_default()))
            }
            Step::Resubmit { actor } => {
                wf.resubmit(&self.current()?, &actor).await?;
                Ok("resubmitted".into())
            }
            Step::Ordonnance { actor, comment } => {
                let outcome = wf
                    .ordonnance(&self.current()?, &actor, comment.as_deref())
                    .await?;
                Ok(match outcome.warning() {
                    None => "ordered, accounting accepted".into(),
                    Some(warning) => {
                        print_warning(&warning.to_string());
                        format!("ordered, {}", warning)
                    }
                })
            }
            Step::RetryAcSubmission { actor, comment } => {
                let id = self.current()?;
                let outcome = wf
                    .retry_ac_submission(&id, &actor, comment.as_deref())
                    .await?;
                Ok(match outcome.warning(&id) {
                    None => "accounting accepted".into(),
                    Some(warning) => warning.to_string(),
                })
            }
            Step::Reconcile => {
                let report = wf.reconcile(&self.current()?).await?;
                Ok(summarize_report(&report))
            }
            Step::Settle {
                actor,
                override_justification,
            } => {
                let d = wf
                    .settle(&self.current()?, &actor, override_justification.as_deref())
                    .await?;
                Ok(match d.settlement_override {
                    Some(justification) => format!("paid with override: {}", justification),
                    None => "paid".into(),
                })
            }
            Step::Close { actor } => {
                wf.close(&self.current()?, &actor).await?;
                Ok("closed".into())
            }
            Step::Purge { actor } => {
                wf.purge_rejected(&self.current()?, &actor).await?;
                Ok("purged".into())
            }
        }
    }

    async fn statut(&self) -> String {
        match &self.current {
            Some(id) => match self.workflow.get_dossier(id).await {
                Ok(d) => d.statut.to_string(),
                Err(_) => "-".into(),
            },
            None => "-".into(),
        }
    }
}

fn fmt_date(dossier: &Dossier) -> String {
    dossier
        .date_depot
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn summarize_status(status: &ValidationStatus) -> String {
    let gate = match status.stage {
        ReviewStage::Cb => status.can_validate(),
        ReviewStage::Ordonnateur => status.can_ordonnance(),
    };
    if status.missing_validations.is_empty() {
        format!("{} gate open: {}", status.stage, gate)
    } else {
        format!(
            "{} gate open: {}; missing: {}",
            status.stage,
            gate,
            status.missing_validations.join(", ")
        )
    }
}

fn summarize_report(report: &ReconciliationReport) -> String {
    if report.eligible_for_settlement() {
        return "no incoherence".into();
    }
    let kinds: Vec<String> = report
        .incoherences
        .iter()
        .map(|i| format!("{:?}/{:?}", i.kind, i.severite))
        .collect();
    format!(
        "{} incoherence(s): {}",
        report.incoherence_count(),
        kinds.join(", ")
    )
}

/// Execute a scenario command
pub async fn execute(
    command: ScenarioCommands,
    config: &WorkflowConfig,
    format: OutputFormat,
) -> CliResult<()> {
    match command {
        ScenarioCommands::Check { file } => {
            let scenario = load(&file)?;
            print_success(&format!(
                "{}: {} step(s)",
                scenario.name.as_deref().unwrap_or(&file),
                scenario.steps.len()
            ));
            Ok(())
        }
        ScenarioCommands::Run { file } => run(load(&file)?, config, format).await,
    }
}

async fn run(scenario: Scenario, config: &WorkflowConfig, format: OutputFormat) -> CliResult<()> {
    let mut runner = Runner::new(config, &scenario.accounting)?;
    let mut rows = Vec::with_capacity(scenario.steps.len());

    if let (Some(name), OutputFormat::Table) = (&scenario.name, format) {
        print_info(&format!("Scenario: {}", name.bold()));
    }

    for (index, ScenarioStep { op, expect_error }) in scenario.steps.into_iter().enumerate() {
        let step = index + 1;
        let name = op.name();
        let actor = op.actor().map(|a| a.to_string()).unwrap_or_default();

        let result = match (runner.apply(op).await, expect_error) {
            (Ok(summary), None) => summary,
            (Err(e), Some(expected)) if e.to_string().contains(&expected) => {
                format!("{} {}", "expected error:".dimmed(), e)
            }
            (Err(e), None) => {
                print_error(&format!("step {} ({}) failed: {}", step, name, e));
                return Err(CliError::Scenario {
                    step,
                    op: name.into(),
                    message: e.to_string(),
                });
            }
            (Err(e), Some(expected)) => {
                return Err(CliError::Scenario {
                    step,
                    op: name.into(),
                    message: format!("expected an error containing '{}', got: {}", expected, e),
                });
            }
            (Ok(summary), Some(expected)) => {
                return Err(CliError::Scenario {
                    step,
                    op: name.into(),
                    message: format!(
                        "expected an error containing '{}', but it succeeded: {}",
                        expected, summary
                    ),
                });
            }
        };

        rows.push(StepRow {
            step,
            op: name.into(),
            actor,
            result,
            statut: runner.statut().await,
        });
    }

    let (dossier, events) = match &runner.current {
        Some(id) => (
            runner.workflow.get_dossier(id).await.ok(),
            runner.workflow.events(id).await?,
        ),
        None => (None, Vec::new()),
    };
    let events: Vec<EventRow> = events.into_iter().map(EventRow::from).collect();

    match format {
        OutputFormat::Table => {
            output::print_output(rows, format)?;
            println!();
            output::print_output(events, format)?;
            if let Some(d) = &dossier {
                print_success(&format!("{} ended in {}", d.numero_dossier, d.statut));
            }
            Ok(())
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_single(
            &ScenarioReport {
                name: scenario.name,
                steps: rows,
                dossier,
                events,
            },
            format,
        ),
    }
}
