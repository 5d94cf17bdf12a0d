//! Checklist catalog commands

use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use clap::ValueEnum;
use dossier_engine::ValidationCatalog;
use dossier_types::ReviewStage;
use serde::Serialize;
use tabled::Tabled;

/// Review stage filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Cb,
    Ordonnateur,
}

impl From<StageArg> for ReviewStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Cb => ReviewStage::Cb,
            StageArg::Ordonnateur => ReviewStage::Ordonnateur,
        }
    }
}

/// Table row for one check item
#[derive(Debug, Serialize, Tabled)]
struct ItemRow {
    phase: String,
    category: String,
    item: String,
    name: String,
    mirrors: String,
}

/// Print the checklist, optionally restricted to one stage
pub fn execute(
    catalog: &ValidationCatalog,
    stage: Option<StageArg>,
    format: OutputFormat,
) -> CliResult<()> {
    let rows: Vec<ItemRow> = catalog
        .categories()
        .iter()
        .filter(|c| {
            stage
                .map(|s| c.phase.stage() == ReviewStage::from(s))
                .unwrap_or(true)
        })
        .flat_map(|c| {
            c.items.iter().map(move |i| ItemRow {
                phase: c.phase.to_string(),
                category: c.id.to_string(),
                item: i.id.to_string(),
                name: i.nom.clone(),
                mirrors: c
                    .mirrors
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            })
        })
        .collect();

    output::print_output(rows, format)
}
