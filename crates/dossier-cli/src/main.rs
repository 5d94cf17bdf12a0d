//! dossierctl - command-line interface for the dossier approval workflow
//!
//! This CLI gives operators and developers a terminal view of:
//! - the validation checklist each reviewing role must complete
//! - the effective workflow configuration
//! - dry runs of a dossier's journey, replayed from a scenario file

use clap::{Parser, Subcommand};
use dossier_engine::WorkflowConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;

use commands::{catalog, scenario};
use error::CliResult;

/// dossierctl application
#[derive(Parser)]
#[command(name = "dossierctl")]
#[command(about = "Dossier workflow CLI - checklists, configuration and scenario dry runs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DOSSIER_CONFIG")]
    config: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Show the validation checklist
    Catalog {
        /// Restrict to one review stage
        #[arg(short, long)]
        stage: Option<catalog::StageArg>,
    },

    /// Replay dossier scenarios against an in-memory engine
    Scenario {
        #[command(subcommand)]
        command: scenario::ScenarioCommands,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    // Logs go to stderr so that json/yaml output stays parseable
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let config = WorkflowConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Catalog { stage } => {
            let catalog = config.build_catalog()?;
            catalog::execute(&catalog, stage, cli.output)
        }
        Commands::Scenario { command } => scenario::execute(command, &config, cli.output).await,
        Commands::Config => output::print_single(&config, cli.output),
    }
}
