//! strudel is a CLI tool for deploying fleets of smart contracts from a
//! declarative plan.

mod cli;

use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command, DeployArgs, RecordsArgs};
use strudel_deploy::{DeployError, DeploymentRecord, Orchestrator, StateLedger};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    if let Err(err) = run(cli.command).await {
        tracing::error!("{err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// Map the error class to the documented exit codes: 2 for plan rejection,
/// 4 for an ambiguous confirmation timeout, 3 for other deployment failures.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DeployError>() {
        Some(e) => e.exit_code(),
        None => 1,
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Deploy(args) => deploy(args).await,
        Command::Records(args) => records(args),
    }
}

async fn deploy(args: DeployArgs) -> Result<()> {
    // If a config file is provided, it wins over the CLI arguments, with
    // environment variables layered on top.
    let orchestrator = match &args.config {
        Some(config_path) => Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("STRUDEL_"))
            .extract::<Orchestrator>()
            .context("Failed to load configuration")?,
        None => {
            let orchestrator = Orchestrator {
                network: args.network.id(),
                plan_path: args.plan.clone(),
                artifacts_dir: args.artifacts.clone(),
                state_dir: args.state_dir.clone(),
                rpc_url: if args.dry_run { None } else { args.rpc_url.clone() },
                sender: args.sender,
                concurrency: args.concurrency,
                confirm_timeout_secs: args.confirm_timeout,
            };
            // Persist the configuration so the run is reproducible.
            orchestrator.save_config()?;
            orchestrator
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling deployment...");
            signal_cancel.cancel();
        }
    });

    let session = orchestrator.deploy(args.force, cancel).await?;

    let mut table = Table::new();
    table.set_header(vec!["Step", "Address", "Status"]);
    for record in &session.records {
        let status = if session.skipped.contains(&record.step_id) {
            "reused"
        } else {
            "deployed"
        };
        table.add_row(vec![
            record.step_id.clone(),
            record.address.to_string(),
            status.to_string(),
        ]);
    }
    println!("{table}");

    Ok(())
}

fn records(args: RecordsArgs) -> Result<()> {
    let ledger = StateLedger::new(&args.state_dir);
    let network = args.network.id();
    let records = ledger.all(&network).map_err(DeployError::from)?;

    if records.is_empty() {
        tracing::info!(%network, "No deployment records");
        return Ok(());
    }

    println!("{}", records_table(&records));
    Ok(())
}

fn records_table(records: &[DeploymentRecord]) -> Table {
    // The ledger is append-only; the last record per step is current.
    let mut latest: HashMap<&str, usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        latest.insert(record.step_id.as_str(), i);
    }

    let mut table = Table::new();
    table.set_header(vec!["Step", "Address", "Tx Hash", "Deployed At", "Status"]);
    for (i, record) in records.iter().enumerate() {
        let status = if latest[record.step_id.as_str()] == i {
            "current"
        } else {
            "superseded"
        };
        table.add_row(vec![
            record.step_id.clone(),
            record.address.to_string(),
            record.tx_hash.to_string(),
            record.deployed_at.to_rfc3339(),
            status.to_string(),
        ]);
    }
    table
}
