use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use strudel_deploy::NetworkId;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    Mainnet,
    Sepolia,
    Local,
    #[strum(default)]
    Custom(String),
}

impl Network {
    pub fn id(&self) -> NetworkId {
        NetworkId::from(self.to_string().as_str())
    }
}

#[derive(Parser)]
#[command(name = "strudel")]
#[command(
    author,
    version,
    about = "Deploy fleets of contracts from a declarative plan"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STRUDEL_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy a plan against a network.
    Deploy(DeployArgs),
    /// List deployment records for a network.
    Records(RecordsArgs),
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// The target network (mainnet, sepolia, local, or a custom name).
    #[arg(short, long, env = "STRUDEL_NETWORK")]
    pub network: Network,

    /// Redeploy steps that already have a ledger record.
    #[arg(long, env = "STRUDEL_FORCE", default_value_t = false)]
    pub force: bool,

    /// Path to the plan document.
    #[arg(long, env = "STRUDEL_PLAN", default_value = strudel_deploy::PLAN_FILENAME)]
    pub plan: PathBuf,

    /// Directory of compiled contract artifacts.
    #[arg(long, env = "STRUDEL_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Directory holding per-network deployment records.
    #[arg(long, env = "STRUDEL_STATE_DIR", default_value = ".strudel")]
    pub state_dir: PathBuf,

    /// JSON-RPC endpoint that signs and submits transactions on our behalf.
    ///
    /// If not provided, the deployment runs in dry-run mode.
    #[arg(long, env = "STRUDEL_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Fabricate deterministic addresses instead of talking to a network.
    #[arg(long, env = "STRUDEL_DRY_RUN", default_value_t = false, conflicts_with = "rpc_url")]
    pub dry_run: bool,

    /// Sender account passed to the endpoint, if it manages several.
    #[arg(long, env = "STRUDEL_SENDER")]
    pub sender: Option<Address>,

    /// Maximum number of independent steps deployed concurrently.
    #[arg(long, env = "STRUDEL_CONCURRENCY", default_value_t = strudel_deploy::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-step confirmation wait in seconds.
    #[arg(long, env = "STRUDEL_CONFIRM_TIMEOUT", default_value_t = 120)]
    pub confirm_timeout: u64,

    /// Path to an existing Strudel.toml configuration file to load.
    ///
    /// When provided, the deployment uses the configuration from this file
    /// (with STRUDEL_* environment overrides) instead of the CLI arguments.
    #[arg(long, alias = "conf", env = "STRUDEL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RecordsArgs {
    /// The target network.
    #[arg(short, long, env = "STRUDEL_NETWORK")]
    pub network: Network,

    /// Directory holding per-network deployment records.
    #[arg(long, env = "STRUDEL_STATE_DIR", default_value = ".strudel")]
    pub state_dir: PathBuf,
}
