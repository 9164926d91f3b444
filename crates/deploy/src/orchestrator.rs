//! Top-level orchestrator configuration.
//!
//! Ties together the plan, artifact store, state ledger, and submitter for
//! one target network, and can be serialized to/from TOML so a deployment is
//! reproducible from a checked-in config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::artifact::ArtifactStore;
use crate::context::{DEFAULT_CONCURRENCY, DEFAULT_CONFIRM_TIMEOUT, DeploymentContext, NetworkId};
use crate::engine::{DeploymentSession, Engine};
use crate::error::DeployError;
use crate::ledger::StateLedger;
use crate::plan::DeploymentPlan;
use crate::submit::{DryRunSubmitter, HttpSubmitter, TxSubmitter};

/// The default name for the orchestrator configuration file.
pub const STRUDEL_CONF_FILENAME: &str = "Strudel.toml";

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_confirm_timeout_secs() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT.as_secs()
}

/// Orchestrator configuration for one target network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchestrator {
    /// Target network id; keys the state ledger.
    pub network: NetworkId,
    /// Path to the plan document.
    pub plan_path: PathBuf,
    /// Directory of compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory holding per-network deployment records.
    pub state_dir: PathBuf,
    /// JSON-RPC endpoint that signs and submits on our behalf. When unset,
    /// deployments run in dry-run mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Sender account passed to the endpoint, if it manages several.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<alloy_core::primitives::Address>,
    /// Upper bound on concurrently deploying independent steps.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-step confirmation wait in seconds.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
}

impl Orchestrator {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize orchestrator config")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file or a directory containing one.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(STRUDEL_CONF_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(config_path)
            .context(format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to the default location in the state directory.
    pub fn save_config(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.state_dir)
            .context("Failed to create state directory")?;
        let config_path = self.state_dir.join(STRUDEL_CONF_FILENAME);
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Build the transaction submitter from the configured endpoint.
    fn submitter(&self) -> Result<Arc<dyn TxSubmitter>> {
        match &self.rpc_url {
            Some(raw) => {
                let url = Url::parse(raw).context("Invalid RPC URL")?;
                let mut submitter = HttpSubmitter::new(url)?;
                if let Some(sender) = self.sender {
                    submitter = submitter.with_sender(sender);
                }
                Ok(Arc::new(submitter))
            }
            None => {
                tracing::warn!("No RPC URL configured, running in dry-run mode");
                Ok(Arc::new(DryRunSubmitter::new()))
            }
        }
    }

    /// Load the plan and run a deployment against the configured network.
    pub async fn deploy(
        &self,
        force: bool,
        cancel: CancellationToken,
    ) -> Result<DeploymentSession> {
        let plan = DeploymentPlan::load(&self.plan_path).map_err(DeployError::from)?;
        tracing::info!(
            network = %self.network,
            steps = plan.len(),
            force,
            "Starting deployment..."
        );

        let engine = Engine::new(
            ArtifactStore::new(&self.artifacts_dir),
            Arc::new(StateLedger::new(&self.state_dir)),
            self.submitter()?,
        );

        let ctx = DeploymentContext::new(self.network.clone())
            .with_force(force)
            .with_concurrency(self.concurrency)
            .with_confirm_timeout(Duration::from_secs(self.confirm_timeout_secs))
            .with_cancel(cancel);

        let session = engine.run(&plan, &ctx).await?;

        tracing::info!(
            deployed = session.deployed.len(),
            skipped = session.skipped.len(),
            "Deployment complete"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn orchestrator(dir: &TempDir) -> Orchestrator {
        Orchestrator {
            network: NetworkId::from("sepolia"),
            plan_path: dir.path().join("Plan.toml"),
            artifacts_dir: dir.path().join("artifacts"),
            state_dir: dir.path().join("state"),
            rpc_url: Some("http://localhost:8545".to_string()),
            sender: None,
            concurrency: 2,
            confirm_timeout_secs: 30,
        }
    }

    #[test]
    fn test_config_round_trip() {
        let dir = TempDir::new("strudel-conf").expect("tempdir");
        let original = orchestrator(&dir);

        let path = dir.path().join(STRUDEL_CONF_FILENAME);
        original.save_to_file(&path).expect("save");

        let loaded = Orchestrator::load_from_file(&path).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new("strudel-conf").expect("tempdir");
        let original = orchestrator(&dir);
        original
            .save_to_file(&dir.path().join(STRUDEL_CONF_FILENAME))
            .expect("save");

        let loaded = Orchestrator::load_from_file(&dir.path().to_path_buf()).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_config() {
        let result = Orchestrator::load_from_file(&PathBuf::from("/nonexistent/Strudel.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_applied_when_omitted() {
        let config: Orchestrator = toml::from_str(
            r#"
            network = "local"
            plan_path = "Plan.toml"
            artifacts_dir = "artifacts"
            state_dir = ".strudel"
            "#,
        )
        .expect("parse");
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(
            config.confirm_timeout_secs,
            DEFAULT_CONFIRM_TIMEOUT.as_secs()
        );
        assert!(config.rpc_url.is_none());
    }
}
