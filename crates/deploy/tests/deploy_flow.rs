//! End-to-end tests for strudel-deploy.
//!
//! These run fully local: artifacts and plan documents are written to a
//! temporary directory and deployments go through the dry-run submitter, so
//! no network or signing endpoint is required.

use anyhow::Result;
use tempdir::TempDir;
use tokio_util::sync::CancellationToken;

use strudel_deploy::{DeployError, NetworkId, Orchestrator, StateLedger};

const TOKEN_ARTIFACT: &str = r#"{
    "contractName": "Token",
    "abi": [ { "type": "constructor", "inputs": [] } ],
    "bytecode": "0x60016001"
}"#;

const VAULT_ARTIFACT: &str = r#"{
    "contractName": "Vault",
    "abi": [
        {
            "type": "constructor",
            "inputs": [ { "name": "token", "type": "address" } ]
        }
    ],
    "bytecode": "0x60026002"
}"#;

const TOKEN_VAULT_PLAN: &str = r#"
[[step]]
id = "token"
artifact = "Token"

[[step]]
id = "vault"
artifact = "Vault"
args = ["${token}.address"]
"#;

/// Test setup: a temp directory with artifacts, a plan, and an orchestrator
/// configured for dry-run deployment.
struct TestContext {
    dir: TempDir,
    orchestrator: Orchestrator,
}

impl TestContext {
    fn new(plan: &str) -> Result<Self> {
        let dir = TempDir::new("strudel-it")?;

        let artifacts_dir = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts_dir)?;
        std::fs::write(artifacts_dir.join("Token.json"), TOKEN_ARTIFACT)?;
        std::fs::write(artifacts_dir.join("Vault.json"), VAULT_ARTIFACT)?;

        let plan_path = dir.path().join("Plan.toml");
        std::fs::write(&plan_path, plan)?;

        let orchestrator = Orchestrator {
            network: NetworkId::from("local"),
            plan_path,
            artifacts_dir,
            state_dir: dir.path().join(".strudel"),
            rpc_url: None,
            sender: None,
            concurrency: 2,
            confirm_timeout_secs: 5,
        };

        Ok(Self { dir, orchestrator })
    }

    fn ledger(&self) -> StateLedger {
        StateLedger::new(self.dir.path().join(".strudel"))
    }
}

#[tokio::test]
async fn test_full_deployment_flow() -> Result<()> {
    let ctx = TestContext::new(TOKEN_VAULT_PLAN)?;

    let session = ctx
        .orchestrator
        .deploy(false, CancellationToken::new())
        .await?;

    assert_eq!(session.deployed, vec!["token", "vault"]);
    assert!(session.skipped.is_empty());

    let ledger = ctx.ledger();
    let network = NetworkId::from("local");
    let token = ledger.get(&network, "token")?.expect("token record");
    let vault = ledger.get(&network, "vault")?.expect("vault record");
    assert_ne!(token.address, vault.address);
    assert_eq!(token.network, network);

    Ok(())
}

#[tokio::test]
async fn test_rerun_skips_everything() -> Result<()> {
    let ctx = TestContext::new(TOKEN_VAULT_PLAN)?;

    let first = ctx
        .orchestrator
        .deploy(false, CancellationToken::new())
        .await?;
    let second = ctx
        .orchestrator
        .deploy(false, CancellationToken::new())
        .await?;

    assert!(second.deployed.is_empty());
    assert_eq!(second.skipped, vec!["token", "vault"]);
    assert_eq!(second.records, first.records);

    Ok(())
}

#[tokio::test]
async fn test_force_supersedes_records() -> Result<()> {
    let ctx = TestContext::new(TOKEN_VAULT_PLAN)?;
    let network = NetworkId::from("local");

    ctx.orchestrator
        .deploy(false, CancellationToken::new())
        .await?;
    let old = ctx.ledger().get(&network, "token")?.expect("token record");

    let session = ctx
        .orchestrator
        .deploy(true, CancellationToken::new())
        .await?;
    assert_eq!(session.deployed, vec!["token", "vault"]);

    let new = ctx.ledger().get(&network, "token")?.expect("token record");
    assert_ne!(new.address, old.address);

    // Both generations remain in the append-only history.
    assert_eq!(ctx.ledger().all(&network)?.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_invalid_plan_maps_to_exit_code_2() -> Result<()> {
    let ctx = TestContext::new(
        r#"
        [[step]]
        id = "vault"
        artifact = "Vault"
        args = ["${token}.address"]
        "#,
    )?;

    let err = ctx
        .orchestrator
        .deploy(false, CancellationToken::new())
        .await
        .expect_err("plan should be rejected");

    let deploy_err = err
        .downcast_ref::<DeployError>()
        .expect("error should be a DeployError");
    assert_eq!(deploy_err.exit_code(), 2);

    // Validation failed before anything reached the ledger.
    assert!(ctx.ledger().all(&NetworkId::from("local"))?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_cancelled_deployment() -> Result<()> {
    let ctx = TestContext::new(TOKEN_VAULT_PLAN)?;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ctx
        .orchestrator
        .deploy(false, cancel)
        .await
        .expect_err("cancelled run should fail");
    let deploy_err = err
        .downcast_ref::<DeployError>()
        .expect("error should be a DeployError");
    assert!(matches!(deploy_err, DeployError::Cancelled));

    Ok(())
}

#[test]
fn test_config_round_trip_through_state_dir() -> Result<()> {
    let ctx = TestContext::new(TOKEN_VAULT_PLAN)?;

    let config_path = ctx.orchestrator.save_config()?;
    let loaded = Orchestrator::load_from_file(&config_path)?;
    assert_eq!(loaded, ctx.orchestrator);

    Ok(())
}
