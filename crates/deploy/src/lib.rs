//! strudel-deploy - Plan-driven multi-contract deployment.
//!
//! This crate replaces ad hoc migration scripts with a declarative plan: a
//! list of contract deployment steps whose constructor arguments may
//! reference the addresses of earlier steps. The engine walks the validated
//! dependency graph, deploys independent steps concurrently, and records
//! every result in a per-network ledger so reruns are idempotent.

mod artifact;
mod context;
mod engine;
mod error;
mod graph;
mod ledger;
mod orchestrator;
mod plan;
mod report;
mod rpc;
mod submit;

pub use artifact::{ArtifactStore, ContractArtifact, EncodeError};
pub use context::{
    DEFAULT_CONCURRENCY, DEFAULT_CONFIRM_TIMEOUT, DeploymentContext, NetworkId,
};
pub use engine::{DeploymentSession, Engine};
pub use error::{DeployError, LedgerError, PlanError};
pub use ledger::{DeploymentRecord, StateLedger};
pub use orchestrator::{Orchestrator, STRUDEL_CONF_FILENAME};
pub use plan::{ConstructorArg, DeploymentPlan, DeploymentStep, PLAN_FILENAME};
pub use report::{NullReporter, Reporter, TracingReporter};
pub use submit::{
    Confirmation, DryRunSubmitter, HttpSubmitter, TxHandle, TxPayload, TxSubmitter,
};
