//! Deployment engine: walks a validated plan in dependency order, resolving
//! address references, submitting deployment transactions, and recording
//! results.
//!
//! Independent steps run concurrently up to the context's concurrency bound;
//! a step never begins before all of its prerequisites have a committed
//! record. The first step failure aborts the remaining plan, but records
//! already persisted stay in the ledger. Deployments are not transactionally
//! reversible, so there is no rollback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::artifact::ArtifactStore;
use crate::context::{DeploymentContext, NetworkId};
use crate::error::DeployError;
use crate::ledger::{DeploymentRecord, StateLedger};
use crate::plan::{ConstructorArg, DeploymentPlan, DeploymentStep};
use crate::report::{Reporter, TracingReporter};
use crate::submit::{Confirmation, TxPayload, TxSubmitter};

/// Summary of one engine run. Owned by the engine for the run's duration and
/// handed back to the caller on success.
#[derive(Debug)]
pub struct DeploymentSession {
    pub network: NetworkId,
    /// Records visible at the end of the run (deployed and reused), in plan
    /// order.
    pub records: Vec<DeploymentRecord>,
    /// Steps submitted and confirmed during this run.
    pub deployed: Vec<String>,
    /// Steps skipped because a ledger record already existed.
    pub skipped: Vec<String>,
}

/// Plan-driven deployment engine.
pub struct Engine {
    artifacts: ArtifactStore,
    ledger: Arc<StateLedger>,
    submitter: Arc<dyn TxSubmitter>,
    reporter: Arc<dyn Reporter>,
}

impl Engine {
    pub fn new(
        artifacts: ArtifactStore,
        ledger: Arc<StateLedger>,
        submitter: Arc<dyn TxSubmitter>,
    ) -> Self {
        Self {
            artifacts,
            ledger,
            submitter,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Execute a plan against a network.
    ///
    /// Idempotent unless `ctx.force` is set: steps with an existing ledger
    /// record are skipped and their records reused for reference resolution.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        ctx: &DeploymentContext,
    ) -> Result<DeploymentSession, DeployError> {
        let steps = plan.steps();
        let n = steps.len();

        let semaphore = Arc::new(Semaphore::new(ctx.concurrency.max(1)));
        let mut join_set: JoinSet<(usize, Result<DeploymentRecord, DeployError>)> = JoinSet::new();

        let mut scheduled = vec![false; n];
        let mut done = vec![false; n];
        let mut done_count = 0usize;
        let mut completed: HashMap<String, DeploymentRecord> = HashMap::new();

        let mut session = DeploymentSession {
            network: ctx.network.clone(),
            records: Vec::new(),
            deployed: Vec::new(),
            skipped: Vec::new(),
        };

        while done_count < n {
            if ctx.cancel.is_cancelled() {
                join_set.abort_all();
                return Err(DeployError::Cancelled);
            }

            // Schedule every step whose prerequisites all have a committed
            // record. A skip resolves immediately and can unlock dependents,
            // so iterate to a fixpoint.
            let mut progress = true;
            while progress {
                progress = false;
                for i in 0..n {
                    if scheduled[i] || !plan.dependencies_of(i).iter().all(|&d| done[d]) {
                        continue;
                    }
                    let step = &steps[i];

                    let network = step_network(step, ctx);

                    if !ctx.force {
                        if let Some(record) = self.ledger.get(&network, &step.id)? {
                            self.reporter.on_step_skipped(&step.id, &record);
                            completed.insert(step.id.clone(), record.clone());
                            session.records.push(record);
                            session.skipped.push(step.id.clone());
                            scheduled[i] = true;
                            done[i] = true;
                            done_count += 1;
                            progress = true;
                            continue;
                        }
                    }

                    let payload = self.prepare_payload(step, &completed, ctx)?;
                    self.reporter.on_step_start(step);
                    scheduled[i] = true;

                    let submitter = Arc::clone(&self.submitter);
                    let ledger = Arc::clone(&self.ledger);
                    let semaphore = Arc::clone(&semaphore);
                    let cancel = ctx.cancel.clone();
                    let confirm_timeout = ctx.confirm_timeout;
                    join_set.spawn(async move {
                        let result = deploy_step(
                            submitter,
                            ledger,
                            semaphore,
                            cancel,
                            network,
                            confirm_timeout,
                            payload,
                        )
                        .await;
                        (i, result)
                    });
                }
            }

            if done_count == n {
                break;
            }

            // A validated plan always has at least one task in flight here.
            if join_set.is_empty() {
                return Err(DeployError::Stalled {
                    remaining: n - done_count,
                });
            }

            let joined = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(DeployError::Cancelled);
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else { continue };
            let (i, result) = joined.map_err(|e| DeployError::Worker(e.to_string()))?;

            match result {
                Ok(record) => {
                    self.reporter.on_step_complete(&record);
                    completed.insert(record.step_id.clone(), record.clone());
                    session.records.push(record);
                    session.deployed.push(steps[i].id.clone());
                    done[i] = true;
                    done_count += 1;
                }
                Err(err) => {
                    self.reporter.on_error(&steps[i].id, &err);
                    join_set.abort_all();
                    return Err(err);
                }
            }
        }

        session
            .records
            .sort_by_key(|r| plan.position(&r.step_id).unwrap_or(usize::MAX));
        Ok(session)
    }

    /// Resolve references and build the deployment payload for a step.
    ///
    /// Prerequisites are complete when this runs, so every reference must
    /// have a record in this session or the ledger; a miss is an engine bug,
    /// not an operator mistake.
    fn prepare_payload(
        &self,
        step: &DeploymentStep,
        completed: &HashMap<String, DeploymentRecord>,
        ctx: &DeploymentContext,
    ) -> Result<TxPayload, DeployError> {
        let artifact = self.artifacts.load(&step.artifact)?;

        let mut resolved = Vec::with_capacity(step.args.len());
        for arg in &step.args {
            match arg {
                ConstructorArg::Literal(value) => resolved.push(value.clone()),
                ConstructorArg::Reference { step: target } => {
                    let address = match completed.get(target.as_str()) {
                        Some(record) => record.address,
                        None => {
                            self.ledger
                                .get(&ctx.network, target)?
                                .ok_or_else(|| DeployError::UnresolvedReference {
                                    step: step.id.clone(),
                                    target: target.clone(),
                                })?
                                .address
                        }
                    };
                    resolved.push(address.to_string());
                }
            }
        }

        let data = artifact
            .encode_constructor(&resolved)
            .map_err(|source| DeployError::Constructor {
                step: step.id.clone(),
                source,
            })?;

        Ok(TxPayload {
            step_id: step.id.clone(),
            data,
        })
    }
}

/// Network a step's records are keyed under: its own override if set,
/// otherwise the session network.
fn step_network(step: &DeploymentStep, ctx: &DeploymentContext) -> NetworkId {
    match &step.network {
        Some(name) => NetworkId::new(name.clone()),
        None => ctx.network.clone(),
    }
}

/// Submit one step and wait for its confirmation, committing the record to
/// the ledger before the result becomes visible to dependents.
async fn deploy_step(
    submitter: Arc<dyn TxSubmitter>,
    ledger: Arc<StateLedger>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    network: NetworkId,
    confirm_timeout: Duration,
    payload: TxPayload,
) -> Result<DeploymentRecord, DeployError> {
    let step = payload.step_id.clone();

    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| DeployError::Cancelled)?;
    if cancel.is_cancelled() {
        return Err(DeployError::Cancelled);
    }

    let handle = submitter
        .submit(&payload)
        .await
        .map_err(|e| DeployError::StepDeployment {
            step: step.clone(),
            cause: format!("{e:#}"),
        })?;

    let confirmation = submitter
        .await_confirmation(&handle, confirm_timeout)
        .await
        .map_err(|e| DeployError::StepDeployment {
            step: step.clone(),
            cause: format!("{e:#}"),
        })?;

    match confirmation {
        Confirmation::Confirmed { address, tx_hash } => {
            let record = DeploymentRecord {
                step_id: step,
                network,
                address,
                tx_hash,
                deployed_at: Utc::now(),
            };
            ledger.put(record.clone())?;
            Ok(record)
        }
        Confirmation::TimedOut => Err(DeployError::ConfirmationTimeout {
            step,
            tx_hash: handle.0.to_string(),
        }),
        Confirmation::Reverted { reason } => Err(DeployError::StepDeployment {
            step,
            cause: format!("execution reverted: {reason}"),
        }),
    }
}
