//! Progress reporting seam.
//!
//! The engine emits events through a [`Reporter`] instead of logging
//! directly, so the deployment logic stays free of presentation concerns.

use crate::error::DeployError;
use crate::ledger::DeploymentRecord;
use crate::plan::DeploymentStep;

/// Sink for deployment progress events.
pub trait Reporter: Send + Sync {
    fn on_step_start(&self, step: &DeploymentStep);
    fn on_step_skipped(&self, step_id: &str, record: &DeploymentRecord);
    fn on_step_complete(&self, record: &DeploymentRecord);
    fn on_error(&self, step_id: &str, error: &DeployError);
}

/// Default reporter emitting structured tracing events.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_step_start(&self, step: &DeploymentStep) {
        tracing::info!(step = %step.id, artifact = %step.artifact, "Deploying step...");
    }

    fn on_step_skipped(&self, step_id: &str, record: &DeploymentRecord) {
        tracing::info!(
            step = %step_id,
            address = %record.address,
            "Step already deployed, skipping"
        );
    }

    fn on_step_complete(&self, record: &DeploymentRecord) {
        tracing::info!(
            step = %record.step_id,
            address = %record.address,
            tx_hash = %record.tx_hash,
            "Step deployed"
        );
    }

    fn on_error(&self, step_id: &str, error: &DeployError) {
        tracing::error!(step = %step_id, error = %error, "Step failed");
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_step_start(&self, _step: &DeploymentStep) {}
    fn on_step_skipped(&self, _step_id: &str, _record: &DeploymentRecord) {}
    fn on_step_complete(&self, _record: &DeploymentRecord) {}
    fn on_error(&self, _step_id: &str, _error: &DeployError) {}
}
