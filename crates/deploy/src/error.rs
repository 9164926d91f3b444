//! Error taxonomy for plan validation and deployment execution.
//!
//! Plan-level errors are raised before any network interaction and are always
//! recoverable by fixing the plan document. Deployment errors abort the
//! remaining plan but never discard records already persisted in the ledger.

use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::EncodeError;

/// Errors raised while parsing or validating a deployment plan.
///
/// None of these variants involve the network; a rejected plan performs zero
/// submissions.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan: {0}")]
    Parse(String),

    #[error("duplicate step id `{0}`")]
    DuplicateStep(String),

    #[error("step `{step}` references unknown step `{target}`")]
    UnknownReference { step: String, target: String },

    #[error("step `{step}` references step `{target}`, which is declared later in the plan")]
    ForwardReference { step: String, target: String },

    #[error("cyclic dependency involving step `{0}`")]
    Cycle(String),

    #[error("step `{step}` has malformed reference `{raw}` (expected `${{stepId}}.address`)")]
    InvalidReference { step: String, raw: String },
}

/// Errors raised by the state ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to access ledger file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the deployment engine.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("artifact `{name}` not found under {}", dir.display())]
    ArtifactNotFound { name: String, dir: PathBuf },

    #[error("artifact `{name}` is malformed: {reason}")]
    ArtifactMalformed { name: String, reason: String },

    #[error("step `{step}`: {source}")]
    Constructor {
        step: String,
        #[source]
        source: EncodeError,
    },

    /// Raised when a dependency has no record despite validation having
    /// accepted the plan. Indicates an engine bug, not an operator mistake.
    #[error("step `{step}` depends on `{target}`, which has no deployment record")]
    UnresolvedReference { step: String, target: String },

    #[error("step `{step}` failed to deploy: {cause}")]
    StepDeployment { step: String, cause: String },

    /// The transaction may or may not have landed. The operator must verify
    /// network state before rerunning; this is never retried automatically.
    #[error("timed out waiting for confirmation of step `{step}` (tx {tx_hash}); \
             verify network state before rerunning")]
    ConfirmationTimeout { step: String, tx_hash: String },

    #[error("deployment cancelled")]
    Cancelled,

    #[error("deployment engine stalled with {remaining} step(s) unscheduled")]
    Stalled { remaining: usize },

    #[error("deployment worker terminated abnormally: {0}")]
    Worker(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl DeployError {
    /// Process exit code for this error class.
    ///
    /// Plan rejection and ambiguous confirmation timeouts are distinguished so
    /// operators and scripts can react without parsing the message.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Plan(_) => 2,
            DeployError::ConfirmationTimeout { .. } => 4,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let plan = DeployError::Plan(PlanError::Cycle("a".to_string()));
        assert_eq!(plan.exit_code(), 2);

        let timeout = DeployError::ConfirmationTimeout {
            step: "token".to_string(),
            tx_hash: "0xabc".to_string(),
        };
        assert_eq!(timeout.exit_code(), 4);

        let failed = DeployError::StepDeployment {
            step: "token".to_string(),
            cause: "reverted".to_string(),
        };
        assert_eq!(failed.exit_code(), 3);

        let cancelled = DeployError::Cancelled;
        assert_eq!(cancelled.exit_code(), 3);
    }
}
