//! Per-run deployment context.
//!
//! The context is an explicit value threaded through the engine: network
//! identity, idempotence override, concurrency bound, confirmation timeout,
//! and the cancellation token. There is no ambient global state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Default number of independent steps deployed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-step confirmation wait.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

/// Identity of a target network. Keys the state ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Context for one engine run.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    /// Target network; records are persisted under this id.
    pub network: NetworkId,
    /// Redeploy steps that already have a ledger record.
    pub force: bool,
    /// Upper bound on concurrently executing independent steps.
    pub concurrency: usize,
    /// Per-step confirmation wait; does not bound the whole session.
    pub confirm_timeout: Duration,
    /// Session-wide cancellation, checked between steps.
    pub cancel: CancellationToken,
}

impl DeploymentContext {
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            force: false,
            concurrency: DEFAULT_CONCURRENCY,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = DeploymentContext::new(NetworkId::from("sepolia"));
        assert_eq!(ctx.network.as_str(), "sepolia");
        assert!(!ctx.force);
        assert_eq!(ctx.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(ctx.confirm_timeout, DEFAULT_CONFIRM_TIMEOUT);
        assert!(!ctx.cancel.is_cancelled());
    }

    #[test]
    fn test_context_overrides() {
        let ctx = DeploymentContext::new(NetworkId::from("local"))
            .with_force(true)
            .with_concurrency(1)
            .with_confirm_timeout(Duration::from_secs(5));
        assert!(ctx.force);
        assert_eq!(ctx.concurrency, 1);
        assert_eq!(ctx.confirm_timeout, Duration::from_secs(5));
    }
}
