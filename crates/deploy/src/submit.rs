//! Transaction submission seam.
//!
//! The engine talks to the network exclusively through [`TxSubmitter`]:
//! submit a deployment payload, then await confirmation with a bounded
//! timeout. Signing is the endpoint's concern, not ours.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use url::Url;

use crate::rpc::RpcClient;

/// Interval between receipt polls while waiting for confirmation.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A deployment transaction payload: creation bytecode with the ABI-encoded
/// constructor arguments appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPayload {
    pub step_id: String,
    pub data: Bytes,
}

/// Opaque handle to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle(pub B256);

/// Outcome of waiting for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed { address: Address, tx_hash: B256 },
    TimedOut,
    Reverted { reason: String },
}

/// External collaborator that signs, submits, and confirms transactions.
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Submit a deployment payload, returning a handle to poll.
    async fn submit(&self, payload: &TxPayload) -> anyhow::Result<TxHandle>;

    /// Wait for the transaction to be included, up to `timeout`.
    ///
    /// `TimedOut` is an ambiguous outcome: the transaction may still land.
    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> anyhow::Result<Confirmation>;
}

/// Transaction receipt fields we care about.
#[derive(Debug, Deserialize)]
struct TxReceipt {
    #[serde(rename = "contractAddress")]
    contract_address: Option<Address>,
    status: Option<String>,
    #[serde(rename = "transactionHash")]
    transaction_hash: B256,
}

/// Submitter backed by a JSON-RPC endpoint with node-managed accounts
/// (`eth_sendTransaction` + receipt polling). The endpoint is expected to
/// sign on our behalf.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    rpc: RpcClient,
    from: Option<Address>,
    poll_interval: Duration,
}

impl HttpSubmitter {
    pub fn new(url: Url) -> anyhow::Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(url)?,
            from: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set the sender account passed as `from`. Defaults to the endpoint's
    /// own default account when unset.
    pub fn with_sender(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl TxSubmitter for HttpSubmitter {
    async fn submit(&self, payload: &TxPayload) -> anyhow::Result<TxHandle> {
        let mut tx = serde_json::json!({ "data": payload.data });
        if let Some(from) = self.from {
            tx["from"] = serde_json::json!(from);
        }
        let hash: B256 = self.rpc.call("eth_sendTransaction", vec![tx]).await?;
        tracing::debug!(step = %payload.step_id, tx_hash = %hash, "Transaction submitted");
        Ok(TxHandle(hash))
    }

    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> anyhow::Result<Confirmation> {
        let deadline = Instant::now() + timeout;
        loop {
            let receipt: Option<TxReceipt> = self
                .rpc
                .call("eth_getTransactionReceipt", vec![serde_json::json!(handle.0)])
                .await?;

            if let Some(receipt) = receipt {
                return confirmation_from_receipt(receipt);
            }
            if Instant::now() >= deadline {
                return Ok(Confirmation::TimedOut);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn confirmation_from_receipt(receipt: TxReceipt) -> anyhow::Result<Confirmation> {
    let reverted = receipt.status.as_deref() == Some("0x0");
    if reverted {
        return Ok(Confirmation::Reverted {
            reason: "execution reverted".to_string(),
        });
    }
    let address = receipt
        .contract_address
        .ok_or_else(|| anyhow::anyhow!("receipt has no contract address"))?;
    Ok(Confirmation::Confirmed {
        address,
        tx_hash: receipt.transaction_hash,
    })
}

/// Submitter that deploys nothing. Fabricates deterministic addresses from a
/// hash of the payload and an internal nonce, confirming instantly; useful
/// for plan dry-runs and tests.
#[derive(Debug, Default)]
pub struct DryRunSubmitter {
    nonce: AtomicU64,
    delay: Duration,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artificial confirmation delay, e.g. to exercise concurrent
    /// scheduling.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TxSubmitter for DryRunSubmitter {
    async fn submit(&self, payload: &TxPayload) -> anyhow::Result<TxHandle> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(&payload.data);
        hasher.update(nonce.to_be_bytes());
        let digest = hasher.finalize();
        Ok(TxHandle(B256::from_slice(&digest)))
    }

    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> anyhow::Result<Confirmation> {
        if self.delay > timeout {
            return Ok(Confirmation::TimedOut);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let digest = Sha256::digest(handle.0.as_slice());
        Ok(Confirmation::Confirmed {
            address: Address::from_slice(&digest[12..]),
            tx_hash: handle.0,
        })
    }
}
