//! Minimal JSON-RPC client used by the HTTP transaction submitter.

use std::time::Duration;

use anyhow::Context;
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Timeout for a single HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level retries per call. RPC-level errors are never retried.
const MAX_RETRIES: usize = 3;

/// JSON-RPC client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
}

impl RpcClient {
    pub fn new(url: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the `result` field.
    ///
    /// Transport failures are retried with exponential backoff; an error
    /// response from the endpoint fails immediately.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let post = || async { self.post(&body).await };
        let response = post
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .notify(|err, dur| {
                tracing::trace!(error = %err, retry_in = ?dur, method, "RPC request failed, retrying");
            })
            .await
            .with_context(|| format!("Failed to send {method} request"))?;

        if let Some(error) = response.get("error") {
            anyhow::bail!(
                "RPC error calling {method}: {}",
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
            );
        }

        let result = response
            .get("result")
            .cloned()
            .with_context(|| format!("No result in {method} response"))?;

        serde_json::from_value(result)
            .with_context(|| format!("Failed to deserialize {method} result"))
    }

    async fn post(&self, body: &Value) -> anyhow::Result<Value> {
        let response = self
            .client
            .post(self.url.clone())
            .json(body)
            .send()
            .await
            .context("request failed")?;
        response.json().await.context("invalid JSON response")
    }
}
