use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::api::http::SecureHttpClient;
use crate::crypto::SignedReport;

/// `evaluateAndAct()` selector on the safeguard controller
pub const EVALUATE_AND_ACT_SELECTOR: &str = "0x63bc1659";

/// Ledger-side transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Success,
    Reverted,
    Fatal,
}

/// Result of one report write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    pub tx_status: TxStatus,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Ledger read/write capability
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit one signed report. Called at most once per report; an `Err`
    /// means the channel itself was unreachable.
    async fn write_report(&self, signed: &SignedReport) -> Result<WriteReceipt>;

    /// Call the safeguard controller's `evaluateAndAct()`
    async fn invoke_safeguard(&self) -> Result<()>;
}

/// Ledger settings used by [`HttpLedgerClient`]
#[derive(Debug, Clone)]
pub struct LedgerEndpoint {
    pub rpc_url: String,
    pub oracle_address: String,
    pub safeguard_address: String,
    pub gas_limit: u64,
}

/// Ledger client that talks to a JSON write relay.
///
/// `POST {rpc_url}/reports` submits a report, `POST {rpc_url}/calls` performs
/// a contract call. Nothing is retried here.
pub struct HttpLedgerClient {
    http: SecureHttpClient,
    endpoint: LedgerEndpoint,
}

impl HttpLedgerClient {
    pub fn new(http: SecureHttpClient, endpoint: LedgerEndpoint) -> Self {
        Self { http, endpoint }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.rpc_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn write_report(&self, signed: &SignedReport) -> Result<WriteReceipt> {
        let body = json!({
            "receiver": self.endpoint.oracle_address,
            "report": signed,
            "gasConfig": { "gasLimit": self.endpoint.gas_limit.to_string() },
        });

        let reply = self
            .http
            .post_json(&self.url("reports"), &body, &[])
            .await
            .context("Ledger relay unreachable")?;

        if !reply.is_success() {
            return Err(anyhow::anyhow!(
                "Ledger relay returned status {}",
                reply.status
            ));
        }

        let receipt: WriteReceipt =
            serde_json::from_str(&reply.body).context("Ledger relay returned invalid receipt")?;
        debug!("Ledger write receipt: {:?}", receipt);
        Ok(receipt)
    }

    async fn invoke_safeguard(&self) -> Result<()> {
        let body = json!({
            "to": self.endpoint.safeguard_address,
            "data": EVALUATE_AND_ACT_SELECTOR,
        });

        let reply = self
            .http
            .post_json(&self.url("calls"), &body, &[])
            .await
            .context("Ledger relay unreachable")?;

        if !reply.is_success() {
            return Err(anyhow::anyhow!(
                "Safeguard call failed with status {}",
                reply.status
            ));
        }

        info!("SafeguardController.evaluateAndAct() invoked");
        Ok(())
    }
}
