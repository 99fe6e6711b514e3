//! In-process ledger used for local runs and tests.
//!
//! Keeps an append-only log of accepted reports and emits a `ReportUpdated`
//! log on a broadcast channel for each one, which is what drives the
//! event-triggered workflows when no real chain is configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::crypto::signing::verify;
use crate::crypto::{SignedReport, from_hex_prefixed, sha256, to_hex_prefixed};
use crate::report::{ComplianceReport, LedgerLog, ReportUpdated, codec};

use super::client::{LedgerClient, TxStatus, WriteReceipt};

/// One accepted write
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub report: ComplianceReport,
    pub tx_hash: String,
}

pub struct SimulatedLedger {
    entries: RwLock<Vec<LedgerEntry>>,
    safeguard_calls: RwLock<u64>,
    events: broadcast::Sender<LedgerLog>,
}

impl SimulatedLedger {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            entries: RwLock::new(Vec::new()),
            safeguard_calls: RwLock::new(0),
            events,
        }
    }

    /// Receive every `ReportUpdated` log emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerLog> {
        self.events.subscribe()
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().await.clone()
    }

    pub async fn safeguard_calls(&self) -> u64 {
        *self.safeguard_calls.read().await
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn write_report(&self, signed: &SignedReport) -> Result<WriteReceipt> {
        if !verify(signed)? {
            return Ok(WriteReceipt {
                tx_status: TxStatus::Reverted,
                tx_hash: None,
                error_message: Some("invalid report signature".to_string()),
            });
        }

        let payload = from_hex_prefixed(&signed.payload).context("Invalid payload hex")?;
        let report = match codec::decode(&payload) {
            Ok(report) => report,
            Err(e) => {
                return Ok(WriteReceipt {
                    tx_status: TxStatus::Reverted,
                    tx_hash: None,
                    error_message: Some(e.to_string()),
                });
            }
        };

        let mut entries = self.entries.write().await;
        let mut preimage = payload;
        preimage.extend_from_slice(&(entries.len() as u64).to_be_bytes());
        let tx_hash = to_hex_prefixed(&sha256(&preimage));

        entries.push(LedgerEntry {
            report: report.clone(),
            tx_hash: tx_hash.clone(),
        });
        drop(entries);

        let event = ReportUpdated {
            report,
            tx_hash: tx_hash.clone(),
        };
        // No subscribers is fine; the entry is already recorded
        if self.events.send(event.to_log()).is_err() {
            warn!("No ReportUpdated subscribers for {}", tx_hash);
        }

        info!("Simulated ledger accepted report, tx {}", tx_hash);
        Ok(WriteReceipt {
            tx_status: TxStatus::Success,
            tx_hash: Some(tx_hash),
            error_message: None,
        })
    }

    async fn invoke_safeguard(&self) -> Result<()> {
        *self.safeguard_calls.write().await += 1;
        info!("Simulated SafeguardController.evaluateAndAct()");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ProofHash, ReportSigner};
    use crate::reserve::{StablecoinSymbol, whole_tokens};

    fn report() -> ComplianceReport {
        ComplianceReport {
            timestamp: 1_760_000_000,
            total_reserves: whole_tokens(103),
            total_supply: whole_tokens(100),
            ratio_bps: 10_300,
            compliant: true,
            proof_hash: ProofHash::UNATTESTED,
            symbol: StablecoinSymbol::parse("USDC").unwrap(),
            permitted_assets_only: true,
            no_rehypothecation: true,
            last_audit_timestamp: 1_759_000_000,
        }
    }

    #[tokio::test]
    async fn test_write_appends_and_emits_event() {
        let ledger = SimulatedLedger::default();
        let mut events = ledger.subscribe();
        let signer = ReportSigner::generate();

        let signed = signer.sign(&codec::encode(&report()));
        let receipt = ledger.write_report(&signed).await.unwrap();
        assert_eq!(receipt.tx_status, TxStatus::Success);

        let log = events.recv().await.unwrap();
        let event = ReportUpdated::from_log(&log).unwrap();
        assert_eq!(event.report, report());
        assert_eq!(Some(event.tx_hash), receipt.tx_hash);
        assert_eq!(ledger.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_reverts() {
        let ledger = SimulatedLedger::default();
        let signer = ReportSigner::generate();
        let mut signed = signer.sign(&codec::encode(&report()));
        signed.signature = to_hex_prefixed(&[0u8; 64]);

        let receipt = ledger.write_report(&signed).await.unwrap();
        assert_eq!(receipt.tx_status, TxStatus::Reverted);
        assert!(ledger.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_safeguard_calls_counted() {
        let ledger = SimulatedLedger::default();
        ledger.invoke_safeguard().await.unwrap();
        ledger.invoke_safeguard().await.unwrap();
        assert_eq!(ledger.safeguard_calls().await, 2);
    }
}
