//! Oracle Publisher
//!
//! Submits each ready report at most once. A publisher lives for one
//! invocation: it never retries, never resubmits a report id it already
//! handed to the ledger, and never mutates anything on failure. The next
//! scheduled cycle produces a fresh report instead.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::crypto::ReportSigner;
use crate::ledger::{LedgerClient, TxStatus};

use super::codec;
use super::types::{ReportCandidate, ReportId};

/// Tri-state submission outcome plus the two no-op cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishOutcome {
    /// Ledger accepted the report
    Published { tx_hash: String },
    /// Ledger answered but rejected the write
    Failed { reason: String },
    /// Submission channel unreachable
    Unavailable { reason: String },
    /// Zero-supply verdict; nothing submitted
    Skipped,
    /// Same report id was already submitted in this invocation
    AlreadySubmitted,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishOutcome::Published { .. } => "SUCCESS",
            PublishOutcome::Failed { .. } => "FAILED",
            PublishOutcome::Unavailable { .. } => "UNAVAILABLE",
            PublishOutcome::Skipped => "SKIPPED",
            PublishOutcome::AlreadySubmitted => "ALREADY_SUBMITTED",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

pub struct OraclePublisher<'a> {
    ledger: &'a dyn LedgerClient,
    signer: &'a ReportSigner,
    submitted: HashSet<ReportId>,
}

impl<'a> OraclePublisher<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, signer: &'a ReportSigner) -> Self {
        Self {
            ledger,
            signer,
            submitted: HashSet::new(),
        }
    }

    pub async fn publish(&mut self, candidate: &ReportCandidate) -> PublishOutcome {
        let report = match candidate {
            ReportCandidate::Skipped { symbol } => {
                info!(symbol = %symbol, outcome = "SKIPPED", "Zero supply, no report submitted");
                return PublishOutcome::Skipped;
            }
            ReportCandidate::Ready(report) => report,
        };

        let id = report.id();
        // Marked before the write so a failed attempt is never repeated
        if !self.submitted.insert(id) {
            warn!(report = %id, "Report already submitted in this invocation");
            return PublishOutcome::AlreadySubmitted;
        }

        let signed = self.signer.sign(&codec::encode(report));

        match self.ledger.write_report(&signed).await {
            Ok(receipt) if receipt.tx_status == TxStatus::Success => {
                let tx_hash = receipt
                    .tx_hash
                    .unwrap_or_else(|| format!("0x{}", "0".repeat(64)));
                info!(
                    report = %id,
                    ratio_bps = report.ratio_bps,
                    compliant = report.compliant,
                    outcome = "SUCCESS",
                    "Report submitted. Tx: {}", tx_hash
                );
                PublishOutcome::Published { tx_hash }
            }
            Ok(receipt) => {
                let reason = receipt
                    .error_message
                    .unwrap_or_else(|| format!("{:?}", receipt.tx_status));
                error!(report = %id, outcome = "FAILED", "Report write rejected: {}", reason);
                PublishOutcome::Failed { reason }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(report = %id, outcome = "UNAVAILABLE", "Ledger unavailable: {}", reason);
                PublishOutcome::Unavailable { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ProofHash, SignedReport};
    use crate::ledger::WriteReceipt;
    use crate::report::ComplianceReport;
    use crate::reserve::{StablecoinSymbol, whole_tokens};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLedger {
        writes: AtomicUsize,
        status: Option<TxStatus>,
    }

    #[async_trait]
    impl LedgerClient for CountingLedger {
        async fn write_report(&self, _signed: &SignedReport) -> anyhow::Result<WriteReceipt> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(tx_status) => Ok(WriteReceipt {
                    tx_status,
                    tx_hash: Some("0x01".to_string()),
                    error_message: None,
                }),
                None => Err(anyhow::anyhow!("connection refused")),
            }
        }

        async fn invoke_safeguard(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn ledger(status: Option<TxStatus>) -> CountingLedger {
        CountingLedger {
            writes: AtomicUsize::new(0),
            status,
        }
    }

    fn ready() -> ReportCandidate {
        ReportCandidate::Ready(ComplianceReport {
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
        })
    }

    #[tokio::test]
    async fn test_skipped_never_touches_ledger() {
        let ledger = ledger(Some(TxStatus::Success));
        let signer = ReportSigner::generate();
        let mut publisher = OraclePublisher::new(&ledger, &signer);

        let outcome = publisher
            .publish(&ReportCandidate::Skipped {
                symbol: StablecoinSymbol::parse("USDC").unwrap(),
            })
            .await;

        assert_eq!(outcome, PublishOutcome::Skipped);
        assert_eq!(ledger.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success() {
        let ledger = ledger(Some(TxStatus::Success));
        let signer = ReportSigner::generate();
        let mut publisher = OraclePublisher::new(&ledger, &signer);

        let outcome = publisher.publish(&ready()).await;
        assert_eq!(
            outcome,
            PublishOutcome::Published {
                tx_hash: "0x01".to_string()
            }
        );
        assert_eq!(outcome.as_str(), "SUCCESS");
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let ledger = ledger(None);
        let signer = ReportSigner::generate();
        let mut publisher = OraclePublisher::new(&ledger, &signer);

        let first = publisher.publish(&ready()).await;
        assert!(matches!(first, PublishOutcome::Unavailable { .. }));

        let second = publisher.publish(&ready()).await;
        assert_eq!(second, PublishOutcome::AlreadySubmitted);
        assert_eq!(ledger.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reverted_is_failed() {
        let ledger = ledger(Some(TxStatus::Reverted));
        let signer = ReportSigner::generate();
        let mut publisher = OraclePublisher::new(&ledger, &signer);

        let outcome = publisher.publish(&ready()).await;
        assert!(matches!(outcome, PublishOutcome::Failed { .. }));
        assert_eq!(outcome.as_str(), "FAILED");
    }
}
