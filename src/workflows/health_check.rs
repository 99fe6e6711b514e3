//! Scheduled reserve health check
//!
//! For every tracked stablecoin, strictly in order: normalize, evaluate,
//! encode, publish. One unreachable source never stops the cycle.
//!
//! Cycles never overlap: a cycle started while another holds the
//! [`CycleGate`] returns `ALREADY_RUNNING` without touching the ledger.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::context::InvocationContext;
use crate::report::{PublishOutcome, ReportCandidate};
use crate::reserve::{
    ComplianceReason, DataQuality, StablecoinSymbol, collect_snapshot, evaluate,
};

/// Shared across cycles. Holds the newest report timestamp submitted per
/// stablecoin so a later cycle in the same second cannot resubmit it.
#[derive(Debug, Default)]
pub struct CycleGate {
    last_submitted: Mutex<HashMap<StablecoinSymbol, u64>>,
}

impl CycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a cycle is in progress
    pub fn is_running(&self) -> bool {
        self.last_submitted.try_lock().is_err()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Completed,
    AlreadyRunning,
}

/// Per-stablecoin result of one cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinOutcome {
    pub symbol: String,
    pub status: String,
    pub ratio_bps: u16,
    pub compliant: bool,
    pub data_quality: DataQuality,
    pub reasons: Vec<ComplianceReason>,
    pub publish: PublishOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub status: CycleStatus,
    pub timestamp: u64,
    pub summary: String,
    pub coins: Vec<CoinOutcome>,
}

impl CycleSummary {
    fn already_running(timestamp: u64) -> Self {
        Self {
            status: CycleStatus::AlreadyRunning,
            timestamp,
            summary: "cycle already running".to_string(),
            coins: Vec::new(),
        }
    }
}

/// `USDC: HEALTHY (10300bps) | USDT: SKIPPED (0bps)`
fn summary_line(coins: &[CoinOutcome]) -> String {
    coins
        .iter()
        .map(|coin| format!("{}: {} ({}bps)", coin.symbol, coin.status, coin.ratio_bps))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub async fn run_health_check(ctx: &InvocationContext) -> CycleSummary {
    let Ok(mut last_submitted) = ctx.cycle_gate().last_submitted.try_lock() else {
        warn!("Health check already in progress, cycle skipped");
        return CycleSummary::already_running(ctx.now);
    };
    info!("=== StableGuard Compliance Check ===");

    let mut publisher = ctx.publisher();
    let mut coins = Vec::with_capacity(ctx.settings().stablecoins.len());

    for source in &ctx.settings().stablecoins {
        let snapshot = collect_snapshot(ctx.fetcher(), source, ctx.now).await;
        let verdict = evaluate(&snapshot, ctx.now);

        info!(
            symbol = %verdict.symbol,
            ratio_bps = verdict.ratio_bps,
            status = verdict.status.as_str(),
            compliant = verdict.compliant,
            "Compliance evaluated"
        );
        for reason in &verdict.reasons {
            info!(symbol = %verdict.symbol, "  {}", reason.description());
        }

        let candidate = ReportCandidate::from_evaluation(&snapshot, &verdict, ctx.now);
        let publish = match &candidate {
            ReportCandidate::Ready(report) => {
                let id = report.id();
                if last_submitted
                    .get(&id.symbol)
                    .is_some_and(|ts| id.timestamp <= *ts)
                {
                    warn!(report = %id, "Report already submitted by an earlier cycle");
                    PublishOutcome::AlreadySubmitted
                } else {
                    // Recorded whatever the result, like the publisher's own guard
                    last_submitted.insert(id.symbol, id.timestamp);
                    publisher.publish(&candidate).await
                }
            }
            ReportCandidate::Skipped { .. } => publisher.publish(&candidate).await,
        };

        coins.push(CoinOutcome {
            symbol: verdict.symbol.to_string(),
            status: verdict.status.as_str().to_string(),
            ratio_bps: verdict.ratio_bps,
            compliant: verdict.compliant,
            data_quality: verdict.data_quality,
            reasons: verdict.reasons,
            publish,
        });
    }

    let summary = summary_line(&coins);
    info!("=== Result: {} ===", summary);

    CycleSummary {
        status: CycleStatus::Completed,
        timestamp: ctx.now,
        summary,
        coins,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(symbol: &str, status: &str, ratio_bps: u16) -> CoinOutcome {
        CoinOutcome {
            symbol: symbol.to_string(),
            status: status.to_string(),
            ratio_bps,
            compliant: false,
            data_quality: DataQuality::Reported,
            reasons: Vec::new(),
            publish: PublishOutcome::Skipped,
        }
    }

    #[tokio::test]
    async fn test_gate_reports_running_cycle() {
        let gate = CycleGate::new();
        assert!(!gate.is_running());

        let held = gate.last_submitted.lock().await;
        assert!(gate.is_running());
        drop(held);
        assert!(!gate.is_running());
    }

    #[test]
    fn test_already_running_summary() {
        let summary = CycleSummary::already_running(7);
        assert_eq!(summary.status, CycleStatus::AlreadyRunning);
        assert!(summary.coins.is_empty());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "ALREADY_RUNNING");
    }

    #[test]
    fn test_summary_line() {
        let coins = vec![coin("USDC", "HEALTHY", 10_300), coin("USDT", "SKIPPED", 0)];
        assert_eq!(
            summary_line(&coins),
            "USDC: HEALTHY (10300bps) | USDT: SKIPPED (0bps)"
        );
    }
}
