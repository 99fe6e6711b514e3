use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::ProofHash;
use crate::reserve::{
    ComplianceReason, ComplianceVerdict, ReserveSnapshot, StablecoinSymbol, StatusTier,
    WARNING_RATIO_BPS, is_audit_overdue,
};

/// Identity of a report: cycle timestamp plus symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId {
    pub symbol: StablecoinSymbol,
    pub timestamp: u64,
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.timestamp)
    }
}

/// On-ledger compliance record. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub timestamp: u64,
    pub total_reserves: u128,
    pub total_supply: u128,
    pub ratio_bps: u16,
    pub compliant: bool,
    pub proof_hash: ProofHash,
    pub symbol: StablecoinSymbol,
    pub permitted_assets_only: bool,
    pub no_rehypothecation: bool,
    pub last_audit_timestamp: u64,
}

impl ComplianceReport {
    pub fn id(&self) -> ReportId {
        ReportId {
            symbol: self.symbol,
            timestamp: self.timestamp,
        }
    }

    pub fn status_tier(&self) -> StatusTier {
        StatusTier::for_ratio(self.ratio_bps)
    }

    /// Audit staleness relative to the report's own timestamp
    pub fn audit_overdue(&self) -> bool {
        is_audit_overdue(self.last_audit_timestamp, self.timestamp)
    }

    pub fn audit_known(&self) -> bool {
        self.last_audit_timestamp > 0
    }

    /// Ratio as a two-decimal percentage, e.g. `101.25`
    pub fn ratio_percent(&self) -> String {
        format!("{}.{:02}", self.ratio_bps / 100, self.ratio_bps % 100)
    }

    /// Checks that failed, recomputed from the report fields alone
    pub fn failed_checks(&self) -> Vec<ComplianceReason> {
        let mut failed = Vec::new();
        if self.ratio_bps < WARNING_RATIO_BPS {
            failed.push(ComplianceReason::RatioBelowWarning);
        }
        if !self.permitted_assets_only {
            failed.push(ComplianceReason::NonPermittedAssets);
        }
        if !self.no_rehypothecation {
            failed.push(ComplianceReason::PossibleRehypothecation);
        }
        if self.audit_overdue() {
            failed.push(ComplianceReason::AuditOverdue);
        }
        failed
    }
}

/// Outcome of turning one evaluation into something publishable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportCandidate {
    /// Zero supply; nothing is ever submitted
    Skipped { symbol: StablecoinSymbol },
    Ready(ComplianceReport),
}

impl ReportCandidate {
    /// Build the cycle's report from a snapshot and its verdict.
    ///
    /// The proof hash starts as the unattested sentinel; attestations are
    /// attached out-of-band.
    pub fn from_evaluation(
        snapshot: &ReserveSnapshot,
        verdict: &ComplianceVerdict,
        timestamp: u64,
    ) -> Self {
        if verdict.is_skipped() {
            return ReportCandidate::Skipped {
                symbol: verdict.symbol,
            };
        }

        ReportCandidate::Ready(ComplianceReport {
            timestamp,
            total_reserves: snapshot.total_reserves,
            total_supply: snapshot.total_supply,
            ratio_bps: verdict.ratio_bps,
            compliant: verdict.compliant,
            proof_hash: ProofHash::UNATTESTED,
            symbol: snapshot.symbol,
            permitted_assets_only: snapshot.permitted_assets_only,
            no_rehypothecation: snapshot.no_rehypothecation,
            last_audit_timestamp: snapshot.last_audit_timestamp,
        })
    }

    pub fn symbol(&self) -> StablecoinSymbol {
        match self {
            ReportCandidate::Skipped { symbol } => *symbol,
            ReportCandidate::Ready(report) => report.symbol,
        }
    }
}
