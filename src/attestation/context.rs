//! Deterministic compliance-data context handed to the text generator

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::report::ComplianceReport;
use crate::reserve::BREACH_RATIO_BPS;

/// Composite grade derived from the compliance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Compliant,
    AtRisk,
    NonCompliant,
}

impl Grade {
    pub fn for_score(score: u8) -> Self {
        if score >= 80 {
            Grade::Compliant
        } else if score >= 50 {
            Grade::AtRisk
        } else {
            Grade::NonCompliant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Compliant => "COMPLIANT",
            Grade::AtRisk => "AT_RISK",
            Grade::NonCompliant => "NON_COMPLIANT",
        }
    }
}

/// Result of one regulatory check in the context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Pass,
    Fail,
    Unknown,
}

impl CheckResult {
    fn from_bool(pass: bool) -> Self {
        if pass { CheckResult::Pass } else { CheckResult::Fail }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckResult::Pass => "PASS",
            CheckResult::Fail => "FAIL",
            CheckResult::Unknown => "UNKNOWN",
        }
    }
}

/// Section weights: backing 40, permitted assets 25, no rehypothecation 20,
/// audit recency 15
pub fn compliance_score(report: &ComplianceReport) -> u8 {
    let mut score = 0;
    if report.ratio_bps >= BREACH_RATIO_BPS {
        score += 40;
    }
    if report.permitted_assets_only {
        score += 25;
    }
    if report.no_rehypothecation {
        score += 20;
    }
    if audit_check(report) == CheckResult::Pass {
        score += 15;
    }
    score
}

fn audit_check(report: &ComplianceReport) -> CheckResult {
    if !report.audit_known() {
        CheckResult::Unknown
    } else {
        CheckResult::from_bool(!report.audit_overdue())
    }
}

/// `YYYY-MM-DD` for a Unix timestamp
pub fn report_date(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Build the context string for a published report
pub fn build_context(report: &ComplianceReport, tx_hash: &str) -> String {
    let ratio = report.ratio_percent();
    let score = compliance_score(report);
    let grade = Grade::for_score(score);

    let backing = CheckResult::from_bool(report.ratio_bps >= BREACH_RATIO_BPS);
    let assets = CheckResult::from_bool(report.permitted_assets_only);
    let rehypothecation = CheckResult::from_bool(report.no_rehypothecation);
    let audit = audit_check(report);

    let assets_note = match assets {
        CheckResult::Pass => "reserves held in permitted asset classes only",
        _ => "non-permitted asset types reported in reserves",
    };
    let rehypothecation_note = match rehypothecation {
        CheckResult::Pass => "no re-lending or re-pledging of reserves reported",
        _ => "possible rehypothecation of reserves",
    };
    let audit_note = match audit {
        CheckResult::Pass => format!("last attestation {}", report_date(report.last_audit_timestamp)),
        CheckResult::Fail => format!(
            "last attestation {}, older than 30 days",
            report_date(report.last_audit_timestamp)
        ),
        CheckResult::Unknown => "attestation date not reported".to_string(),
    };

    let lines = [
        "STABLECOIN COMPLIANCE DATA".to_string(),
        "==========================".to_string(),
        format!("Stablecoin: {}", report.symbol),
        format!("Report Date: {}", report_date(report.timestamp)),
        format!("Report Timestamp: {}", report.timestamp),
        String::new(),
        "RESERVE HEALTH:".to_string(),
        format!("  Reserve Ratio: {}% ({} basis points)", ratio, report.ratio_bps),
        format!("  Status: {}", report.status_tier()),
        String::new(),
        "GENIUS ACT COMPLIANCE CHECKS:".to_string(),
        format!(
            "  Section 4 - 1:1 Reserve Backing: {} (ratio: {}%)",
            backing.as_str(),
            ratio
        ),
        format!(
            "  Section 5 - Permitted Assets Only: {} ({})",
            assets.as_str(),
            assets_note
        ),
        format!(
            "  Section 5 - No Rehypothecation: {} ({})",
            rehypothecation.as_str(),
            rehypothecation_note
        ),
        format!("  Section 8 - Monthly Attestation: {} ({})", audit.as_str(), audit_note),
        String::new(),
        "COMPOSITE SCORE:".to_string(),
        format!("  Compliance Score: {}/100", score),
        format!("  Grade: {}", grade.as_str()),
        format!(
            "  Overall: {}",
            if report.compliant { "COMPLIANT" } else { "NON-COMPLIANT" }
        ),
        String::new(),
        format!("Transaction Hash: {}", tx_hash),
    ];

    lines.join("\n")
}
