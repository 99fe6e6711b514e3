//! Compliance Evaluator
//!
//! Pure, deterministic mapping from a [`ReserveSnapshot`] to a
//! [`ComplianceVerdict`]. No I/O, no clock reads: the cycle time is passed in.
//!
//! ## Thresholds (basis points)
//!
//! | Ratio                | Tier     |
//! |----------------------|----------|
//! | `>= 10200`           | HEALTHY  |
//! | `10050 ..= 10199`    | WARNING  |
//! | `10000 ..= 10049`    | CRITICAL |
//! | `< 10000`            | BREACH   |
//!
//! Tier and compliance are independent axes: a HEALTHY ratio can still be
//! non-compliant because of asset composition, rehypothecation, or a stale
//! audit.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::snapshot::{DataQuality, ReserveSnapshot, StablecoinSymbol};

// ============================================================================
// Constants
// ============================================================================

/// Early-warning threshold (102%)
pub const WARNING_RATIO_BPS: u16 = 10_200;

/// Critical threshold (100.5%)
pub const CRITICAL_RATIO_BPS: u16 = 10_050;

/// Breach threshold (100%)
pub const BREACH_RATIO_BPS: u16 = 10_000;

/// Maximum audit age before an attestation counts as overdue
pub const AUDIT_MAX_AGE_SECS: u64 = 30 * 86_400;

/// Ordered `(min_bps, tier)` table, evaluated top-down, first match wins
pub const TIER_TABLE: [(u16, StatusTier); 4] = [
    (WARNING_RATIO_BPS, StatusTier::Healthy),
    (CRITICAL_RATIO_BPS, StatusTier::Warning),
    (BREACH_RATIO_BPS, StatusTier::Critical),
    (0, StatusTier::Breach),
];

// ============================================================================
// Types
// ============================================================================

/// Coarse health classification driven solely by the reserve ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusTier {
    Healthy,
    Warning,
    Critical,
    Breach,
}

impl StatusTier {
    /// Tier for a ratio according to [`TIER_TABLE`]
    pub fn for_ratio(ratio_bps: u16) -> Self {
        TIER_TABLE
            .iter()
            .find(|(min_bps, _)| ratio_bps >= *min_bps)
            .map(|(_, tier)| *tier)
            .unwrap_or(StatusTier::Breach)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTier::Healthy => "HEALTHY",
            StatusTier::Warning => "WARNING",
            StatusTier::Critical => "CRITICAL",
            StatusTier::Breach => "BREACH",
        }
    }
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict status: a rated tier, or skipped for zero supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "tier")]
pub enum VerdictStatus {
    Rated(StatusTier),
    Skipped,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Rated(tier) => tier.as_str(),
            VerdictStatus::Skipped => "SKIPPED",
        }
    }
}

/// Individual finding recorded alongside a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceReason {
    ZeroSupply,
    RatioBelowWarning,
    NonPermittedAssets,
    PossibleRehypothecation,
    AuditOverdue,
    /// Audit recency indeterminate; does not by itself force non-compliance
    AuditUnknown,
    /// Reserves could not be split from supply upstream
    ReservesAssumedParity,
    DataUnavailable,
}

impl ComplianceReason {
    pub fn description(&self) -> &'static str {
        match self {
            ComplianceReason::ZeroSupply => "No circulating supply; evaluation skipped",
            ComplianceReason::RatioBelowWarning => "Reserve ratio below 102% requirement",
            ComplianceReason::NonPermittedAssets => "Non-permitted asset types in reserves",
            ComplianceReason::PossibleRehypothecation => "Possible rehypothecation detected",
            ComplianceReason::AuditOverdue => "Audit overdue (>30 days)",
            ComplianceReason::AuditUnknown => "Audit recency unknown",
            ComplianceReason::ReservesAssumedParity => {
                "Reserves assumed 1:1 with supply (not independently reported)"
            }
            ComplianceReason::DataUnavailable => "Reserve data unavailable; placeholder values used",
        }
    }
}

/// Derived, immutable compliance verdict for one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub symbol: StablecoinSymbol,
    /// `floor(reserves * 10000 / supply)`, saturated to the 16-bit wire field
    pub ratio_bps: u16,
    pub status: VerdictStatus,
    pub compliant: bool,
    pub audit_overdue: bool,
    pub audit_unknown: bool,
    pub data_quality: DataQuality,
    pub reasons: Vec<ComplianceReason>,
}

impl ComplianceVerdict {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, VerdictStatus::Skipped)
    }

    pub fn tier(&self) -> Option<StatusTier> {
        match self.status {
            VerdictStatus::Rated(tier) => Some(tier),
            VerdictStatus::Skipped => None,
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Reserve ratio in basis points using exact integer arithmetic.
///
/// Returns `None` when supply is zero. Ratios above `u16::MAX` saturate.
pub fn ratio_bps(total_reserves: u128, total_supply: u128) -> Option<u16> {
    if total_supply == 0 {
        return None;
    }

    let whole = total_reserves / total_supply;
    // 7 * 10000 already exceeds the 16-bit field
    if whole >= 7 {
        return Some(u16::MAX);
    }

    // Four decimal digits of the fractional part by long division. Each digit
    // is computed as floor(10 * rem / supply) with modular addition, so no
    // intermediate ever exceeds the divisor.
    let mut rem = total_reserves % total_supply;
    let mut bps = whole as u32;
    for _ in 0..4 {
        let (digit, next) = times_ten_divmod(rem, total_supply);
        bps = bps * 10 + digit;
        rem = next;
    }

    Some(u16::try_from(bps).unwrap_or(u16::MAX))
}

/// `(floor(10 * rem / divisor), (10 * rem) % divisor)` for `rem < divisor`
fn times_ten_divmod(rem: u128, divisor: u128) -> (u32, u128) {
    let mut acc: u128 = 0;
    let mut quotient = 0u32;
    for _ in 0..10 {
        let headroom = divisor - acc;
        if rem >= headroom {
            acc = rem - headroom;
            quotient += 1;
        } else {
            acc += rem;
        }
    }
    (quotient, acc)
}

/// Evaluate a snapshot at cycle time `now` (Unix seconds)
pub fn evaluate(snapshot: &ReserveSnapshot, now: u64) -> ComplianceVerdict {
    let mut reasons = Vec::new();
    match snapshot.data_quality {
        DataQuality::Reported => {}
        DataQuality::AssumedParity => reasons.push(ComplianceReason::ReservesAssumedParity),
        DataQuality::Unavailable => reasons.push(ComplianceReason::DataUnavailable),
    }

    let Some(ratio) = ratio_bps(snapshot.total_reserves, snapshot.total_supply) else {
        reasons.insert(0, ComplianceReason::ZeroSupply);
        return ComplianceVerdict {
            symbol: snapshot.symbol,
            ratio_bps: 0,
            status: VerdictStatus::Skipped,
            compliant: false,
            audit_overdue: false,
            audit_unknown: snapshot.last_audit_timestamp == 0,
            data_quality: snapshot.data_quality,
            reasons,
        };
    };

    let tier = StatusTier::for_ratio(ratio);
    let audit_unknown = snapshot.last_audit_timestamp == 0;
    let audit_overdue = is_audit_overdue(snapshot.last_audit_timestamp, now);

    if ratio < WARNING_RATIO_BPS {
        reasons.push(ComplianceReason::RatioBelowWarning);
    }
    if !snapshot.permitted_assets_only {
        reasons.push(ComplianceReason::NonPermittedAssets);
    }
    if !snapshot.no_rehypothecation {
        reasons.push(ComplianceReason::PossibleRehypothecation);
    }
    if audit_overdue {
        reasons.push(ComplianceReason::AuditOverdue);
    }
    if audit_unknown {
        reasons.push(ComplianceReason::AuditUnknown);
    }

    let compliant = ratio >= WARNING_RATIO_BPS
        && snapshot.permitted_assets_only
        && snapshot.no_rehypothecation
        && !audit_overdue;

    ComplianceVerdict {
        symbol: snapshot.symbol,
        ratio_bps: ratio,
        status: VerdictStatus::Rated(tier),
        compliant,
        audit_overdue,
        audit_unknown,
        data_quality: snapshot.data_quality,
        reasons,
    }
}

/// Audit staleness: known timestamp strictly older than 30 days
pub fn is_audit_overdue(last_audit_timestamp: u64, now: u64) -> bool {
    last_audit_timestamp > 0 && now.saturating_sub(last_audit_timestamp) > AUDIT_MAX_AGE_SECS
}
