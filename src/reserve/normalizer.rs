//! Reserve Snapshot Normalizer
//!
//! Turns heterogeneous upstream payloads into one canonical
//! [`ReserveSnapshot`] per tracked stablecoin. Never fails: an unreachable or
//! unparseable source degrades to a labeled DATA_UNAVAILABLE placeholder so the
//! cycle always completes.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::fetcher::ReserveDataFetcher;
use super::snapshot::{DataQuality, ReserveSnapshot, StablecoinSymbol, parse_base_units, whole_tokens};

/// Upstream payload schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `{ "circulating": { "peggedUSD": N } }`, supply only
    Defillama,
    /// `{ "totalReserves": N, "totalSupply": N, "lastAuditTimestamp": T, ... }`
    Attestation,
}

/// Configuration of one tracked stablecoin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinSource {
    pub symbol: StablecoinSymbol,
    pub endpoint: String,
    pub source: SourceKind,
    /// Issuer holds only cash and short-dated government bills
    pub permitted_assets_only: bool,
    /// Issuer does not re-lend or re-pledge reserves
    pub no_rehypothecation: bool,
    /// Issuer attestation cadence, used when the payload carries no audit time
    #[serde(default)]
    pub audit_age_days: Option<u64>,
    /// Whole tokens used for the placeholder snapshot
    #[serde(default)]
    pub fallback_supply: u64,
}

/// Fetch and normalize one stablecoin, degrading to a fallback on any failure
pub async fn collect_snapshot(
    fetcher: &dyn ReserveDataFetcher,
    source: &StablecoinSource,
    now: u64,
) -> ReserveSnapshot {
    let payload = match fetcher.fetch_json(&source.endpoint).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                symbol = %source.symbol,
                "Reserve data fetch failed: {:#}. Using DATA_UNAVAILABLE fallback", e
            );
            return fallback_snapshot(source);
        }
    };

    match normalize(source, &payload, now) {
        Ok(snapshot) => {
            info!(
                symbol = %snapshot.symbol,
                reserves = %snapshot.total_reserves,
                supply = %snapshot.total_supply,
                quality = snapshot.data_quality.as_str(),
                "Normalized reserve snapshot"
            );
            snapshot
        }
        Err(e) => {
            warn!(
                symbol = %source.symbol,
                "Unrecognized reserve payload: {:#}. Using DATA_UNAVAILABLE fallback", e
            );
            fallback_snapshot(source)
        }
    }
}

/// Normalize a raw upstream payload
pub fn normalize(source: &StablecoinSource, payload: &Value, now: u64) -> Result<ReserveSnapshot> {
    match source.source {
        SourceKind::Defillama => normalize_defillama(source, payload, now),
        SourceKind::Attestation => normalize_attestation(source, payload, now),
    }
}

fn normalize_defillama(source: &StablecoinSource, payload: &Value, now: u64) -> Result<ReserveSnapshot> {
    let circulating = payload
        .pointer("/circulating/peggedUSD")
        .ok_or_else(|| anyhow!("missing circulating.peggedUSD"))?;
    let total_supply = amount_from_json(circulating).context("invalid circulating.peggedUSD")?;

    // Supply-only source: reserves cannot be split out, mark the 1:1 assumption
    Ok(ReserveSnapshot {
        symbol: source.symbol,
        total_reserves: total_supply,
        total_supply,
        permitted_assets_only: source.permitted_assets_only,
        no_rehypothecation: source.no_rehypothecation,
        last_audit_timestamp: cadence_audit_timestamp(source, now),
        data_quality: DataQuality::AssumedParity,
    })
}

fn normalize_attestation(
    source: &StablecoinSource,
    payload: &Value,
    now: u64,
) -> Result<ReserveSnapshot> {
    let total_reserves = payload
        .get("totalReserves")
        .ok_or_else(|| anyhow!("missing totalReserves"))
        .and_then(|v| amount_from_json(v).context("invalid totalReserves"))?;
    let total_supply = payload
        .get("totalSupply")
        .ok_or_else(|| anyhow!("missing totalSupply"))
        .and_then(|v| amount_from_json(v).context("invalid totalSupply"))?;

    let last_audit_timestamp = match payload.get("lastAuditTimestamp") {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| anyhow!("lastAuditTimestamp must be unsigned seconds"))?,
        Some(Value::Null) | None => cadence_audit_timestamp(source, now),
        Some(other) => return Err(anyhow!("invalid lastAuditTimestamp: {}", other)),
    };

    let permitted_assets_only = payload
        .get("permittedAssetsOnly")
        .and_then(Value::as_bool)
        .unwrap_or(source.permitted_assets_only);
    let no_rehypothecation = payload
        .get("noRehypothecation")
        .and_then(Value::as_bool)
        .unwrap_or(source.no_rehypothecation);

    Ok(ReserveSnapshot {
        symbol: source.symbol,
        total_reserves,
        total_supply,
        permitted_assets_only,
        no_rehypothecation,
        last_audit_timestamp,
        data_quality: DataQuality::Reported,
    })
}

/// Conservative placeholder: parity at the configured supply, both flags failing,
/// audit unknown.
pub fn fallback_snapshot(source: &StablecoinSource) -> ReserveSnapshot {
    let supply = whole_tokens(source.fallback_supply);
    ReserveSnapshot {
        symbol: source.symbol,
        total_reserves: supply,
        total_supply: supply,
        permitted_assets_only: false,
        no_rehypothecation: false,
        last_audit_timestamp: 0,
        data_quality: DataQuality::Unavailable,
    }
}

fn cadence_audit_timestamp(source: &StablecoinSource, now: u64) -> u64 {
    source
        .audit_age_days
        .map(|days| now.saturating_sub(days.saturating_mul(86_400)))
        .unwrap_or(0)
}

/// Whole-token amount (JSON number or decimal string) into base units
fn amount_from_json(value: &Value) -> Result<u128> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(anyhow!("expected number, got {}", other)),
    };
    parse_base_units(&raw).ok_or_else(|| anyhow!("not a non-negative decimal: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserve::snapshot::BASE_UNIT;
    use serde_json::json;

    const NOW: u64 = 1_760_000_000;

    fn source(kind: SourceKind) -> StablecoinSource {
        StablecoinSource {
            symbol: StablecoinSymbol::parse("USDC").unwrap(),
            endpoint: "https://stablecoins.llama.fi/stablecoin/2".to_string(),
            source: kind,
            permitted_assets_only: true,
            no_rehypothecation: true,
            audit_age_days: Some(15),
            fallback_supply: 45_000_000_000,
        }
    }

    #[test]
    fn test_defillama_marks_parity() {
        let payload = json!({ "circulating": { "peggedUSD": 45000000000.5 } });
        let snapshot = normalize(&source(SourceKind::Defillama), &payload, NOW).unwrap();

        assert_eq!(snapshot.data_quality, DataQuality::AssumedParity);
        assert_eq!(snapshot.total_supply, snapshot.total_reserves);
        assert_eq!(
            snapshot.total_supply,
            45_000_000_000 * BASE_UNIT + BASE_UNIT / 2
        );
        assert_eq!(snapshot.last_audit_timestamp, NOW - 15 * 86_400);
    }

    #[test]
    fn test_defillama_missing_field_is_error() {
        let payload = json!({ "name": "USD Coin" });
        assert!(normalize(&source(SourceKind::Defillama), &payload, NOW).is_err());
    }

    #[test]
    fn test_attestation_payload() {
        let payload = json!({
            "totalReserves": "103000",
            "totalSupply": 100000,
            "lastAuditTimestamp": NOW - 86_400,
            "noRehypothecation": false
        });
        let snapshot = normalize(&source(SourceKind::Attestation), &payload, NOW).unwrap();

        assert_eq!(snapshot.data_quality, DataQuality::Reported);
        assert_eq!(snapshot.total_reserves, 103_000 * BASE_UNIT);
        assert_eq!(snapshot.total_supply, 100_000 * BASE_UNIT);
        assert_eq!(snapshot.last_audit_timestamp, NOW - 86_400);
        assert!(snapshot.permitted_assets_only);
        assert!(!snapshot.no_rehypothecation);
    }

    #[test]
    fn test_attestation_rejects_negative() {
        let payload = json!({ "totalReserves": -5, "totalSupply": 100 });
        assert!(normalize(&source(SourceKind::Attestation), &payload, NOW).is_err());
    }

    #[test]
    fn test_huge_audit_age_clamps_to_epoch() {
        let mut source = source(SourceKind::Defillama);
        source.audit_age_days = Some(u64::MAX);
        let payload = json!({ "circulating": { "peggedUSD": 100 } });
        let snapshot = normalize(&source, &payload, NOW).unwrap();
        assert_eq!(snapshot.last_audit_timestamp, 0);
    }

    #[test]
    fn test_zero_with_huge_exponent_is_zero() {
        let payload = json!({ "totalReserves": "0e2000000000", "totalSupply": 100 });
        let snapshot = normalize(&source(SourceKind::Attestation), &payload, NOW).unwrap();
        assert_eq!(snapshot.total_reserves, 0);
        assert_eq!(snapshot.total_supply, 100 * BASE_UNIT);
    }

    #[test]
    fn test_fallback_is_conservative() {
        let snapshot = fallback_snapshot(&source(SourceKind::Defillama));
        assert_eq!(snapshot.data_quality, DataQuality::Unavailable);
        assert!(!snapshot.permitted_assets_only);
        assert!(!snapshot.no_rehypothecation);
        assert_eq!(snapshot.last_audit_timestamp, 0);
        assert_eq!(snapshot.total_supply, 45_000_000_000 * BASE_UNIT);
    }
}
