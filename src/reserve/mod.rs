//! Reserve data ingestion and compliance evaluation
//!
//! ```text
//! reserve/
//! ├── snapshot.rs   - Canonical ReserveSnapshot, symbol, fixed-point parsing
//! ├── fetcher.rs    - Upstream fetch capability (HTTP)
//! ├── normalizer.rs - Payload -> snapshot, DATA_UNAVAILABLE fallback
//! └── evaluator.rs  - Pure snapshot -> verdict (ratio, tier, compliance)
//! ```

pub mod evaluator;
pub mod fetcher;
pub mod normalizer;
pub mod snapshot;

pub use evaluator::{
    AUDIT_MAX_AGE_SECS, BREACH_RATIO_BPS, CRITICAL_RATIO_BPS, ComplianceReason, ComplianceVerdict,
    StatusTier, TIER_TABLE, VerdictStatus, WARNING_RATIO_BPS, evaluate, is_audit_overdue,
    ratio_bps,
};
pub use fetcher::{HttpReserveFetcher, ReserveDataFetcher};
pub use normalizer::{
    SourceKind, StablecoinSource, collect_snapshot, fallback_snapshot, normalize,
};
pub use snapshot::{
    BASE_UNIT, BASE_UNIT_DECIMALS, DataQuality, ReserveSnapshot, StablecoinSymbol,
    parse_base_units, whole_tokens,
};
