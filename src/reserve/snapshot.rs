//! Canonical reserve snapshot
//!
//! One normalized reading of reserve and supply data for one stablecoin in one
//! evaluation cycle. Amounts are fixed-point integers with 18 decimal places so
//! ratios are comparable across every upstream source.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GuardError, GuardResult};

/// Decimal places of the fixed-point base unit
pub const BASE_UNIT_DECIMALS: u32 = 18;

/// One whole token expressed in base units
pub const BASE_UNIT: u128 = 1_000_000_000_000_000_000;

/// Width of the encoded symbol field
pub const SYMBOL_WIDTH: usize = 4;

// ============================================================================
// Symbol
// ============================================================================

/// Short stablecoin identifier, at most 4 printable ASCII characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StablecoinSymbol {
    bytes: [u8; SYMBOL_WIDTH],
    len: u8,
}

impl StablecoinSymbol {
    pub fn parse(symbol: &str) -> GuardResult<Self> {
        let raw = symbol.as_bytes();
        if raw.is_empty() {
            return Err(GuardError::schema("stablecoin symbol cannot be empty"));
        }
        if raw.len() > SYMBOL_WIDTH {
            return Err(GuardError::schema(format!(
                "stablecoin symbol '{}' exceeds {} bytes",
                symbol, SYMBOL_WIDTH
            )));
        }
        if !raw.iter().all(|b| b.is_ascii_graphic()) {
            return Err(GuardError::schema(format!(
                "stablecoin symbol '{}' contains non-printable characters",
                symbol.escape_default()
            )));
        }

        let mut bytes = [0u8; SYMBOL_WIDTH];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self {
            bytes,
            len: raw.len() as u8,
        })
    }

    /// Null-padded fixed-width form
    pub fn to_bytes4(&self) -> [u8; SYMBOL_WIDTH] {
        self.bytes
    }

    /// Decode a fixed-width field, stopping at the first null byte
    pub fn from_bytes4(field: [u8; SYMBOL_WIDTH]) -> GuardResult<Self> {
        let end = field.iter().position(|b| *b == 0).unwrap_or(SYMBOL_WIDTH);
        let text = std::str::from_utf8(&field[..end])
            .map_err(|_| GuardError::schema("stablecoin symbol is not valid ASCII"))?;
        Self::parse(text)
    }

    pub fn as_str(&self) -> &str {
        // Constructed only from validated ASCII
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for StablecoinSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StablecoinSymbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StablecoinSymbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StablecoinSymbol::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// How trustworthy the reserve/supply split in a snapshot is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQuality {
    /// Upstream reported reserves and supply independently
    Reported,
    /// Upstream only knows circulating supply; reserves assumed equal to it
    AssumedParity,
    /// Upstream unreachable or unparseable; conservative placeholder values
    Unavailable,
}

impl DataQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Reported => "REPORTED",
            DataQuality::AssumedParity => "ASSUMED_1_TO_1",
            DataQuality::Unavailable => "DATA_UNAVAILABLE",
        }
    }
}

/// Normalized reserve reading for one stablecoin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveSnapshot {
    pub symbol: StablecoinSymbol,
    /// Base units (18 decimals)
    pub total_reserves: u128,
    /// Base units (18 decimals)
    pub total_supply: u128,
    pub permitted_assets_only: bool,
    pub no_rehypothecation: bool,
    /// Unix seconds, 0 when unknown
    pub last_audit_timestamp: u64,
    pub data_quality: DataQuality,
}

impl ReserveSnapshot {
    pub fn has_supply(&self) -> bool {
        self.total_supply > 0
    }
}

// ============================================================================
// Fixed-point parsing
// ============================================================================

/// Decimal digits in `u128::MAX`
const U128_MAX_DIGITS: i64 = 39;

/// Parse a decimal number (`123`, `123.45`, `1.5e10`) into base units.
///
/// Digits beyond 18 fractional places are truncated. Returns `None` for
/// negative, malformed or out-of-range input.
pub fn parse_base_units(raw: &str) -> Option<u128> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('-') {
        return None;
    }
    let raw = raw.strip_prefix('+').unwrap_or(raw);

    let (mantissa, exponent) = match raw.find(['e', 'E']) {
        Some(idx) => (&raw[..idx], raw[idx + 1..].parse::<i32>().ok()?),
        None => (raw, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    // Significant digits, with the decimal point shifted by the exponent
    let digits: String = format!("{}{}", int_part, frac_part);
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Some(0);
    }
    let leading_zeros = (digits.len() - significant.len()) as i64;
    let point = int_part.len() as i64 + exponent as i64 + BASE_UNIT_DECIMALS as i64
        - leading_zeros;
    if point > U128_MAX_DIGITS {
        return None;
    }

    let mut value: u128 = 0;
    for (idx, ch) in significant.bytes().enumerate() {
        if idx as i64 >= point {
            break;
        }
        value = value.checked_mul(10)?.checked_add((ch - b'0') as u128)?;
    }
    let consumed = significant.len() as i64;
    if point > consumed {
        for _ in 0..(point - consumed) {
            value = value.checked_mul(10)?;
        }
    }
    Some(value)
}

/// Convert whole tokens into base units
pub fn whole_tokens(tokens: u64) -> u128 {
    tokens as u128 * BASE_UNIT
}
