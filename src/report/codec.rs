//! Report Codec
//!
//! Fixed-layout binary form of a [`ComplianceReport`]: ten 32-byte words in
//! a stable order, ABI tuple style. Numbers are big-endian and left-padded,
//! `bytes32`/`bytes4` are right-padded, booleans are 0 or 1.
//!
//! | # | Field               | Type    |
//! |---|---------------------|---------|
//! | 0 | timestamp           | uint256 |
//! | 1 | totalReserves       | uint256 |
//! | 2 | totalSupply         | uint256 |
//! | 3 | ratioBps            | uint16  |
//! | 4 | compliant           | bool    |
//! | 5 | proofHash           | bytes32 |
//! | 6 | stablecoinSymbol    | bytes4  |
//! | 7 | permittedAssetsOnly | bool    |
//! | 8 | noRehypothecation   | bool    |
//! | 9 | lastAuditTimestamp  | uint256 |
//!
//! Decoding is strict: any padding byte set, boolean other than 0/1, or value
//! wider than the in-memory field is a [`GuardError::SchemaMismatch`].

use crate::crypto::ProofHash;
use crate::error::{GuardError, GuardResult};
use crate::reserve::StablecoinSymbol;

use super::types::ComplianceReport;

/// Word width in bytes
pub const WORD: usize = 32;

/// Number of fields in the tuple
pub const FIELD_COUNT: usize = 10;

/// Exact length of an encoded report
pub const ENCODED_LEN: usize = WORD * FIELD_COUNT;

/// Tuple type string, part of the event signature
pub const TUPLE_TYPE: &str =
    "(uint256,uint256,uint256,uint16,bool,bytes32,bytes4,bool,bool,uint256)";

const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "timestamp",
    "totalReserves",
    "totalSupply",
    "ratioBps",
    "compliant",
    "proofHash",
    "stablecoinSymbol",
    "permittedAssetsOnly",
    "noRehypothecation",
    "lastAuditTimestamp",
];

type Word = [u8; WORD];

/// Encode a report into its 320-byte wire form
pub fn encode(report: &ComplianceReport) -> Vec<u8> {
    let mut symbol = [0u8; WORD];
    symbol[..4].copy_from_slice(&report.symbol.to_bytes4());

    let words: [Word; FIELD_COUNT] = [
        uint_word(report.timestamp as u128),
        uint_word(report.total_reserves),
        uint_word(report.total_supply),
        uint_word(report.ratio_bps as u128),
        bool_word(report.compliant),
        *report.proof_hash.as_bytes(),
        symbol,
        bool_word(report.permitted_assets_only),
        bool_word(report.no_rehypothecation),
        uint_word(report.last_audit_timestamp as u128),
    ];

    words.concat()
}

/// Decode a 320-byte wire form back into a report
pub fn decode(bytes: &[u8]) -> GuardResult<ComplianceReport> {
    if bytes.len() != ENCODED_LEN {
        return Err(GuardError::schema(format!(
            "expected {} bytes ({} words), got {}",
            ENCODED_LEN,
            FIELD_COUNT,
            bytes.len()
        )));
    }

    let mut words = [[0u8; WORD]; FIELD_COUNT];
    for (i, chunk) in bytes.chunks_exact(WORD).enumerate() {
        words[i].copy_from_slice(chunk);
    }

    let timestamp = read_uint(&words[0], 8, 0)? as u64;
    let total_reserves = read_uint(&words[1], 16, 1)?;
    let total_supply = read_uint(&words[2], 16, 2)?;
    let ratio_bps = read_uint(&words[3], 2, 3)? as u16;
    let compliant = read_bool(&words[4], 4)?;
    let proof_hash = ProofHash::from_bytes(words[5]);
    let symbol = read_symbol(&words[6])?;
    let permitted_assets_only = read_bool(&words[7], 7)?;
    let no_rehypothecation = read_bool(&words[8], 8)?;
    let last_audit_timestamp = read_uint(&words[9], 8, 9)? as u64;

    Ok(ComplianceReport {
        timestamp,
        total_reserves,
        total_supply,
        ratio_bps,
        compliant,
        proof_hash,
        symbol,
        permitted_assets_only,
        no_rehypothecation,
        last_audit_timestamp,
    })
}

/// Big-endian uint word
pub fn uint_word(value: u128) -> Word {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn bool_word(value: bool) -> Word {
    uint_word(value as u128)
}

/// Read an unsigned word that must fit in `width` bytes
pub(crate) fn read_uint(word: &Word, width: usize, field: usize) -> GuardResult<u128> {
    let split = WORD - width;
    if word[..split].iter().any(|b| *b != 0) {
        return Err(GuardError::schema(format!(
            "{} exceeds {} bytes",
            FIELD_NAMES[field], width
        )));
    }

    let mut buf = [0u8; 16];
    buf[16 - width..].copy_from_slice(&word[split..]);
    Ok(u128::from_be_bytes(buf))
}

fn read_bool(word: &Word, field: usize) -> GuardResult<bool> {
    match read_uint(word, 1, field)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(GuardError::schema(format!(
            "{} is not a boolean: {}",
            FIELD_NAMES[field], other
        ))),
    }
}

fn read_symbol(word: &Word) -> GuardResult<StablecoinSymbol> {
    if word[4..].iter().any(|b| *b != 0) {
        return Err(GuardError::schema("stablecoinSymbol padding is not zero"));
    }
    let mut field = [0u8; 4];
    field.copy_from_slice(&word[..4]);
    StablecoinSymbol::from_bytes4(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserve::whole_tokens;
    use proptest::prelude::*;

    fn report(symbol: &str) -> ComplianceReport {
        ComplianceReport {
            timestamp: 1_760_000_000,
            total_reserves: whole_tokens(45_900_000_000) + 123,
            total_supply: whole_tokens(45_000_000_000),
            ratio_bps: 10_200,
            compliant: true,
            proof_hash: ProofHash::of_text("attestation"),
            symbol: StablecoinSymbol::parse(symbol).unwrap(),
            permitted_assets_only: true,
            no_rehypothecation: false,
            last_audit_timestamp: 1_758_704_000,
        }
    }

    #[test]
    fn test_round_trip() {
        let original = report("USDC");
        let encoded = encode(&original);
        assert_eq!(encoded.len(), ENCODED_LEN);
        assert_eq!(decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_short_symbol_round_trip() {
        let original = report("DAI");
        let encoded = encode(&original);
        // "DAI" then null padding
        assert_eq!(&encoded[6 * WORD..6 * WORD + 4], b"DAI\0");
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.symbol.as_str(), "DAI");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_layout_positions() {
        let encoded = encode(&report("USDC"));
        // ratioBps is the last two bytes of word 3
        assert_eq!(&encoded[4 * WORD - 2..4 * WORD], &10_200u16.to_be_bytes());
        // compliant flag
        assert_eq!(encoded[5 * WORD - 1], 1);
        // symbol is left-aligned
        assert_eq!(&encoded[6 * WORD..6 * WORD + 4], b"USDC");
    }

    #[test]
    fn test_wrong_length_is_schema_mismatch() {
        let encoded = encode(&report("USDC"));
        assert!(matches!(
            decode(&encoded[..WORD * 9]),
            Err(GuardError::SchemaMismatch(_))
        ));
        let mut longer = encoded.clone();
        longer.extend_from_slice(&[0u8; WORD]);
        assert!(matches!(decode(&longer), Err(GuardError::SchemaMismatch(_))));
    }

    #[test]
    fn test_invalid_bool_is_schema_mismatch() {
        let mut encoded = encode(&report("USDC"));
        encoded[5 * WORD - 1] = 2;
        assert!(matches!(decode(&encoded), Err(GuardError::SchemaMismatch(_))));
    }

    #[test]
    fn test_oversized_ratio_is_schema_mismatch() {
        let mut encoded = encode(&report("USDC"));
        encoded[4 * WORD - 3] = 1;
        assert!(matches!(decode(&encoded), Err(GuardError::SchemaMismatch(_))));
    }

    #[test]
    fn test_symbol_padding_must_be_zero() {
        let mut encoded = encode(&report("USDC"));
        encoded[6 * WORD + 10] = 0xff;
        assert!(matches!(decode(&encoded), Err(GuardError::SchemaMismatch(_))));
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let mut encoded = encode(&report("USDC"));
        encoded[6 * WORD..6 * WORD + 4].copy_from_slice(&[0u8; 4]);
        assert!(matches!(decode(&encoded), Err(GuardError::SchemaMismatch(_))));
    }

    fn arbitrary_report() -> impl Strategy<Value = ComplianceReport> {
        (
            (any::<u64>(), any::<u128>(), any::<u128>(), any::<u16>(), any::<bool>()),
            (
                any::<[u8; 32]>(),
                "[!-~]{1,4}",
                any::<bool>(),
                any::<bool>(),
                any::<u64>(),
            ),
        )
            .prop_map(
                |(
                    (timestamp, total_reserves, total_supply, ratio_bps, compliant),
                    (proof, symbol, permitted_assets_only, no_rehypothecation, last_audit),
                )| ComplianceReport {
                    timestamp,
                    total_reserves,
                    total_supply,
                    ratio_bps,
                    compliant,
                    proof_hash: ProofHash::from_bytes(proof),
                    symbol: StablecoinSymbol::parse(&symbol).unwrap(),
                    permitted_assets_only,
                    no_rehypothecation,
                    last_audit_timestamp: last_audit,
                },
            )
    }

    #[test]
    fn test_extreme_values_round_trip() {
        let mut extreme = report("U");
        extreme.timestamp = u64::MAX;
        extreme.total_reserves = u128::MAX;
        extreme.total_supply = u128::MAX;
        extreme.ratio_bps = u16::MAX;
        extreme.proof_hash = ProofHash::from_bytes([0xff; 32]);
        extreme.last_audit_timestamp = u64::MAX;
        assert_eq!(decode(&encode(&extreme)).unwrap(), extreme);

        let mut zeroed = report("~~~~");
        zeroed.timestamp = 0;
        zeroed.total_reserves = 0;
        zeroed.total_supply = 0;
        zeroed.ratio_bps = 0;
        zeroed.compliant = false;
        zeroed.proof_hash = ProofHash::UNATTESTED;
        zeroed.last_audit_timestamp = 0;
        assert_eq!(decode(&encode(&zeroed)).unwrap(), zeroed);
    }

    proptest! {
        #[test]
        fn property_decode_inverts_encode(original in arbitrary_report()) {
            let encoded = encode(&original);
            prop_assert_eq!(encoded.len(), ENCODED_LEN);
            prop_assert_eq!(decode(&encoded).unwrap(), original);
        }
    }
}
