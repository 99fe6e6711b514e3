use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of arbitrary bytes
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `0x`-prefixed lowercase hex
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without the `0x` prefix
pub fn from_hex_prefixed(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits)
}

/// 32-byte content hash of an attestation.
///
/// The all-zero value is the "not yet attested" sentinel carried by freshly
/// published reports; it is never the hash of any text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProofHash([u8; 32]);

impl ProofHash {
    pub const UNATTESTED: ProofHash = ProofHash([0u8; 32]);

    /// Content hash of attestation text
    pub fn of_text(text: &str) -> Self {
        ProofHash(sha256(text.as_bytes()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        ProofHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_attested(&self) -> bool {
        self.0 != [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        to_hex_prefixed(&self.0)
    }
}

impl fmt::Display for ProofHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ProofHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ProofHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = from_hex_prefixed(&raw).map_err(serde::de::Error::custom)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("proof hash must be 32 bytes"))?;
        Ok(ProofHash(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_unattested_sentinel() {
        assert!(!ProofHash::UNATTESTED.is_attested());
        assert!(!ProofHash::default().is_attested());
        assert!(ProofHash::of_text("").is_attested());
    }

    #[test]
    fn test_hex_prefix_handling() {
        assert_eq!(from_hex_prefixed("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(from_hex_prefixed("beef").unwrap(), vec![0xbe, 0xef]);
        assert!(from_hex_prefixed("0xzz").is_err());
        assert_eq!(to_hex_prefixed(&[0x01, 0xff]), "0x01ff");
    }

    #[test]
    fn test_proof_hash_serde() {
        let hash = ProofHash::of_text("attestation");
        let json = serde_json::to_string(&hash).unwrap();
        assert!(json.starts_with("\"0x"));
        let back: ProofHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
