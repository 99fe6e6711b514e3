use anyhow::{Context, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::hash::{from_hex_prefixed, sha256, to_hex_prefixed};

/// Encoder identifier declared with every submission
pub const ENCODER: &str = "abi-tuple-v1";
/// Signing algorithm declared with every submission
pub const SIGNING_ALGO: &str = "ed25519";
/// Hashing algorithm declared with every submission
pub const HASHING_ALGO: &str = "sha256";

/// Encoded report plus its signature and declared configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedReport {
    /// `0x` hex of the encoded report tuple
    pub payload: String,
    /// `0x` hex of the SHA-256 digest that was signed
    pub digest: String,
    pub signature: String,
    pub public_key: String,
    pub encoder: String,
    pub signing_algo: String,
    pub hashing_algo: String,
}

/// Signs encoded reports before ledger submission.
///
/// The digest is `sha256(payload)`; the signature covers the digest.
pub struct ReportSigner {
    secret_key: SigningKey,
    public_key: VerifyingKey,
}

impl ReportSigner {
    /// Fresh random key; used when no seed is configured
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let mut secret_bytes: [u8; 32] = [0u8; 32];
        csprng.fill_bytes(&mut secret_bytes);
        Self::from_seed(secret_bytes)
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret_key = SigningKey::from_bytes(&seed);
        let public_key = secret_key.verifying_key();
        Self {
            secret_key,
            public_key,
        }
    }

    /// Load from a 32-byte hex seed (with or without `0x`)
    pub fn from_hex_seed(seed_hex: &str) -> Result<Self> {
        let bytes = from_hex_prefixed(seed_hex).context("Signing seed is not valid hex")?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Signing seed must be 32 bytes"))?;
        Ok(Self::from_seed(seed))
    }

    pub fn public_key_hex(&self) -> String {
        to_hex_prefixed(&self.public_key.to_bytes())
    }

    pub fn sign(&self, payload: &[u8]) -> SignedReport {
        let digest = sha256(payload);
        let signature = self.secret_key.sign(&digest);

        SignedReport {
            payload: to_hex_prefixed(payload),
            digest: to_hex_prefixed(&digest),
            signature: to_hex_prefixed(&signature.to_bytes()),
            public_key: self.public_key_hex(),
            encoder: ENCODER.to_string(),
            signing_algo: SIGNING_ALGO.to_string(),
            hashing_algo: HASHING_ALGO.to_string(),
        }
    }
}

/// Verify a signed report against its embedded public key
pub fn verify(signed: &SignedReport) -> Result<bool> {
    let payload = from_hex_prefixed(&signed.payload).context("Invalid payload hex")?;

    let public_key_bytes: [u8; 32] = from_hex_prefixed(&signed.public_key)
        .context("Invalid public key hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("Invalid public key length"))?;
    let public_key = VerifyingKey::from_bytes(&public_key_bytes)
        .map_err(|e| anyhow::anyhow!("Invalid public key: {}", e))?;

    let signature_bytes: [u8; 64] = from_hex_prefixed(&signed.signature)
        .context("Invalid signature hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("Invalid signature length"))?;
    let sig = Signature::from_bytes(&signature_bytes);

    let digest = sha256(&payload);
    if to_hex_prefixed(&digest) != signed.digest {
        return Ok(false);
    }

    Ok(public_key.verify(&digest, &sig).is_ok())
}
