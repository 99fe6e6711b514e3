//! Cryptographic utilities for the compliance oracle
//!
//! - Attestation proof hashes (SHA-256, all-zero "unattested" sentinel)
//! - Report signing before ledger submission (Ed25519 over SHA-256 digest)
//! - Hex helpers for `0x`-prefixed wire values

pub mod hash;
pub mod signing;

pub use hash::{ProofHash, from_hex_prefixed, sha256, to_hex_prefixed};
pub use signing::{ReportSigner, SignedReport};
