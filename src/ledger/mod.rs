//! Ledger capability: report submission and safeguard calls

pub mod client;
pub mod simulated;

pub use client::{
    EVALUATE_AND_ACT_SELECTOR, HttpLedgerClient, LedgerClient, LedgerEndpoint, TxStatus,
    WriteReceipt,
};
pub use simulated::{LedgerEntry, SimulatedLedger};
