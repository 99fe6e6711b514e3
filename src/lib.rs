//! StableGuard Compliance Oracle
//!
//! Evaluates stablecoin reserve backing against regulatory thresholds,
//! publishes signed compliance reports to a ledger, alerts on breaches and
//! drafts AI attestations for every published report.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server and scheduler entrypoint
//! ├── config.rs      - Configuration management
//! ├── context.rs     - Capability bundle, per-invocation context
//! ├── error.rs       - Terminal invocation errors
//! ├── reserve/       - Snapshot normalization and compliance evaluation
//! ├── report/        - Report model, fixed-layout codec, event, publisher
//! ├── crypto/        - SHA-256 proof hashes, Ed25519 report signing
//! ├── ledger/        - Ledger capability (HTTP relay, in-process simulation)
//! ├── alerts/        - Breach dispatcher and webhook channel
//! ├── attestation/   - Context building, text generation, attestation workflow
//! ├── workflows/     - Trigger entrypoints (health check, listener, safeguard, regulatory)
//! └── api/           - HTTP routes, request guards, outbound client
//! ```

pub mod alerts;
pub mod api;
pub mod attestation;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod report;
pub mod reserve;
pub mod workflows;

// Re-export main types for convenience
pub use config::GuardConfig;
pub use context::{Capabilities, InvocationContext, PipelineSettings};
pub use error::{GuardError, GuardResult};

pub use reserve::{
    ComplianceVerdict, DataQuality, ReserveSnapshot, StablecoinSource, StablecoinSymbol,
    StatusTier, evaluate,
};
pub use report::{
    ComplianceReport, LedgerLog, OraclePublisher, PublishOutcome, ReportCandidate, ReportId,
    ReportUpdated,
};
pub use crypto::{ProofHash, ReportSigner, SignedReport};
pub use ledger::{HttpLedgerClient, LedgerClient, SimulatedLedger};
pub use alerts::{AlertLevel, BreachAlertDispatcher, DispatchOutcome, WebhookSender};
pub use attestation::{AttestationResult, GeminiGenerator, SecretStore, TextGenerator};
pub use workflows::{
    CycleGate, CycleStatus, CycleSummary, handle_report_event, run_health_check,
    run_regulatory_parser, run_safeguard,
};
