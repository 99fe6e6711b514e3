//! Compliance reports: wire form, ledger event and publication
//!
//! ```text
//! report/
//! ├── types.rs     - ComplianceReport, ReportId, ReportCandidate
//! ├── codec.rs     - Fixed 10-word binary layout
//! ├── event.rs     - ReportUpdated log encode/decode
//! └── publisher.rs - At-most-once submission per invocation
//! ```

pub mod codec;
pub mod event;
pub mod publisher;
pub mod types;

pub use event::{LedgerLog, ReportUpdated, event_signature, report_updated_topic};
pub use publisher::{OraclePublisher, PublishOutcome};
pub use types::{ComplianceReport, ReportCandidate, ReportId};
