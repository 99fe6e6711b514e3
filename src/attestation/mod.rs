//! AI attestation drafting
//!
//! ```text
//! attestation/
//! ├── context.rs   - Deterministic compliance-data context, score and grade
//! ├── generator.rs - TextGenerator / SecretStore capabilities, Gemini backend
//! ├── workflow.rs  - Report -> attestation -> proof hash -> webhook
//! └── adhoc.rs     - `{ text }` requests routed to the generator
//! ```

pub mod adhoc;
pub mod context;
pub mod generator;
pub mod workflow;

pub use adhoc::{AdhocReply, handle_adhoc};
pub use context::{Grade, build_context, compliance_score};
pub use generator::{
    DEFAULT_CREDENTIAL, EnvSecretStore, GeminiGenerator, GenerationError, GenerationRequest,
    SecretStore, TextGenerator,
};
pub use workflow::{AttestationResult, SIMULATION_MARKER, draft_attestation};
