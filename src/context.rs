//! Capability bundle and per-invocation context
//!
//! `Capabilities` is assembled once at startup from configuration. Every
//! trigger (scheduled cycle, ledger event, HTTP request) asks it for a fresh
//! [`InvocationContext`] stamped with the invocation time, so no component
//! reaches for process-wide client handles and each invocation can be
//! replayed in isolation.

use std::sync::Arc;

use crate::alerts::WebhookSender;
use crate::attestation::{SecretStore, TextGenerator};
use crate::crypto::ReportSigner;
use crate::ledger::LedgerClient;
use crate::report::OraclePublisher;
use crate::reserve::{ReserveDataFetcher, StablecoinSource};
use crate::workflows::CycleGate;

/// Non-capability settings the workflows need
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub stablecoins: Vec<StablecoinSource>,
    /// Secret name of the text-generator credential
    pub credential_name: String,
    /// Source of regulatory updates; empty disables the fetch
    pub regulatory_text_url: String,
}

#[derive(Clone)]
pub struct Capabilities {
    pub fetcher: Arc<dyn ReserveDataFetcher>,
    pub ledger: Arc<dyn LedgerClient>,
    pub generator: Arc<dyn TextGenerator>,
    pub webhook: Arc<dyn WebhookSender>,
    pub secrets: Arc<dyn SecretStore>,
    pub signer: Arc<ReportSigner>,
    pub settings: Arc<PipelineSettings>,
    /// Shared by every health-check trigger
    pub cycle_gate: Arc<CycleGate>,
}

impl Capabilities {
    /// Context for one invocation at `now` (Unix seconds)
    pub fn invocation(&self, now: u64) -> InvocationContext {
        InvocationContext {
            now,
            caps: self.clone(),
        }
    }

    /// Context stamped with the current wall-clock time
    pub fn invocation_now(&self) -> InvocationContext {
        self.invocation(unix_now())
    }
}

/// Explicit state for one invocation
pub struct InvocationContext {
    pub now: u64,
    caps: Capabilities,
}

impl InvocationContext {
    pub fn fetcher(&self) -> &dyn ReserveDataFetcher {
        self.caps.fetcher.as_ref()
    }

    pub fn ledger(&self) -> &dyn LedgerClient {
        self.caps.ledger.as_ref()
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.caps.generator.as_ref()
    }

    pub fn webhook(&self) -> &dyn WebhookSender {
        self.caps.webhook.as_ref()
    }

    pub fn secrets(&self) -> &dyn SecretStore {
        self.caps.secrets.as_ref()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.caps.settings
    }

    pub fn cycle_gate(&self) -> &CycleGate {
        &self.caps.cycle_gate
    }

    /// Fresh publisher; its duplicate guard lives as long as this invocation
    pub fn publisher(&self) -> OraclePublisher<'_> {
        OraclePublisher::new(self.caps.ledger.as_ref(), &self.caps.signer)
    }
}

pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
