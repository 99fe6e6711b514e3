//! Attestation Drafting Workflow
//!
//! Published report -> deterministic context -> generated narrative ->
//! SHA-256 proof hash -> attestation webhook. The proof hash travels
//! out-of-band; the on-ledger report is never rewritten.

use tracing::{info, warn};

use crate::alerts::{AlertLevel, AttestationPayload, DeliveryStatus, deliver};
use crate::context::InvocationContext;
use crate::crypto::ProofHash;
use crate::error::{GuardError, GuardResult};
use crate::report::{ReportId, ReportUpdated};

use super::context::{Grade, build_context, compliance_score, report_date};
use super::generator::{
    ATTESTATION_SYSTEM_PROMPT, GenerationError, attestation_prompt, request_text,
};

/// Source label on attestation webhooks
pub const ATTESTATION_SOURCE: &str = "StableGuard AI Compliance Engine";

/// Marker carried by every simulated attestation
pub const SIMULATION_MARKER: &str = "SIMULATION MODE";

/// Labeled stand-in used when the generator cannot be reached
pub fn simulated_attestation(reason: &str, context: &str) -> String {
    format!(
        "COMPLIANCE ATTESTATION - {}\n\n{}. This is a simulated attestation.\nIn production, this would contain a full GENIUS Act compliance report.\n\nData provided:\n{}\n\nStatus: SIMULATION - No attestation generated.",
        SIMULATION_MARKER, reason, context
    )
}

/// Attestation text and where it went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResult {
    pub report_id: ReportId,
    pub text: String,
    pub proof_hash: ProofHash,
    pub score: u8,
    pub grade: Grade,
    pub simulated: bool,
    pub delivery: DeliveryStatus,
}

impl AttestationResult {
    /// Terminal status string, `attestation_generated:{symbol}:{proofHash}`
    pub fn status(&self) -> String {
        format!(
            "attestation_generated:{}:{}",
            self.report_id.symbol, self.proof_hash
        )
    }
}

/// Draft and publish the attestation for one published report
pub async fn draft_attestation(
    ctx: &InvocationContext,
    event: &ReportUpdated,
) -> GuardResult<AttestationResult> {
    let report = &event.report;
    let id = report.id();
    let context = build_context(report, &event.tx_hash);
    let score = compliance_score(report);
    let grade = Grade::for_score(score);

    info!(report = %id, score, grade = grade.as_str(), "Drafting attestation ({} chars of context)", context.len());

    let generated = request_text(
        ctx.generator(),
        ctx.secrets(),
        &ctx.settings().credential_name,
        ATTESTATION_SYSTEM_PROMPT,
        &attestation_prompt(&context),
        false,
    )
    .await;

    let (text, simulated) = match generated {
        Ok(Some(text)) => (text, false),
        Ok(None) => (
            simulated_attestation(
                &format!("{} not available", ctx.settings().credential_name),
                &context,
            ),
            true,
        ),
        Err(GenerationError::Unavailable(reason)) => {
            warn!(report = %id, "Text generator unavailable: {}", reason);
            (
                simulated_attestation(&format!("Text generator unavailable ({})", reason), &context),
                true,
            )
        }
        Err(GenerationError::Malformed(reason)) => {
            return Err(GuardError::malformed(reason));
        }
    };

    let proof_hash = ProofHash::of_text(&text);
    info!(report = %id, simulated, "Attestation proof hash {}", proof_hash);

    let payload = AttestationPayload {
        kind: "COMPLIANCE_ATTESTATION".to_string(),
        level: AlertLevel::Info,
        message: format!("Compliance attestation generated for {}", report.symbol),
        stablecoin: report.symbol.to_string(),
        timestamp: report.timestamp.to_string(),
        report_date: report_date(report.timestamp),
        compliance_score: score,
        grade: grade.as_str().to_string(),
        compliant: report.compliant,
        ratio_bps: report.ratio_bps,
        proof_hash: proof_hash.to_hex(),
        attestation_text: text.clone(),
        tx_hash: event.tx_hash.clone(),
        report_id: id.to_string(),
        source: ATTESTATION_SOURCE.to_string(),
        generated_by: if simulated {
            "Simulation".to_string()
        } else {
            "Gemini AI".to_string()
        },
    };

    let delivery = deliver(ctx.webhook(), &payload).await;
    if delivery == DeliveryStatus::Delivered {
        info!(report = %id, "Attestation sent to webhook");
    }

    Ok(AttestationResult {
        report_id: id,
        text,
        proof_hash,
        score,
        grade,
        simulated,
        delivery,
    })
}
