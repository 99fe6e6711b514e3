//! Event-triggered handling of `ReportUpdated` logs
//!
//! The decoded report fans out to the breach dispatcher and the attestation
//! workflow independently; neither waits on the other's result.

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::alerts::{BreachAlertDispatcher, dispatch};
use crate::attestation::draft_attestation;
use crate::context::InvocationContext;
use crate::error::GuardResult;
use crate::report::{LedgerLog, ReportUpdated};

/// Decode the log and run both consumers.
///
/// Returns `"{dispatch} | {attestation}"`. Only a malformed log or a
/// malformed generator response is an error.
pub async fn handle_report_event(
    ctx: &InvocationContext,
    dispatcher: &RwLock<BreachAlertDispatcher>,
    log: &LedgerLog,
) -> GuardResult<String> {
    let event = ReportUpdated::from_log(log).inspect_err(|e| {
        warn!("Rejected ReportUpdated log {}: {}", log.tx_hash, e);
    })?;
    let id = event.report.id();
    info!(
        report = %id,
        ratio_bps = event.report.ratio_bps,
        compliant = event.report.compliant,
        "Decoded ReportUpdated event"
    );

    let (dispatch_outcome, attestation_result) = tokio::join!(
        dispatch(dispatcher, &event, ctx.webhook()),
        draft_attestation(ctx, &event)
    );
    let attestation_result = attestation_result?;

    let status = format!("{} | {}", dispatch_outcome.as_str(), attestation_result.status());
    info!(report = %id, "RESULT: {}", status);
    Ok(status)
}
