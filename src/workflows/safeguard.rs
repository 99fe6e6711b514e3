use tracing::{info, warn};

use crate::alerts::{AlertLevel, AlertPayload, DeliveryStatus, deliver};
use crate::context::InvocationContext;

pub const SAFEGUARD_COMPLETE: &str = "safeguard_evaluation_complete";

const SAFEGUARD_SOURCE: &str = "StableGuard Safeguard Trigger";

/// Call `evaluateAndAct()` and post one INFO notification.
/// Both collaborator failures are logged only.
pub async fn run_safeguard(ctx: &InvocationContext) -> &'static str {
    match ctx.ledger().invoke_safeguard().await {
        Ok(()) => info!("Safeguard evaluation invoked"),
        Err(e) => warn!("Safeguard call unavailable: {:#}", e),
    }

    let payload = AlertPayload::new(
        AlertLevel::Info,
        "Safeguard evaluation completed",
        ctx.now.to_string(),
        SAFEGUARD_SOURCE,
    );
    if deliver(ctx.webhook(), &payload).await == DeliveryStatus::Delivered {
        info!("Safeguard notification sent");
    }

    SAFEGUARD_COMPLETE
}
