//! Scheduled regulatory text parser

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::alerts::{AlertLevel, AlertPayload, deliver};
use crate::attestation::generator::{REGULATORY_SYSTEM_PROMPT, regulatory_prompt, request_text};
use crate::context::InvocationContext;

pub const NO_UPDATES_TEXT: &str = "No new regulatory updates available.";
pub const ACTION_REQUIRED: &str = "action_required";
pub const NO_ACTION: &str = "compliant";

/// Characters of analysis forwarded in the alert
pub const ANALYSIS_EXCERPT_LEN: usize = 500;

const REGULATORY_SOURCE: &str = "StableGuard AI Regulatory Parser";

/// First `{` through last `}` of generator output, parsed as JSON
pub fn extract_analysis(output: &str) -> Option<Value> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&output[start..=end]).ok()
}

pub fn requires_action(output: &str) -> bool {
    extract_analysis(output)
        .and_then(|analysis| analysis.get("requiresAction").and_then(Value::as_bool))
        .unwrap_or(false)
}

fn fallback_analysis(summary: &str) -> String {
    json!({ "restrictions": [], "requiresAction": false, "summary": summary }).to_string()
}

pub async fn run_regulatory_parser(ctx: &InvocationContext) -> &'static str {
    let url = &ctx.settings().regulatory_text_url;
    let text = if url.is_empty() {
        NO_UPDATES_TEXT.to_string()
    } else {
        match ctx.fetcher().fetch_text(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Regulatory source unavailable: {:#}. Using fallback", e);
                NO_UPDATES_TEXT.to_string()
            }
        }
    };
    info!("Fetched regulatory text ({} chars)", text.len());

    let analysis = match request_text(
        ctx.generator(),
        ctx.secrets(),
        &ctx.settings().credential_name,
        REGULATORY_SYSTEM_PROMPT,
        &regulatory_prompt(&text),
        true,
    )
    .await
    {
        Ok(Some(output)) => output,
        Ok(None) => fallback_analysis("Text generator credential missing (Simulation)"),
        Err(e) => {
            warn!("Regulatory analysis failed: {}", e);
            fallback_analysis("AI Module Failed")
        }
    };

    let excerpt: String = analysis.chars().take(200).collect();
    info!("AI analysis complete: {}", excerpt);

    if !requires_action(&analysis) {
        return NO_ACTION;
    }

    info!("Action required, sending compliance alert");
    let mut payload = AlertPayload::new(
        AlertLevel::Warning,
        "New Regulatory Compliance Requirement Detected",
        ctx.now.to_string(),
        REGULATORY_SOURCE,
    );
    payload.analysis = Some(analysis.chars().take(ANALYSIS_EXCERPT_LEN).collect());
    deliver(ctx.webhook(), &payload).await;

    ACTION_REQUIRED
}
