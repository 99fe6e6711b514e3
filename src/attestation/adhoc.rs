//! Ad hoc generation request: `{ "text": "..." }` straight to the generator

use serde_json::Value;
use tracing::{info, warn};

use crate::context::InvocationContext;
use crate::error::{GuardError, GuardResult};

use super::generator::{ATTESTATION_SYSTEM_PROMPT, GenerationError, request_text};
use super::workflow::simulated_attestation;

pub const ERR_EMPTY_REQUEST: &str = "Error: Empty request";
pub const ERR_INVALID_JSON: &str = "Error: Invalid JSON";
pub const ERR_TEXT_REQUIRED: &str = "Error: 'text' field is required";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdhocReply {
    /// Generated (or simulated) text
    Text(String),
    /// Validation failure, one of the `ERR_*` strings
    Rejected(&'static str),
}

/// Validate the raw body and extract the `text` field
pub fn parse_request(body: &[u8]) -> Result<String, &'static str> {
    if body.is_empty() {
        return Err(ERR_EMPTY_REQUEST);
    }

    let value: Value = serde_json::from_slice(body).map_err(|_| ERR_INVALID_JSON)?;
    match value.get("text").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(ERR_TEXT_REQUIRED),
    }
}

pub async fn handle_adhoc(ctx: &InvocationContext, body: &[u8]) -> GuardResult<AdhocReply> {
    let text = match parse_request(body) {
        Ok(text) => text,
        Err(rejection) => {
            warn!("Ad hoc request rejected: {}", rejection);
            return Ok(AdhocReply::Rejected(rejection));
        }
    };
    info!("Ad hoc request received ({} chars)", text.len());

    let credential = &ctx.settings().credential_name;
    let generated = request_text(
        ctx.generator(),
        ctx.secrets(),
        credential,
        ATTESTATION_SYSTEM_PROMPT,
        &text,
        false,
    )
    .await;

    match generated {
        Ok(Some(output)) => Ok(AdhocReply::Text(output)),
        Ok(None) => Ok(AdhocReply::Text(simulated_attestation(
            &format!("{} not available", credential),
            &text,
        ))),
        Err(GenerationError::Unavailable(reason)) => Ok(AdhocReply::Text(simulated_attestation(
            &format!("Text generator unavailable ({})", reason),
            &text,
        ))),
        Err(GenerationError::Malformed(reason)) => Err(GuardError::malformed(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_strings() {
        assert_eq!(parse_request(b""), Err(ERR_EMPTY_REQUEST));
        assert_eq!(parse_request(b"{not json"), Err(ERR_INVALID_JSON));
        assert_eq!(parse_request(br#"{"other": 1}"#), Err(ERR_TEXT_REQUIRED));
        assert_eq!(parse_request(br#"{"text": "   "}"#), Err(ERR_TEXT_REQUIRED));
        assert_eq!(parse_request(br#"{"text": 42}"#), Err(ERR_TEXT_REQUIRED));
        assert_eq!(
            parse_request(br#"{"text": "New reserve rule"}"#),
            Ok("New reserve rule".to_string())
        );
    }
}
