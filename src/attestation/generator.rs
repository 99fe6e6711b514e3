//! Text-generation capability and the prompts it is driven with

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::env;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::http::SecureHttpClient;

/// Credential name for the generator
pub const DEFAULT_CREDENTIAL: &str = "GEMINI_API_KEY";

/// Instruction for attestation drafting
pub const ATTESTATION_SYSTEM_PROMPT: &str = "\
You are a stablecoin compliance auditor generating formal GENIUS Act attestation reports.
You produce professional, concise compliance attestation documents.

STRICT RULES:
- Output MUST be plain text (no markdown, no code fences).
- Reference specific GENIUS Act sections (4, 5, 8) for each check.
- State PASS or FAIL for each compliance check with a one-line explanation.
- Include the compliance score and grade.
- Keep the report under 500 words.
- Do NOT invent facts. Use only the data provided.
- End with a formal attestation statement.
";

/// Instruction for regulatory text analysis
pub const REGULATORY_SYSTEM_PROMPT: &str = "\
You are a regulatory compliance analyst for stablecoins.
Analyze the provided text and extract structured data.

OUTPUT FORMAT (CRITICAL):
- You MUST respond with a SINGLE JSON object with this exact structure:
  {\"restrictions\": [], \"reportingFrequency\": null, \"yieldRules\": null, \"requiresAction\": false, \"summary\": \"\"}

STRICT RULES:
- Output MUST be valid JSON. No markdown, no backticks, no code fences, no prose.
- Output MUST be MINIFIED (one line).
- \"requiresAction\": true ONLY if there are new mandatory restrictions or reporting requirements.
";

/// Wrap compliance data in the attestation user prompt
pub fn attestation_prompt(context: &str) -> String {
    format!(
        "Generate a formal GENIUS Act compliance attestation report based on the following on-chain data:\n\n{}\n\nProduce the attestation now.",
        context
    )
}

/// Maximum regulatory text forwarded to the generator
pub const REGULATORY_TEXT_LIMIT: usize = 5000;

/// Wrap regulatory text in the analysis user prompt
pub fn regulatory_prompt(text: &str) -> String {
    let clipped: String = text.chars().take(REGULATORY_TEXT_LIMIT).collect();
    format!(
        "Analyze this regulatory text for stablecoin compliance implications and return the result as JSON:\n\nRegulatory Text:\n{}",
        clipped
    )
}

/// Why a generation request produced no text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Transport failure or non-success status
    #[error("text generator unavailable: {0}")]
    Unavailable(String),
    /// Response arrived but carried no usable text
    #[error("text generator response malformed: {0}")]
    Malformed(String),
}

/// One request to the generator
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub api_key: &'a str,
    /// Let the backend ground answers with web search
    pub grounded: bool,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// Named-secret lookup; absence is a normal condition
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, name: &str) -> Option<String>;
}

/// Secrets from process environment
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|value| !value.trim().is_empty())
    }
}

/// Resolve the credential and call the generator.
///
/// `Ok(None)` means the credential is missing and callers fall back to
/// simulation output.
pub async fn request_text(
    generator: &dyn TextGenerator,
    secrets: &dyn SecretStore,
    credential: &str,
    system: &str,
    prompt: &str,
    grounded: bool,
) -> Result<Option<String>, GenerationError> {
    let Some(api_key) = secrets.get_secret(credential) else {
        warn!("Failed to retrieve {} secret", credential);
        return Ok(None);
    };
    debug!("Resolved {} ({} chars)", credential, api_key.len());

    let text = generator
        .generate(&GenerationRequest {
            system,
            prompt,
            api_key: &api_key,
            grounded,
        })
        .await?;

    if text.trim().is_empty() {
        return Err(GenerationError::Malformed("empty text".to_string()));
    }
    Ok(Some(text))
}

#[derive(Debug, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// Generative Language API backend
pub struct GeminiGenerator {
    http: SecureHttpClient,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(http: SecureHttpClient, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// First candidate's first text part
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let response: GeminiApiResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("invalid JSON: {}", e)))?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| GenerationError::Malformed("missing text".to_string()))
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let mut body = json!({
            "system_instruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "parts": [{ "text": request.prompt }] }],
        });
        if request.grounded {
            body["tools"] = json!([{ "google_search": {} }]);
        }

        let reply = self
            .http
            .post_json(
                &self.url(),
                &body,
                &[
                    ("Content-Type", "application/json"),
                    ("x-goog-api-key", request.api_key),
                ],
            )
            .await
            .map_err(|e| GenerationError::Unavailable(format!("{:#}", e)))?;

        if !reply.is_success() {
            return Err(GenerationError::Unavailable(format!(
                "status {}",
                reply.status
            )));
        }

        let text = extract_text(&reply.body)?;
        info!("Text generated ({} chars)", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSecrets(HashMap<String, String>);

    impl SecretStore for MapSecrets {
        fn get_secret(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(
            &self,
            request: &GenerationRequest<'_>,
        ) -> Result<String, GenerationError> {
            Ok(request.prompt.to_string())
        }
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Attestation"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Attestation");

        assert!(matches!(
            extract_text(r#"{"candidates":[]}"#),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            extract_text(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(extract_text("<html>"), Err(GenerationError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_missing_credential_is_none() {
        let secrets = MapSecrets(HashMap::new());
        let result = request_text(&Echo, &secrets, DEFAULT_CREDENTIAL, "sys", "hi", false).await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_empty_generation_is_malformed() {
        let secrets = MapSecrets(HashMap::from([(
            DEFAULT_CREDENTIAL.to_string(),
            "k".to_string(),
        )]));
        let result = request_text(&Echo, &secrets, DEFAULT_CREDENTIAL, "sys", "   ", false).await;
        assert!(matches!(result, Err(GenerationError::Malformed(_))));

        let ok = request_text(&Echo, &secrets, DEFAULT_CREDENTIAL, "sys", "text", false).await;
        assert_eq!(ok, Ok(Some("text".to_string())));
    }

    #[test]
    fn test_regulatory_prompt_is_clipped() {
        let long = "#".repeat(REGULATORY_TEXT_LIMIT + 100);
        let prompt = regulatory_prompt(&long);
        assert_eq!(prompt.matches('#').count(), REGULATORY_TEXT_LIMIT);
    }
}
