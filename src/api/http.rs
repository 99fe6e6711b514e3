use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Security requirements for outbound HTTP calls
#[derive(Debug, Clone)]
pub struct HttpSecurityConfig {
    /// Require HTTPS for all external communications
    pub require_https: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum response size in bytes
    pub max_response_size: usize,
    /// Allowed hosts; empty allows any host
    pub allowed_domains: Vec<String>,
}

impl Default for HttpSecurityConfig {
    fn default() -> Self {
        Self {
            require_https: true,
            timeout_secs: 30,
            max_response_size: 10 * 1024 * 1024, // 10MB max
            allowed_domains: Vec::new(),
        }
    }
}

/// Raw reply from a POST
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP client shared by the data fetcher, ledger relay, text
/// generator and webhook sender
#[derive(Clone)]
pub struct SecureHttpClient {
    client: Client,
    config: HttpSecurityConfig,
}

impl SecureHttpClient {
    pub fn new(config: HttpSecurityConfig) -> Result<Self> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("StableGuard-Oracle/1.0");

        if config.require_https {
            client_builder = client_builder.https_only(true);
        }

        let client = client_builder
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Validate URL for security requirements
    fn validate_url(&self, url: &str) -> Result<Url> {
        let parsed_url = Url::parse(url).context("Invalid URL format")?;

        if self.config.require_https && parsed_url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but URL uses {}: {}",
                parsed_url.scheme(),
                url
            ));
        }

        let Some(host) = parsed_url.host_str() else {
            return Err(anyhow::anyhow!("URL must have a valid host: {}", url));
        };

        if !host_allowed(&self.config.allowed_domains, host) {
            return Err(anyhow::anyhow!(
                "Domain '{}' is not in the allowed list: {:?}",
                host,
                self.config.allowed_domains
            ));
        }

        if host == "localhost" || host == "127.0.0.1" {
            debug!("Outbound request to local host: {}", url);
        }

        Ok(parsed_url)
    }

    /// GET a URL and return the body text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let validated_url = self.validate_url(url)?;

        let response = self
            .client
            .get(validated_url.as_str())
            .header("Accept", "application/json, text/plain")
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "HTTP request failed with status {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        self.read_limited(response).await
    }

    /// POST a JSON body; non-2xx statuses are returned, not raised
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> Result<HttpReply> {
        let validated_url = self.validate_url(url)?;

        let mut request = self.client.post(validated_url.as_str()).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.context("Failed to send HTTP request")?;
        let status = response.status().as_u16();
        let body = self.read_limited(response).await?;

        if !(200..300).contains(&status) {
            warn!("POST {} returned status {}", validated_url.host_str().unwrap_or(""), status);
        }

        Ok(HttpReply { status, body })
    }

    async fn read_limited(&self, response: reqwest::Response) -> Result<String> {
        let content_length = response.content_length().unwrap_or(0);
        if content_length > self.config.max_response_size as u64 {
            return Err(anyhow::anyhow!(
                "Response too large: {} bytes (max: {})",
                content_length,
                self.config.max_response_size
            ));
        }

        let response_text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if response_text.len() > self.config.max_response_size {
            return Err(anyhow::anyhow!(
                "Response body too large: {} bytes (max: {})",
                response_text.len(),
                self.config.max_response_size
            ));
        }

        Ok(response_text)
    }

    pub fn config(&self) -> &HttpSecurityConfig {
        &self.config
    }
}

/// True when `host` is one of `allowed_domains` or a subdomain of one.
/// An empty list allows every host.
pub fn host_allowed(allowed_domains: &[String], host: &str) -> bool {
    allowed_domains.is_empty()
        || allowed_domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        let config = HttpSecurityConfig {
            allowed_domains: vec!["llama.fi".to_string()],
            ..HttpSecurityConfig::default()
        };
        let client = SecureHttpClient::new(config).unwrap();

        assert!(
            client
                .validate_url("https://stablecoins.llama.fi/stablecoin/2")
                .is_ok()
        );

        // Invalid HTTP URL when HTTPS required
        assert!(
            client
                .validate_url("http://stablecoins.llama.fi/stablecoin/2")
                .is_err()
        );

        // Disallowed domain
        assert!(client.validate_url("https://evil.example.com/").is_err());
    }

    #[test]
    fn test_empty_allowlist_accepts_any_host() {
        let config = HttpSecurityConfig {
            require_https: false,
            ..HttpSecurityConfig::default()
        };
        let client = SecureHttpClient::new(config).unwrap();
        assert!(client.validate_url("http://localhost:3000/api/alerts").is_ok());
        assert!(client.validate_url("not a url").is_err());
    }

    #[test]
    fn test_host_allowed_matches_subdomains_only() {
        let allowed = vec!["llama.fi".to_string()];
        assert!(host_allowed(&allowed, "llama.fi"));
        assert!(host_allowed(&allowed, "stablecoins.llama.fi"));
        assert!(!host_allowed(&allowed, "evilllama.fi"));
        assert!(!host_allowed(&allowed, "llama.fi.example"));
        assert!(host_allowed(&[], "anything.example"));
    }

    #[test]
    fn test_reply_success_range() {
        assert!(HttpReply { status: 204, body: String::new() }.is_success());
        assert!(!HttpReply { status: 500, body: String::new() }.is_success());
    }
}
