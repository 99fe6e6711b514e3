use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use tracing::{info, warn};
use url::Url;

use crate::api::http::host_allowed;
use crate::context::PipelineSettings;
use crate::reserve::{SourceKind, StablecoinSource, StablecoinSymbol};

/// Environment variable naming an optional JSON config file
pub const CONFIG_FILE_ENV: &str = "STABLEGUARD_CONFIG";

/// Upper bound for a configured audit cadence
pub const MAX_AUDIT_AGE_DAYS: u64 = 3_650;

/// Configuration for the compliance oracle service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Trigger intervals
    pub schedule: ScheduleConfig,
    /// Ledger submission
    pub ledger: LedgerConfig,
    /// Text generator
    pub generator: GeneratorConfig,
    /// Alert / attestation webhook
    pub webhook: WebhookConfig,
    /// Regulatory update source
    pub regulatory: RegulatoryConfig,
    /// Tracked stablecoins
    pub stablecoins: Vec<StablecoinSource>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Report signing key
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// Trigger intervals in seconds; 0 disables a trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub health_check_interval_secs: u64,
    pub safeguard_interval_secs: u64,
    pub regulatory_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Write relay base URL
    pub rpc_url: String,
    /// Oracle contract receiving reports
    pub oracle_address: String,
    /// Safeguard controller contract
    pub safeguard_address: String,
    pub gas_limit: u64,
    pub timeout_secs: u64,
    /// Use the in-process simulated ledger instead of the relay
    pub simulate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,
    pub model: String,
    /// Name of the secret holding the API key
    pub credential_name: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegulatoryConfig {
    /// Empty uses the "no updates" fallback text
    pub text_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
    /// Enable log sanitization to prevent sensitive data exposure
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require HTTPS for all outbound communications
    pub require_https: bool,
    /// Enable API authentication
    pub enable_auth: bool,
    /// Accepted API keys; never serialized
    #[serde(default, skip_serializing)]
    pub api_keys: Vec<String>,
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Maximum outbound response size in bytes
    pub max_response_size: usize,
    /// Outbound host allowlist, subdomains included; empty allows any host
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// 32-byte hex Ed25519 seed; a random key is generated when absent
    #[serde(default, skip_serializing)]
    pub seed_hex: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
            schedule: ScheduleConfig {
                health_check_interval_secs: 600,
                safeguard_interval_secs: 600,
                regulatory_interval_secs: 3600,
            },
            ledger: LedgerConfig {
                rpc_url: String::new(),
                oracle_address: String::new(),
                safeguard_address: String::new(),
                gas_limit: 500_000,
                timeout_secs: 30,
                simulate: true,
            },
            generator: GeneratorConfig {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash".to_string(),
                credential_name: crate::attestation::DEFAULT_CREDENTIAL.to_string(),
                timeout_secs: 60,
            },
            webhook: WebhookConfig {
                url: "https://localhost:3000/api/alerts".to_string(),
                timeout_secs: 10,
            },
            regulatory: RegulatoryConfig::default(),
            stablecoins: default_stablecoins(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false, // Disabled by default for security
            },
            security: SecurityConfig {
                require_https: true,
                enable_auth: true,
                api_keys: Vec::new(),
                rate_limit_per_minute: 60,
                max_request_size: 64 * 1024,
                max_response_size: 10 * 1024 * 1024,
                allowed_domains: Vec::new(),
            },
            signing: SigningConfig::default(),
        }
    }
}

fn default_stablecoins() -> Vec<StablecoinSource> {
    let mut coins = Vec::new();
    for (symbol, id, permitted, audit_days, fallback) in [
        ("USDC", 2, true, 15, 45_000_000_000u64),
        ("USDT", 1, false, 45, 140_000_000_000u64),
    ] {
        if let Ok(symbol) = StablecoinSymbol::parse(symbol) {
            coins.push(StablecoinSource {
                symbol,
                endpoint: format!("https://stablecoins.llama.fi/stablecoin/{}", id),
                source: SourceKind::Defillama,
                permitted_assets_only: permitted,
                no_rehypothecation: true,
                audit_age_days: Some(audit_days),
                fallback_supply: fallback,
            });
        }
    }
    coins
}

impl GuardConfig {
    /// Load configuration from the optional JSON file and environment
    /// variables, then validate
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`GuardConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_ENV) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                info!("Loading configuration from {}", path);
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path))?
            }
            None => Self::default(),
        };

        config.apply_overrides(&lookup)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server configuration
        if let Some(host) = lookup("STABLEGUARD_HOST") {
            self.server.host = host;
        }
        override_parsed(lookup, "STABLEGUARD_PORT", &mut self.server.port)?;

        // Schedule
        override_parsed(
            lookup,
            "STABLEGUARD_HEALTH_CHECK_INTERVAL_SECS",
            &mut self.schedule.health_check_interval_secs,
        )?;
        override_parsed(
            lookup,
            "STABLEGUARD_SAFEGUARD_INTERVAL_SECS",
            &mut self.schedule.safeguard_interval_secs,
        )?;
        override_parsed(
            lookup,
            "STABLEGUARD_REGULATORY_INTERVAL_SECS",
            &mut self.schedule.regulatory_interval_secs,
        )?;

        // Ledger
        if let Some(url) = lookup("STABLEGUARD_LEDGER_RPC_URL") {
            self.ledger.rpc_url = url;
        }
        if let Some(address) = lookup("STABLEGUARD_ORACLE_ADDRESS") {
            self.ledger.oracle_address = address;
        }
        if let Some(address) = lookup("STABLEGUARD_SAFEGUARD_ADDRESS") {
            self.ledger.safeguard_address = address;
        }
        override_parsed(lookup, "STABLEGUARD_GAS_LIMIT", &mut self.ledger.gas_limit)?;
        override_parsed(lookup, "STABLEGUARD_LEDGER_SIMULATE", &mut self.ledger.simulate)?;

        // Generator
        if let Some(url) = lookup("STABLEGUARD_GENERATOR_URL") {
            self.generator.base_url = url;
        }
        if let Some(model) = lookup("STABLEGUARD_GEMINI_MODEL") {
            self.generator.model = model;
        }
        if let Some(name) = lookup("STABLEGUARD_CREDENTIAL_NAME") {
            self.generator.credential_name = name;
        }

        // Webhook and regulatory source
        if let Some(url) = lookup("STABLEGUARD_WEBHOOK_URL") {
            self.webhook.url = url;
        }
        if let Some(url) = lookup("STABLEGUARD_REGULATORY_TEXT_URL") {
            self.regulatory.text_url = url;
        }

        // Tracked stablecoins as a JSON array
        if let Some(raw) = lookup("STABLEGUARD_STABLECOINS") {
            self.stablecoins =
                serde_json::from_str(&raw).context("Invalid STABLEGUARD_STABLECOINS value")?;
        }

        // Logging configuration
        if let Some(level) = lookup("STABLEGUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        override_parsed(lookup, "STABLEGUARD_SANITIZE_LOGS", &mut self.logging.sanitize_logs)?;
        override_parsed(lookup, "STABLEGUARD_LOG_REQUESTS", &mut self.logging.log_requests)?;

        // Security configuration
        override_parsed(lookup, "STABLEGUARD_REQUIRE_HTTPS", &mut self.security.require_https)?;
        override_parsed(lookup, "STABLEGUARD_ENABLE_AUTH", &mut self.security.enable_auth)?;
        override_parsed(
            lookup,
            "STABLEGUARD_RATE_LIMIT_PER_MINUTE",
            &mut self.security.rate_limit_per_minute,
        )?;
        override_parsed(
            lookup,
            "STABLEGUARD_MAX_REQUEST_SIZE",
            &mut self.security.max_request_size,
        )?;
        if let Some(keys) = lookup("STABLEGUARD_API_KEYS") {
            self.security.api_keys = split_list(&keys);
        }
        if let Some(domains) = lookup("STABLEGUARD_ALLOWED_DOMAINS") {
            self.security.allowed_domains = split_list(&domains);
        }

        // Signing key
        if let Some(seed) = lookup("STABLEGUARD_SIGNING_SEED") {
            self.signing.seed_hex = Some(seed);
        }

        Ok(())
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        // Validate server configuration
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        // Tracked stablecoins
        if self.stablecoins.is_empty() {
            return Err(anyhow::anyhow!("At least one stablecoin must be configured"));
        }

        let mut symbols = HashSet::new();
        for coin in &self.stablecoins {
            if !symbols.insert(coin.symbol) {
                return Err(anyhow::anyhow!(
                    "Stablecoin {} is configured more than once",
                    coin.symbol
                ));
            }
            self.check_url(&coin.endpoint, &format!("{} endpoint", coin.symbol))?;
            if let Some(days) = coin.audit_age_days
                && days > MAX_AUDIT_AGE_DAYS
            {
                return Err(anyhow::anyhow!(
                    "{} audit_age_days {} exceeds {}",
                    coin.symbol,
                    days,
                    MAX_AUDIT_AGE_DAYS
                ));
            }
        }

        // Outbound endpoints
        self.check_url(&self.webhook.url, "Webhook URL")?;
        self.check_url(&self.generator.base_url, "Generator URL")?;
        if !self.regulatory.text_url.is_empty() {
            self.check_url(&self.regulatory.text_url, "Regulatory text URL")?;
        }

        if !self.ledger.simulate {
            if self.ledger.rpc_url.is_empty() {
                return Err(anyhow::anyhow!(
                    "Ledger relay URL is required when simulation is disabled"
                ));
            }
            self.check_url(&self.ledger.rpc_url, "Ledger relay URL")?;

            if self.ledger.oracle_address.is_empty() {
                return Err(anyhow::anyhow!("Oracle address is required"));
            }
        }

        if self.generator.model.is_empty() {
            return Err(anyhow::anyhow!("Generator model cannot be empty"));
        }

        if self.generator.credential_name.is_empty() {
            return Err(anyhow::anyhow!("Generator credential name cannot be empty"));
        }

        // Authentication needs at least one key
        if self.security.enable_auth && self.security.api_keys.is_empty() {
            return Err(anyhow::anyhow!(
                "Authentication is enabled but no API keys are configured (STABLEGUARD_API_KEYS)"
            ));
        }

        for key in &self.security.api_keys {
            if key.len() < 16 {
                return Err(anyhow::anyhow!(
                    "API key is too short (minimum 16 characters)"
                ));
            }
        }

        Ok(())
    }

    fn check_url(&self, raw: &str, what: &str) -> Result<()> {
        let url = Url::parse(raw).with_context(|| format!("{} is not a valid URL", what))?;

        if self.security.require_https && url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but {} is not HTTPS: {}",
                what,
                sanitize_for_logging(raw)
            ));
        }

        let host = url.host_str().unwrap_or_default();
        if !host_allowed(&self.security.allowed_domains, host) {
            return Err(anyhow::anyhow!(
                "{} host '{}' is not in the allowed domains",
                what,
                host
            ));
        }

        Ok(())
    }

    /// Tracked symbols in configuration order
    pub fn stablecoin_symbols(&self) -> Vec<String> {
        self.stablecoins
            .iter()
            .map(|coin| coin.symbol.to_string())
            .collect()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            stablecoins: self.stablecoins.clone(),
            credential_name: self.generator.credential_name.clone(),
            regulatory_text_url: self.regulatory.text_url.clone(),
        }
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value", key))?;
    }
    Ok(())
}

/// Comma-separated list, blanks dropped
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    // Common patterns for sensitive data
    let sensitive_patterns = [
        "auth",
        "key",
        "token",
        "password",
        "secret",
        "credential",
        "api_key",
        "apikey",
        "signature",
    ];

    let data_lower = data.to_lowercase();
    if !sensitive_patterns
        .iter()
        .any(|pattern| data_lower.contains(pattern))
    {
        return data.to_string();
    }

    let chars: Vec<char> = data.chars().collect();
    // For very long strings, show more context but mask the middle
    let keep = if chars.len() > 20 { 6 } else { 2 };
    let keep = keep.min(chars.len() / 2);
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Warn about settings that are valid but unusual for production
pub fn log_config_warnings(config: &GuardConfig) {
    if config.ledger.simulate {
        warn!("Ledger simulation enabled: reports are recorded in-process only");
    }
    if !config.security.require_https {
        warn!("Outbound HTTPS enforcement disabled");
    }
    if config.signing.seed_hex.is_none() {
        warn!("No STABLEGUARD_SIGNING_SEED set, generating an ephemeral signing key");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const API_KEY: &str = "testApiKey1234567890abcdef";

    #[test]
    fn test_sanitize_for_logging() {
        // For strings <= 20 chars with sensitive pattern, show first 2 and last 2
        assert_eq!(sanitize_for_logging("my_authenticator_123"), "my***23");
        assert_eq!(sanitize_for_logging("api_key_secret"), "ap***et");
        assert_eq!(sanitize_for_logging("normal_data"), "normal_data");
        assert_eq!(
            sanitize_for_logging("https://relay.example/?key=abcdef123456"),
            "https:***123456"
        );
        // Never panics on short or multi-byte input
        assert_eq!(sanitize_for_logging("key"), "k***y");
        assert_eq!(sanitize_for_logging("tökén_key"), "tö***ey");
    }

    #[test]
    fn test_default_config_requires_api_keys() {
        let config = GuardConfig::default();
        assert!(config.validate().is_err());

        let mut config = GuardConfig::default();
        config.security.api_keys = vec![API_KEY.to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = GuardConfig::from_lookup(lookup(&[
            ("STABLEGUARD_PORT", "9000"),
            ("STABLEGUARD_API_KEYS", &format!("{}, ", API_KEY)),
            ("STABLEGUARD_HEALTH_CHECK_INTERVAL_SECS", "0"),
            ("STABLEGUARD_GEMINI_MODEL", "gemini-2.5-pro"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.security.api_keys, vec![API_KEY.to_string()]);
        assert_eq!(config.schedule.health_check_interval_secs, 0);
        assert_eq!(config.generator.model, "gemini-2.5-pro");
        assert_eq!(config.stablecoin_symbols(), vec!["USDC", "USDT"]);
    }

    #[test]
    fn test_invalid_override_is_error() {
        let result = GuardConfig::from_lookup(lookup(&[
            ("STABLEGUARD_API_KEYS", API_KEY),
            ("STABLEGUARD_PORT", "not-a-port"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_stablecoins_from_json() {
        let coins = r#"[{
            "symbol": "PYSD",
            "endpoint": "https://issuer.example/attestation.json",
            "source": "attestation",
            "permitted_assets_only": true,
            "no_rehypothecation": true
        }]"#;
        let config = GuardConfig::from_lookup(lookup(&[
            ("STABLEGUARD_API_KEYS", API_KEY),
            ("STABLEGUARD_STABLECOINS", coins),
        ]))
        .unwrap();

        assert_eq!(config.stablecoins.len(), 1);
        assert_eq!(config.stablecoins[0].source, SourceKind::Attestation);
        assert_eq!(config.stablecoins[0].fallback_supply, 0);
    }

    #[test]
    fn test_symbol_too_long_rejected() {
        let coins = r#"[{"symbol":"USDCX","endpoint":"https://x.example","source":"defillama",
            "permitted_assets_only":true,"no_rehypothecation":true}]"#;
        let result = GuardConfig::from_lookup(lookup(&[
            ("STABLEGUARD_API_KEYS", API_KEY),
            ("STABLEGUARD_STABLECOINS", coins),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_symbols_rejected() {
        let mut config = GuardConfig::default();
        config.security.api_keys = vec![API_KEY.to_string()];
        let first = config.stablecoins[0].clone();
        config.stablecoins.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_https_enforced_for_webhook() {
        let mut config = GuardConfig::default();
        config.security.api_keys = vec![API_KEY.to_string()];
        config.webhook.url = "http://hooks.example/alerts".to_string();
        assert!(config.validate().is_err());

        config.security.require_https = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_allowed_domains_from_env() {
        let config = GuardConfig::from_lookup(lookup(&[
            ("STABLEGUARD_API_KEYS", API_KEY),
            (
                "STABLEGUARD_ALLOWED_DOMAINS",
                "llama.fi, googleapis.com,localhost",
            ),
        ]))
        .unwrap();
        assert_eq!(
            config.security.allowed_domains,
            vec!["llama.fi", "googleapis.com", "localhost"]
        );
    }

    #[test]
    fn test_endpoint_outside_allowed_domains_rejected() {
        let result = GuardConfig::from_lookup(lookup(&[
            ("STABLEGUARD_API_KEYS", API_KEY),
            ("STABLEGUARD_ALLOWED_DOMAINS", "llama.fi,localhost"),
        ]));
        // Generator base URL is on googleapis.com
        assert!(result.is_err());
    }

    #[test]
    fn test_audit_age_is_bounded() {
        let mut config = GuardConfig::default();
        config.security.api_keys = vec![API_KEY.to_string()];
        config.stablecoins[0].audit_age_days = Some(u64::MAX);
        assert!(config.validate().is_err());

        config.stablecoins[0].audit_age_days = Some(MAX_AUDIT_AGE_DAYS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_live_ledger_needs_relay() {
        let mut config = GuardConfig::default();
        config.security.api_keys = vec![API_KEY.to_string()];
        config.ledger.simulate = false;
        assert!(config.validate().is_err());

        config.ledger.rpc_url = "https://relay.example".to_string();
        config.ledger.oracle_address = "0x0000000000000000000000000000000000000001".to_string();
        assert!(config.validate().is_ok());
    }
}
